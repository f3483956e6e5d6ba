//! Seeded synthetic data providers.
//!
//! Each provider owns its records behind a lock and is injected into the
//! operations that read or append them. The same seed always produces the
//! same data.

use chrono::{Datelike, Duration, Month, Months, NaiveDate};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::format::money;

pub const WAREHOUSES: [&str; 5] = ["Main", "East", "West", "North", "South"];

const CATEGORIES: [&str; 5] = ["Electronics", "Office", "Software", "Furniture", "Supplies"];
const CLIENTS: [&str; 5] = [
    "Global Tech",
    "Ocean Logistics",
    "Skyline Industries",
    "MediCorp",
    "EduSystems",
];
const CUSTOMERS: [&str; 7] = [
    "Global Tech",
    "Ocean Logistics",
    "Skyline Industries",
    "MediCorp",
    "EduSystems",
    "Retail Giants",
    "Food Worldwide",
];
const PRODUCTS: [&str; 7] = [
    "ERP License",
    "CRM Module",
    "HR Package",
    "Custom Development",
    "Support Plan",
    "Training Package",
    "Integration Service",
];
const TEAMS: [&str; 6] = ["Sales", "Marketing", "HR", "IT", "Finance", "Operations"];
const POSITIONS: [&str; 5] = ["Manager", "Specialist", "Associate", "Director", "Analyst"];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

pub(crate) fn days(n: i64) -> Duration {
    Duration::days(n)
}

pub(crate) fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

pub(crate) fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .map(|next| next - days(1))
        .unwrap_or(date)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub item_id: String,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub reorder_level: i64,
    pub warehouse: String,
    pub last_updated: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    Unpaid,
    Overdue,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub client: String,
    pub amount: f64,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub paid_amount: f64,
}

impl Invoice {
    pub fn outstanding(&self) -> f64 {
        (self.amount - self.paid_amount).max(0.0)
    }
}

/// A payment applied to an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    /// Invoice total.
    pub amount: f64,
    /// This payment.
    pub payment: f64,
    /// Total paid so far, including this payment.
    pub paid_amount: f64,
    pub outstanding_amount: f64,
    pub status: InvoiceStatus,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeStatus {
    Active,
    #[serde(rename = "On Leave")]
    OnLeave,
    Terminated,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "Active",
            EmployeeStatus::OnLeave => "On Leave",
            EmployeeStatus::Terminated => "Terminated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub department: String,
    pub position: String,
    pub hire_date: NaiveDate,
    pub salary: i64,
    pub status: EmployeeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: String,
    pub customer: String,
    pub product: String,
    pub value: i64,
    pub status: OrderStatus,
    pub date: NaiveDate,
    pub sales_person: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task: String,
    pub status: String,
    pub assignee: String,
}

pub const TASK_STATUSES: [&str; 3] = ["pending", "completed", "in progress"];

pub struct Inventory {
    items: RwLock<Vec<InventoryItem>>,
}

impl Inventory {
    pub fn new(items: Vec<InventoryItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    fn generate(rng: &mut StdRng, today: NaiveDate, n: usize) -> Self {
        let items = (0..n)
            .map(|i| InventoryItem {
                item_id: format!("ITEM-{:05}", 30000 + i),
                name: format!("Product {}{}", char::from(b'A' + (i / 10) as u8), i % 10),
                category: pick(rng, &CATEGORIES).to_string(),
                quantity: rng.gen_range(0..=100),
                reorder_level: rng.gen_range(10..=30),
                warehouse: pick(rng, &WAREHOUSES).to_string(),
                last_updated: today,
            })
            .collect();
        Self::new(items)
    }

    pub fn items(&self) -> Vec<InventoryItem> {
        self.items.read().clone()
    }

    /// Items whose name contains `needle`, ignoring case; every item for `None`.
    pub fn search(&self, needle: Option<&str>) -> Vec<InventoryItem> {
        let items = self.items.read();
        match needle.map(str::to_lowercase) {
            Some(needle) => items
                .iter()
                .filter(|i| i.name.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
            None => items.clone(),
        }
    }

    pub fn below(&self, threshold: i64) -> Vec<InventoryItem> {
        self.items
            .read()
            .iter()
            .filter(|i| i.quantity < threshold)
            .cloned()
            .collect()
    }

    pub fn get(&self, item_id: &str) -> Option<InventoryItem> {
        self.items.read().iter().find(|i| i.item_id == item_id).cloned()
    }

    /// Append an item; ids are unique across warehouses.
    pub fn insert(&self, item: InventoryItem) -> Result<InventoryItem, String> {
        let mut items = self.items.write();
        if items.iter().any(|i| i.item_id == item.item_id) {
            return Err(format!("Item {} already exists", item.item_id));
        }
        info!(item_id = %item.item_id, warehouse = %item.warehouse, "Created inventory item");
        items.push(item.clone());
        Ok(item)
    }

    /// Set the quantity of an item held in `warehouse`.
    pub fn set_quantity(
        &self,
        item_id: &str,
        warehouse: &str,
        quantity: i64,
        today: NaiveDate,
    ) -> Option<InventoryItem> {
        let mut items = self.items.write();
        let item = items
            .iter_mut()
            .find(|i| i.item_id == item_id && i.warehouse == warehouse)?;
        item.quantity = quantity;
        item.last_updated = today;
        info!(item_id, warehouse, quantity, "Updated stock");
        Some(item.clone())
    }
}

pub struct Invoices {
    invoices: RwLock<Vec<Invoice>>,
}

impl Invoices {
    pub fn new(invoices: Vec<Invoice>) -> Self {
        Self {
            invoices: RwLock::new(invoices),
        }
    }

    fn generate(rng: &mut StdRng, today: NaiveDate, n: usize) -> Self {
        let invoices = (0..n)
            .map(|i| {
                let amount = rng.gen_range(5000..=50000) as f64;
                let status = match rng.gen_range(0..100) {
                    0..=49 => InvoiceStatus::Paid,
                    50..=79 => InvoiceStatus::Unpaid,
                    80..=94 => InvoiceStatus::Overdue,
                    _ => InvoiceStatus::Partial,
                };
                let paid_amount = match status {
                    InvoiceStatus::Paid => amount,
                    InvoiceStatus::Partial => (amount / 2.0).round(),
                    InvoiceStatus::Unpaid | InvoiceStatus::Overdue => 0.0,
                };
                Invoice {
                    id: format!("INV-{:05}", 50000 + i),
                    client: pick(rng, &CLIENTS).to_string(),
                    amount,
                    issued_date: today - days(rng.gen_range(0..=90)),
                    due_date: today + days(rng.gen_range(1..=30)),
                    status,
                    paid_amount,
                }
            })
            .collect();
        Self::new(invoices)
    }

    pub fn all(&self) -> Vec<Invoice> {
        self.invoices.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Invoice> {
        self.invoices.read().iter().find(|i| i.id == id).cloned()
    }

    /// Invoices with money still owed, earliest due first.
    pub fn unpaid(&self, client: Option<&str>) -> Vec<Invoice> {
        let mut unpaid: Vec<Invoice> = self
            .invoices
            .read()
            .iter()
            .filter(|i| i.status != InvoiceStatus::Paid)
            .filter(|i| client.map_or(true, |c| i.client.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        unpaid.sort_by_key(|i| i.due_date);
        unpaid
    }

    pub fn create(&self, client: &str, amount: f64, issued: NaiveDate, due: NaiveDate) -> Invoice {
        let mut invoices = self.invoices.write();
        let invoice = Invoice {
            id: format!("INV-{:05}", 50000 + invoices.len()),
            client: client.to_string(),
            amount,
            issued_date: issued,
            due_date: due,
            status: InvoiceStatus::Unpaid,
            paid_amount: 0.0,
        };
        info!(invoice = %invoice.id, client, amount, "Created invoice");
        invoices.push(invoice.clone());
        invoice
    }

    /// Apply a payment; the invoice becomes `Paid` once nothing is outstanding.
    pub fn record_payment(&self, id: &str, amount: f64, date: NaiveDate) -> Result<Payment, String> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(format!("Invalid amount: {amount}. Must be a positive number."));
        }
        let mut invoices = self.invoices.write();
        let invoice = invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| format!("Invoice {id} does not exist"))?;

        let outstanding = invoice.outstanding();
        if outstanding <= 0.0 {
            return Err(format!("Invoice {id} is already fully paid"));
        }
        if amount > outstanding + 0.005 {
            return Err(format!(
                "Payment of {} exceeds the outstanding balance of {} on {id}",
                money(amount),
                money(outstanding)
            ));
        }

        invoice.paid_amount = (invoice.paid_amount + amount).min(invoice.amount);
        invoice.status = if invoice.outstanding() <= 0.005 {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        };
        info!(invoice = %id, amount, status = ?invoice.status, "Recorded payment");

        Ok(Payment {
            id: invoice.id.clone(),
            amount: invoice.amount,
            payment: amount,
            paid_amount: invoice.paid_amount,
            outstanding_amount: invoice.outstanding(),
            status: invoice.status,
            payment_date: date,
        })
    }
}

pub struct Employees {
    employees: RwLock<Vec<Employee>>,
}

impl Employees {
    pub fn new(employees: Vec<Employee>) -> Self {
        Self {
            employees: RwLock::new(employees),
        }
    }

    fn generate(rng: &mut StdRng, today: NaiveDate, n: usize) -> Self {
        let employees = (0..n)
            .map(|i| Employee {
                id: format!("EMP-{}", 40000 + i),
                name: format!("Employee {i}"),
                department: pick(rng, &TEAMS).to_string(),
                position: pick(rng, &POSITIONS).to_string(),
                hire_date: today - days(rng.gen_range(30..=1000)),
                salary: rng.gen_range(30000..=120000),
                status: match rng.gen_range(0..100) {
                    0..=84 => EmployeeStatus::Active,
                    85..=94 => EmployeeStatus::OnLeave,
                    _ => EmployeeStatus::Terminated,
                },
            })
            .collect();
        Self::new(employees)
    }

    pub fn all(&self) -> Vec<Employee> {
        self.employees.read().clone()
    }

    pub fn active(&self) -> Vec<Employee> {
        self.employees
            .read()
            .iter()
            .filter(|e| e.status == EmployeeStatus::Active)
            .cloned()
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<Employee> {
        self.employees
            .read()
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    /// Employees hired in a month (`May`, `may`, `2025-05`) or a year
    /// (`2025`). Unrecognised filters match everyone.
    pub fn joined(&self, filter: Option<&str>) -> Vec<Employee> {
        let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
            return self.all();
        };
        let matches: Box<dyn Fn(&NaiveDate) -> bool> = if let Ok(month) = filter.parse::<Month>() {
            let m = month.number_from_month();
            Box::new(move |d: &NaiveDate| d.month() == m)
        } else if let Some((y, m)) = filter.split_once('-') {
            match (y.parse::<i32>(), m.parse::<u32>()) {
                (Ok(y), Ok(m)) => Box::new(move |d: &NaiveDate| d.year() == y && d.month() == m),
                _ => Box::new(|_: &NaiveDate| true),
            }
        } else if let (4, Ok(y)) = (filter.len(), filter.parse::<i32>()) {
            Box::new(move |d: &NaiveDate| d.year() == y)
        } else {
            debug!(filter, "Unrecognised joined_month filter, listing everyone");
            Box::new(|_: &NaiveDate| true)
        };
        self.employees
            .read()
            .iter()
            .filter(|e| matches(&e.hire_date))
            .cloned()
            .collect()
    }

    pub fn add(&self, name: &str, position: &str, department: &str, start: NaiveDate) -> Employee {
        let mut employees = self.employees.write();
        let employee = Employee {
            id: format!("EMP-{}", 40000 + employees.len()),
            name: name.to_string(),
            department: department.to_string(),
            position: position.to_string(),
            hire_date: start,
            salary: 0,
            status: EmployeeStatus::Active,
        };
        info!(id = %employee.id, name, department, "Added employee");
        employees.push(employee.clone());
        employee
    }
}

pub struct SalesOrders {
    orders: RwLock<Vec<SalesOrder>>,
}

impl SalesOrders {
    pub fn new(orders: Vec<SalesOrder>) -> Self {
        Self {
            orders: RwLock::new(orders),
        }
    }

    fn generate(rng: &mut StdRng, today: NaiveDate, n: usize) -> Self {
        let mut orders: Vec<SalesOrder> = (0..n)
            .map(|i| SalesOrder {
                id: format!("SO-{}", 10000 + i),
                customer: pick(rng, &CUSTOMERS).to_string(),
                product: pick(rng, &PRODUCTS).to_string(),
                value: rng.gen_range(10000..=100000),
                status: match rng.gen_range(0..100) {
                    0..=39 => OrderStatus::Open,
                    40..=89 => OrderStatus::Completed,
                    _ => OrderStatus::Cancelled,
                },
                date: today - days(rng.gen_range(0..=180)),
                sales_person: format!("SP-{}", rng.gen_range(100..=110)),
            })
            .collect();
        orders.sort_by(|a, b| b.date.cmp(&a.date));
        Self::new(orders)
    }

    pub fn all(&self) -> Vec<SalesOrder> {
        self.orders.read().clone()
    }

    /// Open orders in `period` (`this month`, `last month`, anything else
    /// means all time), newest first.
    pub fn open(&self, period: &str, today: NaiveDate) -> Vec<SalesOrder> {
        let this_month = first_of_month(today);
        let (from, to) = match period.trim().to_lowercase().as_str() {
            "this month" => (Some(this_month), None),
            "last month" => {
                let end = this_month - days(1);
                (Some(first_of_month(end)), Some(end))
            }
            _ => (None, None),
        };
        let mut orders: Vec<SalesOrder> = self
            .orders
            .read()
            .iter()
            .filter(|o| o.status == OrderStatus::Open)
            .filter(|o| from.map_or(true, |f| o.date >= f) && to.map_or(true, |t| o.date <= t))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.date.cmp(&a.date));
        orders
    }
}

/// Source of generated figures (revenue, snapshots, leave) that are not
/// backed by stored records.
pub struct Figures {
    rng: Mutex<StdRng>,
}

impl Figures {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn between(&self, low: i64, high: i64) -> i64 {
        self.rng.lock().gen_range(low..=high)
    }

    pub fn ratio(&self, low: f64, high: f64) -> f64 {
        self.rng.lock().gen_range(low..high)
    }

    pub fn pick<'a>(&self, items: &[&'a str]) -> &'a str {
        pick(&mut self.rng.lock(), items)
    }

    pub fn sample<T: Clone>(&self, items: &[T], n: usize) -> Vec<T> {
        items
            .choose_multiple(&mut *self.rng.lock(), n)
            .cloned()
            .collect()
    }
}

/// Every provider the operations draw on.
pub struct ErpData {
    pub inventory: Inventory,
    pub invoices: Invoices,
    pub employees: Employees,
    pub sales_orders: SalesOrders,
    pub figures: Figures,
    tasks: Vec<Task>,
    today: NaiveDate,
}

impl ErpData {
    pub fn seeded(seed: u64) -> Self {
        Self::seeded_at(seed, chrono::Local::now().date_naive())
    }

    /// Seeded data relative to a fixed `today`.
    pub fn seeded_at(seed: u64, today: NaiveDate) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = Self {
            inventory: Inventory::generate(&mut rng, today, 30),
            invoices: Invoices::generate(&mut rng, today, 30),
            employees: Employees::generate(&mut rng, today, 20),
            sales_orders: SalesOrders::generate(&mut rng, today, 100),
            tasks: (0..20)
                .map(|i| Task {
                    task: format!("Task {i}"),
                    status: pick(&mut rng, &TASK_STATUSES).to_string(),
                    assignee: format!("EMP-{}", rng.gen_range(40000..=40019)),
                })
                .collect(),
            figures: Figures::new(rng.gen()),
            today,
        };
        debug!(seed, %today, "Generated ERP data");
        data
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

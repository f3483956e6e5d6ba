//! Sales operations.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use erpmind_common::{Department, FnOperation, OperationCatalog, ParamSpec, ParamType};

use crate::data::{days, ErpData, SalesOrder};
use crate::format::{fallback, rupees, table, typed};
use crate::read::{non_empty, text_or, to_result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub sales: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub company: String,
    pub contact: String,
    pub details: String,
    pub status: String,
    pub created_date: NaiveDate,
    pub potential_value: i64,
}

/// Days covered by a reporting period.
fn period_days(period: &str) -> i64 {
    match period.trim().to_lowercase().as_str() {
        "day" | "today" => 1,
        "week" | "this week" => 7,
        "month" | "this month" => 30,
        _ => 90,
    }
}

pub(crate) fn register(catalog: &mut OperationCatalog, data: &Arc<ErpData>) {
    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_sales_data",
        Department::Sales,
        "Daily sales totals for a period (week, month or quarter).",
        vec![ParamSpec::optional("period", ParamType::String, "week")],
        move |args| {
            let period = text_or(args, "period", "week")?;
            let today = d.today();
            let rows: Vec<DailySales> = (0..period_days(&period))
                .map(|i| DailySales {
                    date: today - days(i),
                    sales: d.figures.between(5000, 20000),
                })
                .collect();
            to_result(&rows)
        },
        |value| match typed::<Vec<DailySales>>(value) {
            Some(rows) if rows.is_empty() => "No sales data found for this period.".to_string(),
            Some(rows) => {
                let total: i64 = rows.iter().map(|r| r.sales).sum();
                format!(
                    "### 📊 Sales This Period\n\n{}\n\n**Total:** {}",
                    table(
                        &[("Date", ":-----------"), ("Sales (₹)", "----------:")],
                        rows.iter()
                            .map(|r| vec![r.date.to_string(), rupees(r.sales)]),
                    ),
                    rupees(total)
                )
            }
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_open_orders",
        Department::Sales,
        "Open sales orders for this month, last month or all time.",
        vec![ParamSpec::optional("period", ParamType::String, "this month")],
        move |args| {
            let period = text_or(args, "period", "this month")?;
            to_result(&d.sales_orders.open(&period, d.today()))
        },
        |value| match typed::<Vec<SalesOrder>>(value) {
            Some(orders) if orders.is_empty() => "No open orders found.".to_string(),
            Some(orders) => format!(
                "### 🗂️ Open Orders\n\n{}",
                table(
                    &[
                        ("Order ID", ":---------"),
                        ("Customer", ":---------"),
                        ("Product", ":--------"),
                        ("Value (₹)", "----------:"),
                        ("Date", ":-----"),
                    ],
                    orders.iter().map(|o| {
                        vec![
                            o.id.clone(),
                            o.customer.clone(),
                            o.product.clone(),
                            rupees(o.value),
                            o.date.to_string(),
                        ]
                    }),
                )
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "create_lead",
        Department::Sales,
        "Register a new sales lead.",
        vec![
            ParamSpec::required("company", ParamType::String),
            ParamSpec::required("contact", ParamType::String),
            ParamSpec::optional("details", ParamType::String, ""),
        ],
        move |args| {
            let lead = Lead {
                id: format!("LD-{}", d.figures.between(20000, 29999)),
                company: non_empty(args, "company")?,
                contact: non_empty(args, "contact")?,
                details: text_or(args, "details", "")?,
                status: "New".to_string(),
                created_date: d.today(),
                potential_value: d.figures.between(5000, 50000),
            };
            to_result(&lead)
        },
        |value| match typed::<Lead>(value) {
            Some(lead) => format!(
                "✅ **Lead Created**\n\n- **ID:** {}\n- **Company:** {}\n- **Contact:** {}\n- **Potential Value:** {}",
                lead.id,
                lead.company,
                lead.contact,
                rupees(lead.potential_value)
            ),
            None => fallback(value),
        },
    )));
}

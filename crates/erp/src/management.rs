//! Management operations.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use erpmind_common::{
    error_result, Department, FnOperation, OperationCatalog, OperationError, ParamSpec, ParamType,
};

use crate::data::{days, first_of_month, ErpData, OrderStatus, Task, TASK_STATUSES};
use crate::format::{capitalize, fallback, money, rupees, table, thousands, typed};
use crate::read::{integer_or, opt_text, text_or, to_result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPerformance {
    pub name: String,
    pub sales: i64,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSnapshot {
    pub snapshot_type: String,
    pub revenue: f64,
    pub receivables: f64,
    pub open_pipeline: i64,
    pub expenses: f64,
    pub net_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub focus_area: String,
    pub insight: String,
    pub recommendation: String,
}

fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month() - 1) / 3 * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// Inclusive order-date window; `None` bounds are open.
fn performance_window(period: &str, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match period.trim().to_lowercase().as_str() {
        "current quarter" | "this quarter" | "quarter" => (Some(quarter_start(today)), None),
        "last quarter" => {
            let end = quarter_start(today) - days(1);
            (Some(quarter_start(end)), Some(end))
        }
        "this month" | "month" => (Some(first_of_month(today)), None),
        "this year" | "year" => (NaiveDate::from_ymd_opt(today.year(), 1, 1), None),
        _ => (None, None),
    }
}

pub(crate) fn register(catalog: &mut OperationCatalog, data: &Arc<ErpData>) {
    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_sales_performance",
        Department::Management,
        "Top sales people by order value for a period.",
        vec![
            ParamSpec::optional("period", ParamType::String, "current quarter"),
            ParamSpec::optional("top_n", ParamType::Integer, 5),
        ],
        move |args| {
            let period = text_or(args, "period", "current quarter")?;
            let top_n = integer_or(args, "top_n", 5)?;
            if top_n < 1 {
                return Err(OperationError::invalid("top_n", "must be at least 1"));
            }
            let (from, to) = performance_window(&period, d.today());

            let mut totals: HashMap<String, SalesPerformance> = HashMap::new();
            for order in d.sales_orders.all().into_iter().filter(|o| {
                o.status != OrderStatus::Cancelled
                    && from.map_or(true, |f| o.date >= f)
                    && to.map_or(true, |t| o.date <= t)
            }) {
                let entry = totals
                    .entry(order.sales_person.clone())
                    .or_insert_with(|| SalesPerformance {
                        name: order.sales_person.clone(),
                        sales: 0,
                        orders: 0,
                    });
                entry.sales += order.value;
                entry.orders += 1;
            }
            let mut ranking: Vec<SalesPerformance> = totals.into_values().collect();
            ranking.sort_by(|a, b| b.sales.cmp(&a.sales).then_with(|| a.name.cmp(&b.name)));
            ranking.truncate(top_n as usize);
            to_result(&ranking)
        },
        |value| match typed::<Vec<SalesPerformance>>(value) {
            Some(rows) if rows.is_empty() => "### 🏆 Sales Performance\n\nNo sales in this period".to_string(),
            Some(rows) => format!(
                "### 🏆 Sales Performance\n\n{}",
                table(
                    &[("Name", ":-----"), ("Orders", "-------:"), ("Sales (₹)", "-----------:")],
                    rows.iter()
                        .map(|r| vec![r.name.clone(), r.orders.to_string(), rupees(r.sales)]),
                )
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_business_snapshot",
        Department::Management,
        "Revenue, receivables, pipeline, expenses and profit at a glance.",
        vec![ParamSpec::optional("snapshot_type", ParamType::String, "overview")],
        move |args| {
            let invoices = d.invoices.all();
            let revenue: f64 = invoices.iter().map(|i| i.paid_amount).sum();
            let receivables: f64 = invoices.iter().map(|i| i.outstanding()).sum();
            let open_pipeline: i64 = d
                .sales_orders
                .all()
                .iter()
                .filter(|o| o.status == OrderStatus::Open)
                .map(|o| o.value)
                .sum();
            let expenses = d.figures.between(50_000, 200_000) as f64;
            to_result(&BusinessSnapshot {
                snapshot_type: text_or(args, "snapshot_type", "overview")?,
                revenue,
                receivables,
                open_pipeline,
                expenses,
                net_profit: revenue - expenses,
            })
        },
        |value| match typed::<BusinessSnapshot>(value) {
            Some(s) => format!(
                "### 🏢 Business Snapshot\n\n- **Revenue:** {}\n- **Receivables:** {}\n- **Open Pipeline:** {}\n- **Expenses:** {}\n- **Net Profit:** {}",
                money(s.revenue),
                money(s.receivables),
                rupees(s.open_pipeline),
                money(s.expenses),
                money(s.net_profit)
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_task_summary",
        Department::Management,
        "Tasks by status (pending, completed, in progress), optionally for one assignee.",
        vec![
            ParamSpec::optional("status", ParamType::String, "pending"),
            ParamSpec::optional("assignee", ParamType::String, Value::Null),
        ],
        move |args| {
            let status = text_or(args, "status", "pending")?.to_lowercase();
            if !TASK_STATUSES.contains(&status.as_str()) {
                return Ok(error_result(format!(
                    "Unknown status '{status}'. Valid options: {}",
                    TASK_STATUSES.join(", ")
                )));
            }
            let assignee = opt_text(args, "assignee")?;
            let tasks: Vec<&Task> = d
                .tasks()
                .iter()
                .filter(|t| t.status == status)
                .filter(|t| {
                    assignee
                        .as_deref()
                        .map_or(true, |a| t.assignee.eq_ignore_ascii_case(a))
                })
                .collect();
            to_result(&tasks)
        },
        |value| match typed::<Vec<Task>>(value) {
            Some(tasks) if tasks.is_empty() => "### 📋 Task Summary\n\nNo matching tasks".to_string(),
            Some(tasks) => {
                let lines: Vec<String> = tasks
                    .iter()
                    .map(|t| format!("- **{}** (Status: {}, Assignee: {})", t.task, t.status, t.assignee))
                    .collect();
                format!("### 📋 Task Summary\n\n{}", lines.join("\n"))
            }
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "generate_strategy_report",
        Department::Management,
        "Strategy insight and recommendation for a focus area (growth, collections, inventory).",
        vec![ParamSpec::optional("focus_area", ParamType::String, "growth")],
        move |args| {
            let focus_area = text_or(args, "focus_area", "growth")?;
            let (insight, recommendation) = match focus_area.to_lowercase().as_str() {
                "growth" | "sales" => {
                    let open: Vec<_> = d
                        .sales_orders
                        .all()
                        .into_iter()
                        .filter(|o| o.status == OrderStatus::Open)
                        .collect();
                    let pipeline: i64 = open.iter().map(|o| o.value).sum();
                    (
                        format!(
                            "Open pipeline of {} across {} orders",
                            rupees(pipeline),
                            thousands(open.len() as i64)
                        ),
                        "Expand sales team".to_string(),
                    )
                }
                "collections" | "cash" | "finance" => {
                    let unpaid = d.invoices.unpaid(None);
                    let owed: f64 = unpaid.iter().map(|i| i.outstanding()).sum();
                    (
                        format!("{} outstanding on {} invoices", money(owed), unpaid.len()),
                        "Chase the earliest due invoices first".to_string(),
                    )
                }
                "inventory" | "operations" => {
                    let low = d
                        .inventory
                        .items()
                        .iter()
                        .filter(|i| i.quantity < i.reorder_level)
                        .count();
                    (
                        format!("{low} items are below their reorder level"),
                        "Raise purchase orders for low stock items".to_string(),
                    )
                }
                _ => (
                    "Steady growth expected".to_string(),
                    "Expand sales team".to_string(),
                ),
            };
            to_result(&StrategyReport {
                focus_area,
                insight,
                recommendation,
            })
        },
        |value| match typed::<StrategyReport>(value) {
            Some(r) => format!(
                "### 📃 Strategy Report: {}\n\n- **Insight:** {}\n- **Recommendation:** {}",
                capitalize(&r.focus_area),
                r.insight,
                r.recommendation
            ),
            None => fallback(value),
        },
    )));
}

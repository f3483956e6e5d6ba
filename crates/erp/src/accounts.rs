//! Accounts operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use erpmind_common::{
    error_result, Arguments, Department, FnOperation, OperationCatalog, OperationError, ParamSpec, ParamType,
};

use crate::data::{days, ErpData, Invoice, Payment};
use crate::format::{capitalize, fallback, money, rupees, table, typed};
use crate::ids::normalize_invoice_id;
use crate::read::{date_or, non_empty, opt_text, text_or, to_result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueSnapshot {
    pub period: String,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub statement_type: String,
    pub period: String,
    pub amount: i64,
}

/// Amounts such as `amount=5000` arrive verbatim from free text.
fn parse_amount(args: &Arguments) -> Result<f64, OperationError> {
    match args.get("amount").and_then(Value::as_str) {
        Some(text) if text.contains('=') => {
            let tail = text.rsplit('=').next().unwrap_or_default();
            erpmind_common::args::parse_number(tail)
                .ok_or_else(|| OperationError::invalid("amount", format!("'{text}' is not a number")))
        }
        _ => args.number("amount"),
    }
}

pub(crate) fn register(catalog: &mut OperationCatalog, data: &Arc<ErpData>) {
    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_unpaid_invoices",
        Department::Accounts,
        "Invoices with an outstanding balance, optionally for one client.",
        vec![ParamSpec::optional("client", ParamType::String, Value::Null)],
        move |args| {
            let client = opt_text(args, "client")?;
            to_result(&d.invoices.unpaid(client.as_deref()))
        },
        |value| match typed::<Vec<Invoice>>(value) {
            Some(invoices) if invoices.is_empty() => "### 📝 Unpaid Invoices\n\nNo unpaid invoices".to_string(),
            Some(invoices) => format!(
                "### 📝 Unpaid Invoices\n\n{}",
                table(
                    &[
                        ("Invoice", ":--------"),
                        ("Client", ":-------"),
                        ("Amount (₹)", "-----------:"),
                        ("Outstanding (₹)", "-----------:"),
                        ("Due Date", ":---------"),
                    ],
                    invoices.iter().map(|i| {
                        vec![
                            i.id.clone(),
                            i.client.clone(),
                            money(i.amount),
                            money(i.outstanding()),
                            i.due_date.to_string(),
                        ]
                    }),
                )
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "create_payment_entry",
        Department::Accounts,
        "Record a payment against an invoice.",
        vec![
            ParamSpec::required("invoice_id", ParamType::String),
            ParamSpec::required("amount", ParamType::Number),
            ParamSpec::optional("payment_date", ParamType::String, Value::Null),
        ],
        move |args| {
            let invoice_id = normalize_invoice_id(&non_empty(args, "invoice_id")?);
            let amount = parse_amount(args)?;
            let date = date_or(args, "payment_date", d.today())?;
            match d.invoices.record_payment(&invoice_id, amount, date) {
                Ok(payment) => to_result(&payment),
                Err(message) => Ok(error_result(message)),
            }
        },
        |value| match typed::<Payment>(value) {
            Some(p) => format!(
                "💸 **Payment Recorded**\n\n- **Invoice:** `{}`\n- **Amount Paid:** {}\n- **Total Paid:** {}/{}\n- **Outstanding:** {}\n- **Status:** {:?}\n- **Date:** {}",
                p.id,
                money(p.payment),
                money(p.paid_amount),
                money(p.amount),
                money(p.outstanding_amount),
                p.status,
                p.payment_date
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "create_invoice",
        Department::Accounts,
        "Raise a new invoice for a client.",
        vec![
            ParamSpec::required("client", ParamType::String),
            ParamSpec::required("amount", ParamType::Number),
            ParamSpec::optional("due_date", ParamType::String, Value::Null),
        ],
        move |args| {
            let client = non_empty(args, "client")?;
            let amount = parse_amount(args)?;
            if amount.is_nan() || amount <= 0.0 {
                return Err(OperationError::invalid("amount", "must be positive"));
            }
            let today = d.today();
            let due = date_or(args, "due_date", today + days(30))?;
            to_result(&d.invoices.create(&client, amount, today, due))
        },
        |value| match typed::<Invoice>(value) {
            Some(i) => format!(
                "✅ **Invoice Created**\n\n- **ID:** {}\n- **Client:** {}\n- **Amount:** {}\n- **Due Date:** {}",
                i.id,
                i.client,
                money(i.amount),
                i.due_date
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_revenue_snapshot",
        Department::Accounts,
        "Total revenue for a period.",
        vec![ParamSpec::optional("period", ParamType::String, "last month")],
        move |args| {
            to_result(&RevenueSnapshot {
                period: text_or(args, "period", "last month")?,
                revenue: d.figures.between(100_000, 500_000),
            })
        },
        |value| match typed::<RevenueSnapshot>(value) {
            Some(r) => format!(
                "### 📈 Revenue for {}\n\n- **Total:** {}",
                capitalize(&r.period),
                rupees(r.revenue)
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "generate_financial_statement",
        Department::Accounts,
        "Financial statement (P&L, balance sheet, cash flow) for a period.",
        vec![
            ParamSpec::optional("statement_type", ParamType::String, "P&L"),
            ParamSpec::optional("period", ParamType::String, "last quarter"),
        ],
        move |args| {
            to_result(&FinancialStatement {
                statement_type: text_or(args, "statement_type", "P&L")?,
                period: text_or(args, "period", "last quarter")?,
                amount: d.figures.between(50_000, 200_000),
            })
        },
        |value| match typed::<FinancialStatement>(value) {
            Some(s) => format!(
                "### 📊 {} for {}\n\n- **Amount:** {}",
                s.statement_type,
                s.period,
                rupees(s.amount)
            ),
            None => fallback(value),
        },
    )));
}

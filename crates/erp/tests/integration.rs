//! Integration tests for the operation catalog.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};

use erpmind_common::{
    error_message, is_failure_text, Arguments, Department, OperationCatalog, OperationError,
};
use erpmind_erp::{build_catalog, ErpData, InvoiceStatus, Payment};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 18).unwrap()
}

fn setup() -> (Arc<ErpData>, OperationCatalog) {
    let data = Arc::new(ErpData::seeded_at(42, today()));
    let catalog = build_catalog(Arc::clone(&data));
    (data, catalog)
}

fn args(pairs: Value) -> Arguments {
    let mut args = Arguments::new();
    if let Value::Object(map) = pairs {
        for (k, v) in map {
            args.insert(k, v);
        }
    }
    args
}

/// Declared defaults, as the resolver would bind them.
fn defaults(catalog: &OperationCatalog, name: &str) -> Arguments {
    let op = catalog.get(name).unwrap();
    let mut bound = Arguments::new();
    for p in op.params() {
        if let Some(d) = &p.default {
            bound.insert(p.name.clone(), d.clone());
        }
    }
    bound
}

fn run(catalog: &OperationCatalog, name: &str, bound: &Arguments) -> (Value, String) {
    let op = catalog.get(name).unwrap();
    let result = op.invoke(bound).unwrap();
    let text = op.format(&result);
    (result, text)
}

#[test]
fn catalog_covers_every_department() {
    let (_, catalog) = setup();
    assert_eq!(catalog.len(), 22);

    let count = |d| catalog.for_department(d).len();
    assert_eq!(count(Department::Sales), 3);
    assert_eq!(count(Department::Inventory), 5);
    assert_eq!(count(Department::Accounts), 5);
    assert_eq!(count(Department::Hr), 5);
    assert_eq!(count(Department::Management), 4);
}

#[test]
fn operations_without_required_params_run_on_defaults() {
    let (_, catalog) = setup();
    let names: Vec<String> = catalog.names().map(String::from).collect();
    for name in names {
        let op = catalog.get(&name).unwrap();
        if op.params().iter().any(|p| p.is_required()) {
            continue;
        }
        let (result, text) = run(&catalog, &name, &defaults(&catalog, &name));
        assert!(error_message(&result).is_none(), "{name}: {result}");
        assert!(!is_failure_text(&text), "{name}: {text}");
        assert!(!text.starts_with("```"), "{name} fell back to raw JSON");
    }
}

#[test]
fn payment_entry_updates_the_invoice() {
    let (data, catalog) = setup();
    let invoice = data.invoices.unpaid(None).into_iter().next().unwrap();
    let outstanding = invoice.outstanding();
    let number = invoice.id.trim_start_matches("INV-").to_string();

    let (result, text) = run(
        &catalog,
        "create_payment_entry",
        &args(json!({ "invoice_id": number, "amount": outstanding / 2.0 })),
    );
    let payment: Payment = serde_json::from_value(result).unwrap();
    assert_eq!(payment.id, invoice.id);
    assert_eq!(payment.amount, invoice.amount);
    assert!((payment.outstanding_amount - outstanding / 2.0).abs() < 1e-6);
    assert_eq!(payment.status, InvoiceStatus::Partial);
    assert_eq!(payment.payment_date, today());
    assert!(text.contains("Payment Recorded"));

    let (result, _) = run(
        &catalog,
        "create_payment_entry",
        &args(json!({ "invoice_id": invoice.id, "amount": "amount=999999999" })),
    );
    assert!(error_message(&result).unwrap().contains("exceeds"));

    let stored = data.invoices.get(&invoice.id).unwrap();
    assert!((stored.outstanding() - outstanding / 2.0).abs() < 1e-6);
}

#[test]
fn payment_against_unknown_invoice_is_an_error_result() {
    let (_, catalog) = setup();
    let (result, text) = run(
        &catalog,
        "create_payment_entry",
        &args(json!({ "invoice_id": "INV-99999", "amount": 100 })),
    );
    assert_eq!(error_message(&result), Some("Invoice INV-99999 does not exist"));
    assert!(is_failure_text(&text));
}

#[test]
fn bad_arguments_raise_with_the_parameter_name() {
    let (_, catalog) = setup();
    let op = catalog.get("create_payment_entry").unwrap();

    let err = op
        .invoke(&args(json!({ "invoice_id": "INV-50001", "amount": "lots" })))
        .unwrap_err();
    assert_eq!(err.parameter(), Some("amount"));

    let err = op.invoke(&args(json!({ "amount": 10 }))).unwrap_err();
    assert_eq!(err, OperationError::MissingArgument("invoice_id".into()));

    let mut unresolved = args(json!({ "invoice_id": "INV-50001" }));
    unresolved.mark_unresolved("amount");
    assert_eq!(
        op.invoke(&unresolved).unwrap_err(),
        OperationError::Unresolved("amount".into())
    );
}

#[test]
fn update_stock_validates_warehouse_and_creates_missing_items() {
    let (data, catalog) = setup();

    let (result, text) = run(
        &catalog,
        "update_stock",
        &args(json!({ "item_id": "30001", "quantity": 5, "warehouse": "Moon" })),
    );
    assert!(error_message(&result).unwrap().starts_with("Invalid warehouse"));
    assert!(is_failure_text(&text));

    let existing = data.inventory.get("ITEM-30001").unwrap();
    let (result, text) = run(
        &catalog,
        "update_stock",
        &args(json!({
            "item_id": "item-30001",
            "quantity": 50.0,
            "warehouse": existing.warehouse.to_lowercase(),
        })),
    );
    assert_eq!(result["action"], "updated");
    assert!(text.contains("Stock Updated"));
    assert_eq!(data.inventory.get("ITEM-30001").unwrap().quantity, 50);

    let (result, text) = run(
        &catalog,
        "update_stock",
        &args(json!({ "item_id": "77", "quantity": "12" })),
    );
    assert_eq!(result["action"], "created");
    assert_eq!(result["item"]["item_id"], "ITEM-00077");
    assert!(text.contains("New Item Created"));
}

#[test]
fn duplicate_inventory_items_are_rejected() {
    let (_, catalog) = setup();
    let (result, _) = run(
        &catalog,
        "create_inventory_item",
        &args(json!({ "item_id": "30002", "name": "Spare Chair" })),
    );
    assert_eq!(error_message(&result), Some("Item ITEM-30002 already exists"));

    let (result, text) = run(
        &catalog,
        "create_inventory_item",
        &args(json!({ "item_id": "ITEM-90001", "name": "Standing Desk", "quantity": 4 })),
    );
    assert_eq!(result["item_id"], "ITEM-90001");
    assert_eq!(result["warehouse"], "Main");
    assert!(text.contains("Standing Desk"));
}

#[test]
fn invoices_and_employees_can_be_created() {
    let (data, catalog) = setup();
    let (result, _) = run(
        &catalog,
        "create_invoice",
        &args(json!({ "client": "MediCorp", "amount": "12,500", "due_date": "2025-07-31" })),
    );
    assert_eq!(result["id"], "INV-50030");
    assert_eq!(result["due_date"], "2025-07-31");
    assert!(data.invoices.get("INV-50030").is_some());

    let op = catalog.get("create_invoice").unwrap();
    let err = op
        .invoke(&args(json!({ "client": "MediCorp", "amount": 10, "due_date": "soon" })))
        .unwrap_err();
    assert_eq!(err.parameter(), Some("due_date"));

    let (result, text) = run(
        &catalog,
        "add_employee",
        &args(json!({ "name": "Asha", "position": "Analyst", "department": "Finance" })),
    );
    assert_eq!(result["id"], "EMP-40020");
    assert!(text.contains("Employee Added"));

    let (result, _) = run(
        &catalog,
        "check_contract_status",
        &args(json!({ "employee_name": "asha" })),
    );
    assert_eq!(result["employee_id"], "EMP-40020");

    let (result, _) = run(
        &catalog,
        "check_contract_status",
        &args(json!({ "employee_name": "Nobody" })),
    );
    assert!(error_message(&result).is_some());
}

#[test]
fn reports_reject_unknown_kinds() {
    let (_, catalog) = setup();
    let (result, text) = run(
        &catalog,
        "generate_hr_report",
        &args(json!({ "report_type": "happiness" })),
    );
    assert!(error_message(&result).unwrap().contains("headcount"));
    assert!(is_failure_text(&text));

    let (result, _) = run(&catalog, "generate_hr_report", &args(json!({ "report_type": "turnover" })));
    assert_eq!(result["report_type"], "turnover");

    let (result, _) = run(&catalog, "get_task_summary", &args(json!({ "status": "blocked" })));
    assert!(error_message(&result).is_some());
}

#[test]
fn sales_performance_respects_top_n() {
    let (_, catalog) = setup();
    let (result, _) = run(
        &catalog,
        "get_sales_performance",
        &args(json!({ "period": "all time", "top_n": 3 })),
    );
    let rows = result.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let sales: Vec<i64> = rows.iter().map(|r| r["sales"].as_i64().unwrap()).collect();
    assert!(sales.windows(2).all(|w| w[0] >= w[1]));

    let op = catalog.get("get_sales_performance").unwrap();
    assert_eq!(
        op.invoke(&args(json!({ "top_n": 0 }))).unwrap_err().parameter(),
        Some("top_n")
    );
}

#[test]
fn same_seed_gives_same_answers() {
    let (_, a) = setup();
    let (_, b) = setup();
    for name in ["get_sales_data", "get_leave_calendar", "get_business_snapshot"] {
        let (ra, _) = run(&a, name, &defaults(&a, name));
        let (rb, _) = run(&b, name, &defaults(&b, name));
        assert_eq!(ra, rb, "{name}");
    }
}

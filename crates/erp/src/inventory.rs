//! Inventory operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use erpmind_common::{
    error_result, Department, FnOperation, OperationCatalog, OperationError, ParamSpec, ParamType,
};

use crate::data::{ErpData, InventoryItem, WAREHOUSES};
use crate::format::{capitalize, fallback, table, thousands, typed};
use crate::ids::normalize_item_id;
use crate::read::{integer_or, non_empty, opt_text, text_or, to_result};

/// Outcome of `update_stock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "item", rename_all = "snake_case")]
pub enum StockChange {
    Updated(InventoryItem),
    /// The item was not held in that warehouse and has been created there.
    Created(InventoryItem),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    pub report_type: String,
    pub items: usize,
    pub total_units: i64,
    pub below_reorder: Vec<String>,
    pub units_by_warehouse: BTreeMap<String, i64>,
    pub units_by_category: BTreeMap<String, i64>,
}

fn warehouse(raw: &str) -> Option<String> {
    let name = capitalize(raw.trim());
    WAREHOUSES.contains(&name.as_str()).then_some(name)
}

fn invalid_warehouse() -> Value {
    error_result(format!(
        "Invalid warehouse. Valid options: {}",
        WAREHOUSES.join(", ")
    ))
}

fn non_negative(name: &str, n: i64) -> Result<i64, OperationError> {
    if n < 0 {
        return Err(OperationError::invalid(name, "must not be negative"));
    }
    Ok(n)
}

fn format_created(title: &str, item: &InventoryItem) -> String {
    format!(
        "✅ **{title}**\n\n- **ID:** {}\n- **Name:** {}\n- **Category:** {}\n- **Quantity:** {}\n- **Warehouse:** {}",
        item.item_id, item.name, item.category, item.quantity, item.warehouse
    )
}

pub(crate) fn register(catalog: &mut OperationCatalog, data: &Arc<ErpData>) {
    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_stock_levels",
        Department::Inventory,
        "Stock on hand, optionally filtered by item name.",
        vec![ParamSpec::optional("item_name", ParamType::String, Value::Null)],
        move |args| {
            let name = opt_text(args, "item_name")?;
            to_result(&d.inventory.search(name.as_deref()))
        },
        |value| match typed::<Vec<InventoryItem>>(value) {
            Some(items) if items.is_empty() => "### 📦 Stock Levels\n\nNo matching items found".to_string(),
            Some(items) => format!(
                "### 📦 Stock Levels\n\n{}",
                table(
                    &[
                        ("Item", ":-----"),
                        ("ID", ":----"),
                        ("Qty", "----:"),
                        ("Reorder @", "----------:"),
                        ("Warehouse", ":----------"),
                    ],
                    items.iter().map(|i| {
                        vec![
                            i.name.clone(),
                            i.item_id.clone(),
                            i.quantity.to_string(),
                            i.reorder_level.to_string(),
                            i.warehouse.clone(),
                        ]
                    }),
                )
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_low_stock_items",
        Department::Inventory,
        "Items with fewer units than the threshold.",
        vec![ParamSpec::optional("threshold", ParamType::Integer, 20)],
        move |args| {
            let threshold = integer_or(args, "threshold", 20)?;
            to_result(&d.inventory.below(threshold))
        },
        |value| match typed::<Vec<InventoryItem>>(value) {
            Some(items) if items.is_empty() => "### ⚠️ Low Stock Items\n\nNo low stock items".to_string(),
            Some(items) => {
                let lines: Vec<String> = items
                    .iter()
                    .map(|i| {
                        format!(
                            "- **{}**: {} units (Reorder at {})",
                            i.name, i.quantity, i.reorder_level
                        )
                    })
                    .collect();
                format!("### ⚠️ Low Stock Items\n\n{}", lines.join("\n"))
            }
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "update_stock",
        Department::Inventory,
        "Set the quantity of an item in a warehouse, creating it there if needed.",
        vec![
            ParamSpec::required("item_id", ParamType::String),
            ParamSpec::required("quantity", ParamType::Integer),
            ParamSpec::optional("warehouse", ParamType::String, "Main"),
        ],
        move |args| {
            let item_id = normalize_item_id(&non_empty(args, "item_id")?);
            let quantity = non_negative("quantity", args.integer("quantity")?)?;
            let Some(warehouse) = warehouse(&text_or(args, "warehouse", "Main")?) else {
                return Ok(invalid_warehouse());
            };

            if let Some(item) = d.inventory.set_quantity(&item_id, &warehouse, quantity, d.today()) {
                return to_result(&StockChange::Updated(item));
            }
            let item = InventoryItem {
                name: format!("Item {item_id}"),
                item_id,
                category: "Misc".to_string(),
                quantity,
                reorder_level: 10,
                warehouse,
                last_updated: d.today(),
            };
            match d.inventory.insert(item) {
                Ok(item) => to_result(&StockChange::Created(item)),
                Err(message) => Ok(error_result(message)),
            }
        },
        |value| match typed::<StockChange>(value) {
            Some(StockChange::Updated(i)) => format!(
                "✅ **Stock Updated**\n\n- **{}** ({}): {} units in {}",
                i.name, i.item_id, i.quantity, i.warehouse
            ),
            Some(StockChange::Created(i)) => format_created("New Item Created", &i),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "create_inventory_item",
        Department::Inventory,
        "Add a new item to the inventory.",
        vec![
            ParamSpec::required("item_id", ParamType::String),
            ParamSpec::required("name", ParamType::String),
            ParamSpec::optional("category", ParamType::String, "Misc"),
            ParamSpec::optional("quantity", ParamType::Integer, 0),
            ParamSpec::optional("reorder_level", ParamType::Integer, 10),
            ParamSpec::optional("warehouse", ParamType::String, "Main"),
        ],
        move |args| {
            let Some(warehouse) = warehouse(&text_or(args, "warehouse", "Main")?) else {
                return Ok(invalid_warehouse());
            };
            let item = InventoryItem {
                item_id: normalize_item_id(&non_empty(args, "item_id")?),
                name: non_empty(args, "name")?,
                category: text_or(args, "category", "Misc")?,
                quantity: non_negative("quantity", integer_or(args, "quantity", 0)?)?,
                reorder_level: non_negative("reorder_level", integer_or(args, "reorder_level", 10)?)?,
                warehouse,
                last_updated: d.today(),
            };
            match d.inventory.insert(item) {
                Ok(item) => to_result(&item),
                Err(message) => Ok(error_result(message)),
            }
        },
        |value| match typed::<InventoryItem>(value) {
            Some(item) => format_created("Item Created", &item),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "generate_inventory_report",
        Department::Inventory,
        "Inventory summary: units by warehouse and category, items below reorder level.",
        vec![ParamSpec::optional("report_type", ParamType::String, "valuation")],
        move |args| {
            let items = d.inventory.items();
            let mut units_by_warehouse = BTreeMap::new();
            let mut units_by_category = BTreeMap::new();
            for item in &items {
                *units_by_warehouse.entry(item.warehouse.clone()).or_insert(0) += item.quantity;
                *units_by_category.entry(item.category.clone()).or_insert(0) += item.quantity;
            }
            let report = InventoryReport {
                report_type: text_or(args, "report_type", "valuation")?,
                items: items.len(),
                total_units: items.iter().map(|i| i.quantity).sum(),
                below_reorder: items
                    .iter()
                    .filter(|i| i.quantity < i.reorder_level)
                    .map(|i| i.item_id.clone())
                    .collect(),
                units_by_warehouse,
                units_by_category,
            };
            to_result(&report)
        },
        |value| match typed::<InventoryReport>(value) {
            Some(r) => {
                let breakdown = |m: &BTreeMap<String, i64>| {
                    m.iter()
                        .map(|(k, v)| format!("  - {k}: {}", thousands(*v)))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                format!(
                    "### 📃 Inventory Report\n\n- **Type:** {}\n- **Items:** {}\n- **Total Units:** {}\n- **Below Reorder Level:** {}\n- **By Warehouse:**\n{}\n- **By Category:**\n{}",
                    r.report_type,
                    r.items,
                    thousands(r.total_units),
                    r.below_reorder.len(),
                    breakdown(&r.units_by_warehouse),
                    breakdown(&r.units_by_category)
                )
            }
            None => fallback(value),
        },
    )));
}

//! Synthetic ERP back end for erpmind.
//!
//! Seeded providers ([`ErpData`]) hold inventory, invoices, employees and
//! sales orders; [`build_catalog`] exposes them as named operations grouped
//! by department, each with a markdown formatter.
//!
//! Domain rejections (an unknown invoice, an invalid warehouse) come back as
//! `{"error": ...}` results. Malformed arguments raise an
//! [`OperationError`](erpmind_common::OperationError) naming the parameter.

mod accounts;
pub mod data;
pub mod format;
mod hr;
pub mod ids;
mod inventory;
mod management;
mod read;
mod sales;

use std::sync::Arc;

use tracing::debug;

use erpmind_common::OperationCatalog;

pub use accounts::{FinancialStatement, RevenueSnapshot};
pub use data::{
    Employee, EmployeeStatus, Employees, ErpData, Figures, Inventory, InventoryItem, Invoice,
    InvoiceStatus, Invoices, OrderStatus, Payment, SalesOrder, SalesOrders, Task, WAREHOUSES,
};
pub use hr::{ContractStatus, HrReport, LeaveEntry};
pub use ids::{normalize_invoice_id, normalize_item_id};
pub use inventory::{InventoryReport, StockChange};
pub use management::{BusinessSnapshot, SalesPerformance, StrategyReport};
pub use sales::{DailySales, Lead};

/// Every operation, bound to `data`.
pub fn build_catalog(data: Arc<ErpData>) -> OperationCatalog {
    let mut catalog = OperationCatalog::new();
    sales::register(&mut catalog, &data);
    inventory::register(&mut catalog, &data);
    accounts::register(&mut catalog, &data);
    hr::register(&mut catalog, &data);
    management::register(&mut catalog, &data);
    debug!(operations = catalog.len(), "Built operation catalog");
    catalog
}

/// Catalog over freshly seeded data.
pub fn seeded_catalog(seed: u64) -> OperationCatalog {
    build_catalog(Arc::new(ErpData::seeded(seed)))
}

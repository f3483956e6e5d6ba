//! Common types and traits shared across erpmind crates.
//!
//! This crate provides the error taxonomy, the department scopes, and the
//! operation contract that the catalog implements and the agents call.

pub mod args;
pub mod catalog;
pub mod department;
pub mod error;
pub mod traits;

pub use args::{Arg, Arguments, ParamSpec, ParamType};
pub use catalog::{
    FAILURE_PREFIX, FnOperation, OperationCatalog, error_message, error_result, failure_text,
    is_failure_text,
};
pub use department::Department;
pub use error::{ErpError, OperationError, Result};
pub use traits::{Operation, Oracle};

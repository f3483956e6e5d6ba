//! Contracts shared by the operation catalog and the agents.
//!
//! These traits live in `erpmind-common` so that both the `erp` crate
//! (which implements operations) and the `agents` crate (which calls them)
//! can reference them without circular dependencies.

use async_trait::async_trait;
use serde_json::Value;

use crate::args::{Arguments, ParamSpec};
use crate::error::OperationError;
use crate::{Department, Result};

/// A named, callable catalog entry with its own output formatter.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn department(&self) -> Department;

    /// One-line description shown to the language model.
    fn description(&self) -> &str;

    /// Formal parameters in declaration order.
    fn params(&self) -> &[ParamSpec];

    fn invoke(&self, args: &Arguments) -> std::result::Result<Value, OperationError>;

    /// Render a result for display.
    ///
    /// Must render an error-shaped result (`{"error": ...}`) as failure text
    /// instead of panicking.
    fn format(&self, result: &Value) -> String;
}

/// An external text generator consulted for missing or corrected values.
///
/// Output is expected, not guaranteed, to be JSON when a prompt asks for it.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn suggest(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for std::sync::Arc<T> {
    async fn suggest(&self, prompt: &str) -> Result<String> {
        (**self).suggest(prompt).await
    }
}

//! Registry of named operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::args::{Arguments, ParamSpec};
use crate::error::OperationError;
use crate::traits::Operation;
use crate::Department;

/// Prefix that marks failure text so presentation layers can branch on it.
pub const FAILURE_PREFIX: &str = "⚠️ ";

pub fn failure_text(message: impl AsRef<str>) -> String {
    format!("{FAILURE_PREFIX}{}", message.as_ref())
}

pub fn is_failure_text(text: &str) -> bool {
    text.starts_with(FAILURE_PREFIX.trim_end())
}

/// The `error` message of an error-shaped result, if it is one.
pub fn error_message(result: &Value) -> Option<&str> {
    result.get("error").and_then(Value::as_str)
}

pub fn error_result(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}

#[derive(Default, Clone)]
pub struct OperationCatalog {
    operations: BTreeMap<String, Arc<dyn Operation>>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation, replacing any previous one with the same name.
    pub fn register(&mut self, operation: Arc<dyn Operation>) {
        self.operations
            .insert(operation.name().to_string(), operation);
    }

    pub fn with(mut self, operation: impl Operation + 'static) -> Self {
        self.register(Arc::new(operation));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn for_department(&self, department: Department) -> Vec<Arc<dyn Operation>> {
        self.operations
            .values()
            .filter(|op| op.department() == department)
            .cloned()
            .collect()
    }
}

type InvokeFn = dyn Fn(&Arguments) -> Result<Value, OperationError> + Send + Sync;
type FormatFn = dyn Fn(&Value) -> String + Send + Sync;

/// An operation assembled from closures.
///
/// The formatter only sees successful results; error-shaped results are
/// rendered as failure text before it is called.
pub struct FnOperation {
    name: String,
    department: Department,
    description: String,
    params: Vec<ParamSpec>,
    invoke: Box<InvokeFn>,
    format: Box<FormatFn>,
}

impl FnOperation {
    pub fn new(
        name: impl Into<String>,
        department: Department,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        invoke: impl Fn(&Arguments) -> Result<Value, OperationError> + Send + Sync + 'static,
        format: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            department,
            description: description.into(),
            params,
            invoke: Box::new(invoke),
            format: Box::new(format),
        }
    }
}

impl Operation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn department(&self) -> Department {
        self.department
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    fn invoke(&self, args: &Arguments) -> Result<Value, OperationError> {
        (self.invoke)(args)
    }

    fn format(&self, result: &Value) -> String {
        match error_message(result) {
            Some(message) => failure_text(message),
            None => (self.format)(result),
        }
    }
}

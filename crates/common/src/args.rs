//! Declared parameters and bound arguments for catalog operations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OperationError;

/// Declared type of an operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Any,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Any => "any",
        };
        f.write_str(s)
    }
}

/// A formal parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    /// `None` means the parameter is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default.into()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// `name: type` or `name: type = default`, for prompts.
    pub fn signature(&self) -> String {
        match &self.default {
            None => format!("{}: {}", self.name, self.kind),
            Some(Value::Null) => format!("{}: {} = None", self.name, self.kind),
            Some(d) => format!("{}: {} = {}", self.name, self.kind, d),
        }
    }
}

/// A bound argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    /// The resolver could not produce a value; reading it fails.
    Unresolved,
}

/// Keyword arguments bound for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    slots: BTreeMap<String, Arg>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.slots.insert(name.into(), Arg::Value(value));
    }

    pub fn mark_unresolved(&mut self, name: impl Into<String>) {
        self.slots.insert(name.into(), Arg::Unresolved);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.slots.get(name) {
            Some(Arg::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_unresolved(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Arg::Unresolved))
    }

    fn value(&self, name: &str) -> Result<&Value, OperationError> {
        match self.slots.get(name) {
            Some(Arg::Value(v)) => Ok(v),
            Some(Arg::Unresolved) => Err(OperationError::Unresolved(name.to_string())),
            None => Err(OperationError::MissingArgument(name.to_string())),
        }
    }

    pub fn string(&self, name: &str) -> Result<String, OperationError> {
        self.opt_string(name)?
            .ok_or_else(|| OperationError::MissingArgument(name.to_string()))
    }

    /// `Ok(None)` for an explicit null; numbers and booleans are rendered.
    pub fn opt_string(&self, name: &str) -> Result<Option<String>, OperationError> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(number_to_string(n))),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(OperationError::invalid(
                name,
                format!("expected text, got {other}"),
            )),
        }
    }

    /// Accepts numbers and numeric text.
    pub fn number(&self, name: &str) -> Result<f64, OperationError> {
        match self.value(name)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| OperationError::invalid(name, "number out of range")),
            Value::String(s) => parse_number(s)
                .ok_or_else(|| OperationError::invalid(name, format!("'{s}' is not a number"))),
            other => Err(OperationError::invalid(
                name,
                format!("expected a number, got {other}"),
            )),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64, OperationError> {
        let n = self.number(name)?;
        if n.fract() != 0.0 {
            return Err(OperationError::invalid(name, format!("{n} is not a whole number")));
        }
        Ok(n as i64)
    }

    /// Arguments as a JSON object; unresolved slots render as null.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .slots
            .iter()
            .map(|(k, slot)| {
                let v = match slot {
                    Arg::Value(v) => v.clone(),
                    Arg::Unresolved => Value::Null,
                };
                (k.clone(), v)
            })
            .collect();
        Value::Object(map)
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Lenient numeric parse: tolerates thousands separators and a currency sign.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches(['$', '₹', '€', '£'])
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integral floats print without a fractional part.
pub fn number_to_string(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

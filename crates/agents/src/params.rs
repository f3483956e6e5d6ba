//! Binding raw operation input to declared parameters.
//!
//! Input arrives in one of three shapes ([`RawInput`]). The first rule that
//! matches decides how values are bound; declared defaults fill the gaps and
//! the oracle is asked for any required parameter that is still missing.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::{debug, warn};

use erpmind_common::args::{number_to_string, parse_number};
use erpmind_common::{Arguments, Operation, Oracle, ParamSpec, ParamType};

/// Operation input as produced by the model or a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// Already keyed by parameter name.
    Structured(Map<String, Value>),
    /// JSON text: an object keyed by name or an array in declaration order.
    Json(String),
    /// `key=value` pairs, comma-separated values or a single bare value.
    FreeText(String),
}

impl RawInput {
    /// Classify an untyped value. Strings that look like JSON become
    /// [`RawInput::Json`].
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => RawInput::Structured(map),
            Value::Null => RawInput::Structured(Map::new()),
            Value::Array(_) => RawInput::Json(value.to_string()),
            Value::String(s) => Self::from_text(s),
            other => RawInput::FreeText(other.to_string()),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            RawInput::Json(text)
        } else {
            RawInput::FreeText(text)
        }
    }

    /// The input as it would be shown to the correction oracle.
    pub fn to_value(&self) -> Value {
        match self {
            RawInput::Structured(map) => Value::Object(map.clone()),
            RawInput::Json(text) | RawInput::FreeText(text) => Value::String(text.clone()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("operation '{operation}' takes {expected} parameter(s) but {actual} positional value(s) were given")]
    TooManyValues {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("operation '{operation}': invalid value for '{name}': {reason}")]
    InvalidValue {
        operation: String,
        name: String,
        reason: String,
    },
}

impl ResolveError {
    /// Name of the parameter at fault, if the error is about one.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            ResolveError::InvalidValue { name, .. } => Some(name),
            ResolveError::TooManyValues { .. } => None,
        }
    }
}

static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*("([^"]*)"|'([^']*)'|[^,]+)"#).expect("key=value pattern compiles")
});

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

/// Unquoted `key=value` values that parse as numbers become numbers.
fn scalar(text: &str) -> Value {
    let trimmed = text.trim();
    match trimmed.parse::<f64>().ok().filter(|n| n.is_finite()).and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(trimmed.to_string()),
    }
}

/// Convert a bound value to the declared parameter type.
///
/// Null passes through unchanged for every type.
pub fn coerce(kind: ParamType, value: Value) -> Result<Value, String> {
    match (kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (ParamType::Any, v) => Ok(v),

        (ParamType::String, Value::String(s)) => Ok(Value::String(s)),
        (ParamType::String, Value::Number(n)) => Ok(Value::String(number_to_string(&n))),
        (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (ParamType::String, other) => Ok(Value::String(other.to_string())),

        (ParamType::Number, v) => {
            let n = match &v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_number(s),
                _ => None,
            };
            n.and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected a number, got {v}"))
        }

        (ParamType::Integer, v) => {
            let n = match &v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_number(s),
                _ => None,
            };
            match n {
                Some(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Ok(Value::from(n as i64)),
                _ => Err(format!("expected a whole number, got {v}")),
            }
        }

        (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ParamType::Boolean, v) => {
            let text = match &v {
                Value::String(s) => s.trim().to_lowercase(),
                Value::Number(n) => n.to_string(),
                _ => String::new(),
            };
            match text.as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("expected true or false, got {v}")),
            }
        }
    }
}

/// Bind `input` to `params` without consulting the oracle.
///
/// Keys that name no declared parameter are dropped.
pub fn bind(
    operation: &str,
    params: &[ParamSpec],
    input: RawInput,
) -> Result<Map<String, Value>, ResolveError> {
    let raw = match input {
        RawInput::Structured(map) => map,
        RawInput::Json(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Array(values)) => positional(operation, params, values)?,
            _ => {
                debug!(operation, "Input is not a JSON object or array, reading it as text");
                from_free_text(operation, params, &text)?
            }
        },
        RawInput::FreeText(text) => from_free_text(operation, params, &text)?,
    };

    let mut bound = Map::new();
    for (key, value) in raw {
        let Some(spec) = params.iter().find(|p| p.name == key) else {
            debug!(operation, key = %key, "Dropping undeclared argument");
            continue;
        };
        let value = coerce(spec.kind, value).map_err(|reason| ResolveError::InvalidValue {
            operation: operation.to_string(),
            name: key.clone(),
            reason,
        })?;
        bound.insert(key, value);
    }
    Ok(bound)
}

fn positional(
    operation: &str,
    params: &[ParamSpec],
    values: Vec<Value>,
) -> Result<Map<String, Value>, ResolveError> {
    if values.len() > params.len() {
        return Err(ResolveError::TooManyValues {
            operation: operation.to_string(),
            expected: params.len(),
            actual: values.len(),
        });
    }
    Ok(params.iter().map(|p| p.name.clone()).zip(values).collect())
}

fn from_free_text(
    operation: &str,
    params: &[ParamSpec],
    text: &str,
) -> Result<Map<String, Value>, ResolveError> {
    let pairs: Map<String, Value> = KEY_VALUE
        .captures_iter(text)
        .filter_map(|c| {
            let key = c.get(1)?.as_str().to_string();
            let value = match (c.get(3), c.get(4)) {
                (Some(q), _) | (_, Some(q)) => Value::String(q.as_str().to_string()),
                _ => scalar(c.get(2)?.as_str()),
            };
            Some((key, value))
        })
        .collect();
    if !pairs.is_empty() {
        return Ok(pairs);
    }

    let text = text.trim();
    if text.contains(',') {
        let pieces: Vec<&str> = text.split(',').map(strip_quotes).collect();
        if pieces.len() > params.len() {
            return Err(ResolveError::TooManyValues {
                operation: operation.to_string(),
                expected: params.len(),
                actual: pieces.len(),
            });
        }
        return Ok(params
            .iter()
            .zip(pieces)
            .filter(|(_, piece)| !piece.is_empty())
            .map(|(p, piece)| (p.name.clone(), Value::String(piece.to_string())))
            .collect());
    }

    let bare = strip_quotes(text);
    match params.first() {
        Some(first) if !bare.is_empty() => {
            Ok(Map::from_iter([(first.name.clone(), Value::String(bare.to_string()))]))
        }
        _ => Ok(Map::new()),
    }
}

/// Resolves operation arguments, asking the oracle for missing values.
#[derive(Clone)]
pub struct ParameterResolver {
    oracle: Arc<dyn Oracle>,
}

impl ParameterResolver {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    pub async fn resolve(
        &self,
        operation: &dyn Operation,
        input: RawInput,
    ) -> Result<Arguments, ResolveError> {
        self.resolve_params(operation.name(), operation.params(), input)
            .await
    }

    pub async fn resolve_params(
        &self,
        operation: &str,
        params: &[ParamSpec],
        input: RawInput,
    ) -> Result<Arguments, ResolveError> {
        let mut args = Arguments::new();
        for (key, value) in bind(operation, params, input)? {
            args.insert(key, value);
        }

        for spec in params {
            if args.contains(&spec.name) {
                continue;
            }
            if let Some(default) = &spec.default {
                args.insert(spec.name.clone(), default.clone());
                continue;
            }
            let prompt = format!(
                "Function '{operation}' requires parameter '{}' of type {}. \
                 Generate appropriate value based on context: {args}. \
                 Output only the value, no other text.",
                spec.name, spec.kind
            );
            match self.oracle.suggest(&prompt).await {
                Ok(value) => {
                    debug!(operation, param = %spec.name, "Oracle supplied missing parameter");
                    args.insert(spec.name.clone(), Value::String(value.trim().to_string()));
                }
                Err(e) => {
                    warn!(operation, param = %spec.name, error = %e, "Oracle could not supply parameter");
                    args.mark_unresolved(spec.name.clone());
                }
            }
        }
        Ok(args)
    }
}

//! Self-correcting operation execution.
//!
//! An operation gets one attempt with the resolved input. If binding or the
//! call fails, the oracle is shown the error and asked for corrected
//! parameters, which get exactly one more attempt.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use erpmind_common::{error_message, failure_text, is_failure_text, Operation, Oracle};

use crate::params::{ParameterResolver, RawInput};

/// Final result of [`CorrectionLoop::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Formatted operation output.
    Success(String),
    /// Failure text, prefixed so callers can tell it apart.
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Outcome::Success(text) | Outcome::Failed(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Success(text) | Outcome::Failed(text) => text,
        }
    }
}

enum State {
    Attempting { input: RawInput, retried: bool },
    Corrected { params: Value, error: String },
}

/// A failed attempt: what was passed and why it failed.
struct Failure {
    params: Value,
    error: String,
}

pub struct CorrectionLoop {
    resolver: ParameterResolver,
    oracle: Arc<dyn Oracle>,
}

impl CorrectionLoop {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            resolver: ParameterResolver::new(Arc::clone(&oracle)),
            oracle,
        }
    }

    /// Run `operation`, invoking it at most twice.
    pub async fn execute(&self, operation: &dyn Operation, input: RawInput) -> Outcome {
        let name = operation.name();
        let mut state = State::Attempting {
            input,
            retried: false,
        };

        loop {
            state = match state {
                State::Attempting { input, retried } => match self.attempt(operation, input).await {
                    Ok(result) => return render(operation, &result),
                    Err(failure) if retried => {
                        warn!(operation = name, error = %failure.error, "Corrected attempt failed");
                        return Outcome::Failed(failure_text(format!(
                            "Operation '{name}' failed after correction: {}",
                            failure.error
                        )));
                    }
                    Err(failure) => {
                        info!(operation = name, error = %failure.error, "Attempt failed, asking for a correction");
                        State::Corrected {
                            params: failure.params,
                            error: failure.error,
                        }
                    }
                },
                State::Corrected { params, error } => match self.correction(name, &params, &error).await {
                    Some(corrected) => State::Attempting {
                        input: RawInput::Structured(corrected),
                        retried: true,
                    },
                    None => {
                        return Outcome::Failed(failure_text(format!(
                            "Operation '{name}' failed: {error}"
                        )))
                    }
                },
            };
        }
    }

    async fn attempt(&self, operation: &dyn Operation, input: RawInput) -> Result<Value, Failure> {
        let shown = input.to_value();
        let args = self
            .resolver
            .resolve(operation, input)
            .await
            .map_err(|e| Failure {
                params: shown,
                error: e.to_string(),
            })?;
        debug!(operation = operation.name(), args = %args, "Invoking operation");
        operation.invoke(&args).map_err(|e| Failure {
            params: args.to_json(),
            error: e.to_string(),
        })
    }

    /// Corrected parameters from the oracle, or `None` if it gave nothing usable.
    async fn correction(&self, name: &str, params: &Value, error: &str) -> Option<Map<String, Value>> {
        let prompt = format!(
            "ERP operation '{name}' failed with error: {error}\n\
             Parameters used: {params}\n\n\
             Analyze the error and suggest corrected parameters in JSON format.\n\
             Output only the corrected JSON parameters, no other text."
        );
        let reply = match self.oracle.suggest(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(operation = name, error = %e, "Correction oracle failed");
                return None;
            }
        };
        let corrected = parse_json_object(&reply);
        if corrected.is_none() {
            warn!(operation = name, reply = %reply, "Correction was not a JSON object");
        }
        corrected
    }
}

/// Error-shaped results are final; they are not retried.
fn render(operation: &dyn Operation, result: &Value) -> Outcome {
    let text = operation.format(result);
    match error_message(result) {
        None => Outcome::Success(text),
        Some(message) => {
            debug!(operation = operation.name(), message, "Operation rejected the request");
            if is_failure_text(&text) {
                Outcome::Failed(text)
            } else {
                Outcome::Failed(failure_text(message))
            }
        }
    }
}

/// First JSON object in `text`, tolerating code fences and surrounding prose.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    let unfenced = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(text)
        .trim();
    if let Ok(Value::Object(map)) = serde_json::from_str(unfenced) {
        return Some(map);
    }
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    match serde_json::from_str(unfenced.get(start..=end)?) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_objects_are_found_in_replies() {
        let fenced = "```json\n{\"amount\": 5000}\n```";
        assert_eq!(parse_json_object(fenced).unwrap()["amount"], 5000);

        let chatty = "Sure! Here you go: {\"invoice_id\": \"INV-50001\"} Hope that helps.";
        assert_eq!(parse_json_object(chatty).unwrap()["invoice_id"], "INV-50001");

        assert!(parse_json_object("[1, 2]").is_none());
        assert!(parse_json_object("no idea").is_none());
        assert!(parse_json_object("} backwards {").is_none());
    }

    #[test]
    fn outcome_text() {
        let ok = Outcome::Success("done".into());
        assert!(ok.is_success());
        assert_eq!(ok.text(), "done");
        assert_eq!(Outcome::Failed("x".into()).into_text(), "x");
    }
}

//! Argument accessors with operation-level defaults.
//!
//! Optional parameters may be absent when an operation is invoked directly
//! rather than through the resolver, which fills declared defaults.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use erpmind_common::{Arguments, OperationError};

pub(crate) fn text_or(args: &Arguments, name: &str, default: &str) -> Result<String, OperationError> {
    Ok(opt_text(args, name)?.unwrap_or_else(|| default.to_string()))
}

/// `None` when absent, null or blank.
pub(crate) fn opt_text(args: &Arguments, name: &str) -> Result<Option<String>, OperationError> {
    if !args.contains(name) {
        return Ok(None);
    }
    Ok(args
        .opt_string(name)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Required text that must not be blank.
pub(crate) fn non_empty(args: &Arguments, name: &str) -> Result<String, OperationError> {
    let value = args.string(name)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(OperationError::invalid(name, "must not be empty"));
    }
    Ok(value.to_string())
}

pub(crate) fn integer_or(args: &Arguments, name: &str, default: i64) -> Result<i64, OperationError> {
    match args.get(name) {
        None | Some(Value::Null) if !args.is_unresolved(name) => Ok(default),
        _ => args.integer(name),
    }
}

/// Dates are `YYYY-MM-DD`; absent or null means `today`.
pub(crate) fn date_or(args: &Arguments, name: &str, today: NaiveDate) -> Result<NaiveDate, OperationError> {
    match opt_text(args, name)? {
        None => Ok(today),
        Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|_| OperationError::invalid(name, format!("'{text}' is not a YYYY-MM-DD date"))),
    }
}

pub(crate) fn to_result<T: Serialize>(value: &T) -> Result<Value, OperationError> {
    serde_json::to_value(value).map_err(|e| OperationError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_apply_to_absent_and_null() {
        let mut args = Arguments::new();
        args.insert("threshold", Value::Null);
        assert_eq!(integer_or(&args, "threshold", 20).unwrap(), 20);
        assert_eq!(integer_or(&args, "missing", 5).unwrap(), 5);
        assert_eq!(text_or(&args, "period", "week").unwrap(), "week");

        args.insert("threshold", json!("15"));
        assert_eq!(integer_or(&args, "threshold", 20).unwrap(), 15);
    }

    #[test]
    fn unresolved_is_not_defaulted() {
        let mut args = Arguments::new();
        args.mark_unresolved("top_n");
        assert!(matches!(
            integer_or(&args, "top_n", 5),
            Err(OperationError::Unresolved(_))
        ));
    }

    #[test]
    fn dates_parse_or_fail_with_the_parameter_name() {
        let today = day(2025, 6, 15);
        let mut args = Arguments::new();
        assert_eq!(date_or(&args, "due_date", today).unwrap(), today);
        args.insert("due_date", json!("2025-07-01"));
        assert_eq!(date_or(&args, "due_date", today).unwrap(), day(2025, 7, 1));
        args.insert("due_date", json!("next friday"));
        let err = date_or(&args, "due_date", today).unwrap_err();
        assert_eq!(err.parameter(), Some("due_date"));
    }

    #[test]
    fn blank_required_text_is_invalid() {
        let mut args = Arguments::new();
        args.insert("company", json!("  "));
        assert_eq!(non_empty(&args, "company").unwrap_err().parameter(), Some("company"));
    }
}

//! Interpreting the model's reply as a tool choice.

use serde_json::{Map, Value};

use crate::correction::parse_json_object;
use crate::params::RawInput;

/// What the model asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    /// Run a catalog operation with the given input.
    Operation { name: String, input: RawInput },
    /// Reply directly without calling anything.
    Answer(String),
}

/// Parse a reply of the form `{"operation": name, "input": ...}` or
/// `{"answer": text}`. Anything else is taken as a direct answer.
pub fn parse_tool_choice(reply: &str) -> ToolChoice {
    let Some(mut object) = parse_json_object(reply) else {
        return ToolChoice::Answer(reply.trim().to_string());
    };

    if let Some(Value::String(name)) = object.remove("operation") {
        let input = ["input", "parameters", "args"]
            .iter()
            .find_map(|key| object.remove(*key))
            .map(RawInput::from_value)
            .unwrap_or_else(|| RawInput::Structured(Map::new()));
        return ToolChoice::Operation {
            name: name.trim().to_string(),
            input,
        };
    }

    match object.remove("answer") {
        Some(Value::String(answer)) => ToolChoice::Answer(answer),
        _ => ToolChoice::Answer(reply.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_input_is_kept() {
        let choice = parse_tool_choice(
            r#"{"operation": "get_unpaid_invoices", "input": {"client": "Acme"}}"#,
        );
        let ToolChoice::Operation { name, input } = choice else {
            panic!("expected an operation");
        };
        assert_eq!(name, "get_unpaid_invoices");
        let RawInput::Structured(map) = input else {
            panic!("expected structured input");
        };
        assert_eq!(map["client"], json!("Acme"));
    }

    #[test]
    fn string_input_is_classified() {
        let choice = parse_tool_choice(
            "```json\n{\"operation\": \"update_stock\", \"input\": \"ITEM-30001, 50\"}\n```",
        );
        assert_eq!(
            choice,
            ToolChoice::Operation {
                name: "update_stock".into(),
                input: RawInput::FreeText("ITEM-30001, 50".into()),
            }
        );

        let choice = parse_tool_choice(r#"{"operation": "update_stock", "input": ["ITEM-30001", 50]}"#);
        assert!(matches!(
            choice,
            ToolChoice::Operation { input: RawInput::Json(_), .. }
        ));
    }

    #[test]
    fn missing_input_is_empty() {
        let choice = parse_tool_choice(r#"{"operation": "get_sales_data"}"#);
        assert_eq!(
            choice,
            ToolChoice::Operation {
                name: "get_sales_data".into(),
                input: RawInput::Structured(Map::new()),
            }
        );
    }

    #[test]
    fn answers_and_prose() {
        assert_eq!(
            parse_tool_choice(r#"{"answer": "Nothing to do."}"#),
            ToolChoice::Answer("Nothing to do.".into())
        );
        assert_eq!(
            parse_tool_choice("  Stock looks healthy.  "),
            ToolChoice::Answer("Stock looks healthy.".into())
        );
    }
}

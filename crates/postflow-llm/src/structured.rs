//! Structured output with a single declared string field.
//!
//! The model is asked for a one-field JSON object. Replies are read leniently:
//! the first JSON object anywhere in the text is used (models like to wrap it
//! in prose or code fences), and when none carries the field the trimmed raw
//! text stands in for it. Parsing never fails.

use serde_json::Value;

/// Shape of a structured reply: `{"<field>": "<description>"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub field: String,
    pub description: String,
}

impl OutputSchema {
    #[must_use]
    pub fn new(field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            description: description.into(),
        }
    }

    /// Instruction appended to the prompt (placement depends on the template).
    #[must_use]
    pub fn format_instruction(&self) -> String {
        let mut example = serde_json::Map::new();
        example.insert(
            self.field.clone(),
            Value::String(self.description.clone()),
        );
        let example = Value::Object(example);
        format!(
            "Respond with only a JSON object with a single string field \"{field}\", \
             exactly like: {example}. Do not add any other text.",
            field = self.field
        )
    }

    /// Stable text used in cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.field, self.description)
    }

    /// Value of the declared field, or the trimmed reply when it cannot be found.
    #[must_use]
    pub fn parse_field(&self, raw: &str) -> String {
        match first_json_object(raw).and_then(|obj| field_value(&obj, &self.field)) {
            Some(value) => value,
            None => raw.trim().to_string(),
        }
    }
}

fn field_value(object: &Value, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// First parseable JSON object in `text`, trying each `{` in turn.
fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentiment() -> OutputSchema {
        OutputSchema::new("sentiment", "positive or negative")
    }

    #[test]
    fn test_format_instruction_names_field() {
        let text = sentiment().format_instruction();
        assert!(text.contains("\"sentiment\""));
        assert!(text.contains("{\"sentiment\":\"positive or negative\"}"));
    }

    #[test]
    fn test_parse_plain_object() {
        assert_eq!(sentiment().parse_field(r#"{"sentiment": "negative"}"#), "negative");
    }

    #[test]
    fn test_parse_object_wrapped_in_prose_and_fences() {
        let raw = "Sure! Here you go:\n```json\n{\"sentiment\": \" positive \"}\n```\nAnything else?";
        assert_eq!(sentiment().parse_field(raw), "positive");
    }

    #[test]
    fn test_skips_braces_that_are_not_json() {
        let raw = "The {feedback} was: {\"sentiment\": \"negative\"}";
        assert_eq!(sentiment().parse_field(raw), "negative");
    }

    #[test]
    fn test_non_string_value_is_stringified() {
        let schema = OutputSchema::new("response", "Valid or Invalid");
        assert_eq!(schema.parse_field(r#"{"response": true}"#), "true");
    }

    #[test]
    fn test_missing_field_falls_back_to_raw_text() {
        assert_eq!(
            sentiment().parse_field("  {\"mood\": \"happy\"}  "),
            "{\"mood\": \"happy\"}"
        );
        assert_eq!(sentiment().parse_field("\n positive \n"), "positive");
        assert_eq!(sentiment().parse_field(""), "");
    }

    #[test]
    fn test_fingerprint_distinguishes_fields() {
        assert_ne!(
            sentiment().fingerprint(),
            OutputSchema::new("response", "positive or negative").fingerprint()
        );
    }
}

//! Model reply parsing
//!
//! Models wrap JSON in prose and code fences often enough that parsing goes
//! through a lenient extraction step first: strip fences, find the first
//! balanced object, then deserialize strictly. Unknown fields are ignored;
//! missing fields default.

use serde::Deserialize;

use crate::NlpError;

/// Reply shape for intent detection.
#[derive(Debug, Deserialize)]
pub struct IntentReply {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Reply shape for category classification.
#[derive(Debug, Deserialize)]
pub struct CategoryReply {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Reply shape for entity extraction.
#[derive(Debug, Default, Deserialize)]
pub struct EntitiesReply {
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub business_names: Vec<String>,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub prices: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Pull the first balanced JSON object out of a model reply.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Lenient-then-strict parse of a model reply into a typed shape.
pub fn parse_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, NlpError> {
    let object = extract_json_object(text)
        .ok_or_else(|| NlpError::Unparseable(format!("no JSON object in reply: {text:.120}")))?;
    serde_json::from_str(object).map_err(|e| NlpError::InvalidReply(e.to_string()))
}

/// Clamp a model-reported confidence into [0, 1].
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let reply: IntentReply =
            parse_reply(r#"{"intent": "search", "confidence": 0.92}"#).unwrap();
        assert_eq!(reply.intent, "search");
        assert_eq!(reply.confidence, 0.92);
    }

    #[test]
    fn test_fenced_object() {
        let text = "Here you go:\n```json\n{\"intent\": \"book\", \"confidence\": 0.8}\n```";
        let reply: IntentReply = parse_reply(text).unwrap();
        assert_eq!(reply.intent, "book");
    }

    #[test]
    fn test_nested_object() {
        let text = r#"{"category": "food", "confidence": 0.9, "alternatives": ["cafe"], "extra": {"nested": "{}"}}"#;
        let reply: CategoryReply = parse_reply(text).unwrap();
        assert_eq!(reply.category, "food");
        assert_eq!(reply.alternatives, vec!["cafe".to_string()]);
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"category": "food {yum}", "confidence": 0.5}"#;
        let reply: CategoryReply = parse_reply(text).unwrap();
        assert_eq!(reply.category, "food {yum}");
    }

    #[test]
    fn test_missing_fields_default() {
        let reply: EntitiesReply = parse_reply(r#"{"locations": ["Mumbai"]}"#).unwrap();
        assert_eq!(reply.locations, vec!["Mumbai".to_string()]);
        assert!(reply.business_names.is_empty());
        assert_eq!(reply.confidence, 0.0);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let reply: IntentReply =
            parse_reply(r#"{"intent": "search", "confidence": 0.7, "reasoning": "because"}"#)
                .unwrap();
        assert_eq!(reply.intent, "search");
    }

    #[test]
    fn test_no_object_is_error() {
        let result: Result<IntentReply, _> = parse_reply("I cannot classify this.");
        assert!(result.is_err());
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(0.5), 0.5);
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }
}

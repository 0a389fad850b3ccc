use serde::Serialize;

use crate::budget::EffortLevel;

/// Chat-completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningParam>,
    /// Opaque provider parameters merged from configuration overrides.
    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// The three mutually exclusive reasoning-directive wire shapes.
///
/// Serialized untagged so each variant emits exactly its provider's
/// expected object: `{"effort": "high"}`, `{"max_tokens": 8000}`, or
/// `{"enabled": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReasoningParam {
    Effort { effort: EffortLevel },
    MaxTokens { max_tokens: u32 },
    Enabled { enabled: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_param_shapes() {
        let effort = serde_json::to_value(ReasoningParam::Effort {
            effort: EffortLevel::High,
        })
        .unwrap();
        assert_eq!(effort, serde_json::json!({"effort": "high"}));

        let tokens = serde_json::to_value(ReasoningParam::MaxTokens { max_tokens: 8000 }).unwrap();
        assert_eq!(tokens, serde_json::json!({"max_tokens": 8000}));

        let enabled = serde_json::to_value(ReasoningParam::Enabled { enabled: true }).unwrap();
        assert_eq!(enabled, serde_json::json!({"enabled": true}));
    }

    #[test]
    fn test_request_omits_absent_fields() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: 100,
            temperature: None,
            stream: None,
            reasoning: None,
            extra: serde_json::Map::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("temperature"));
        assert!(!obj.contains_key("stream"));
        assert!(!obj.contains_key("reasoning"));
    }

    #[test]
    fn test_extra_fields_flatten() {
        let mut extra = serde_json::Map::new();
        extra.insert("top_p".into(), serde_json::json!(0.9));
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![],
            max_tokens: 100,
            temperature: Some(0.7),
            stream: Some(true),
            reasoning: None,
            extra,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["top_p"], serde_json::json!(0.9));
    }
}

use serde_json::Value;

use super::payload::{ChatMessage, ChatRequest, ReasoningParam};
use crate::budget::{Budget, ReasoningDirective};
use crate::interpret::ReasoningState;
use crate::models::ModelSpec;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant analyzing code and files. Be concise and specific in your responses.";

const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Fields a provider request must never have rewritten by configuration.
const PROTECTED_KEYS: &[&str] = &["model", "messages", "stream", "reasoning"];

/// Configuration-supplied parameter overrides, applied after the computed
/// directive. Model-specific values win over provider-global ones.
#[derive(Debug, Clone, Default)]
pub struct ParameterOverrides {
    pub provider: serde_json::Map<String, Value>,
    pub model: serde_json::Map<String, Value>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        self.provider.is_empty() && self.model.is_empty()
    }
}

pub struct RequestBuilder;

impl RequestBuilder {
    /// Assemble the wire payload for one consultation.
    ///
    /// Returns the request plus the reasoning-state sentinel the interpreter
    /// uses to describe what was asked of the model.
    pub fn build(
        content: &str,
        query: &str,
        spec: &ModelSpec,
        budget: &Budget,
        overrides: Option<&ParameterOverrides>,
    ) -> (ChatRequest, ReasoningState) {
        let user_msg = format!("Here are the files to analyze:\n\n{content}\n\nQuery: {query}");

        let (reasoning, state) = match budget.directive {
            ReasoningDirective::None => (None, ReasoningState::NotRequested),
            ReasoningDirective::Effort(level) => (
                Some(ReasoningParam::Effort { effort: level }),
                ReasoningState::EffortRequested(level),
            ),
            ReasoningDirective::TokenBudget(tokens) => (
                Some(ReasoningParam::MaxTokens { max_tokens: tokens }),
                ReasoningState::BudgetAllotted(tokens),
            ),
            ReasoningDirective::Enabled(enabled) => (
                Some(ReasoningParam::Enabled { enabled }),
                if enabled {
                    ReasoningState::DynamicRequested
                } else {
                    ReasoningState::NotRequested
                },
            ),
        };

        let mut request = ChatRequest {
            model: spec.id.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(user_msg),
            ],
            max_tokens: budget.max_output_tokens,
            temperature: Some(DEFAULT_TEMPERATURE),
            stream: spec.supports_streaming.then_some(true),
            reasoning,
            extra: serde_json::Map::new(),
        };

        if let Some(overrides) = overrides {
            // Provider-global first so model-specific values win.
            Self::apply(&mut request, spec, &overrides.provider);
            Self::apply(&mut request, spec, &overrides.model);
        }

        (request, state)
    }

    fn apply(
        request: &mut ChatRequest,
        spec: &ModelSpec,
        overrides: &serde_json::Map<String, Value>,
    ) {
        for (key, value) in overrides {
            match key.as_str() {
                "max_tokens" => {
                    if let Some(tokens) = value.as_u64() {
                        // An override never widens the budget past the
                        // descriptor ceiling.
                        let clamped = (tokens.min(u64::from(u32::MAX)) as u32)
                            .min(spec.max_output_tokens);
                        if clamped as u64 != tokens {
                            tracing::warn!(
                                model = %spec.id,
                                requested = tokens,
                                clamped,
                                "max_tokens override clamped to descriptor ceiling"
                            );
                        }
                        request.max_tokens = clamped;
                    }
                }
                "temperature" => {
                    request.temperature = value.as_f64();
                }
                key if PROTECTED_KEYS.contains(&key) => {
                    tracing::warn!(model = %spec.id, key, "ignoring protected override key");
                }
                _ => {
                    request.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetCalculator, EffortLevel, PerformanceMode};
    use crate::models::{EffortRatios, ReasoningConvention};

    fn spec(reasoning: ReasoningConvention) -> ModelSpec {
        ModelSpec {
            id: "test/model".into(),
            context_length: 1_000_000,
            max_output_tokens: 16_000,
            reasoning,
            effort_ratios: EffortRatios::new(0.0, 0.3, 0.5),
            supports_streaming: true,
        }
    }

    fn build_for(
        convention: ReasoningConvention,
        mode: PerformanceMode,
    ) -> (ChatRequest, ReasoningState) {
        let s = spec(convention);
        let budget = BudgetCalculator::compute(&s, mode).unwrap();
        RequestBuilder::build("file contents", "what does this do?", &s, &budget, None)
    }

    #[test]
    fn test_message_layout() {
        let (request, _) = build_for(ReasoningConvention::None, PerformanceMode::Fast);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].content, SYSTEM_PROMPT);
        assert!(request.messages[1].content.contains("file contents"));
        assert!(request.messages[1].content.ends_with("Query: what does this do?"));
        assert_eq!(request.stream, Some(true));
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_effort_keyword_shape() {
        let (request, state) = build_for(ReasoningConvention::EffortKeyword, PerformanceMode::Think);
        assert_eq!(
            request.reasoning,
            Some(ReasoningParam::Effort {
                effort: EffortLevel::High
            })
        );
        assert_eq!(state, ReasoningState::EffortRequested(EffortLevel::High));
    }

    #[test]
    fn test_token_budget_shape() {
        let (request, state) = build_for(ReasoningConvention::TokenBudget, PerformanceMode::Think);
        match request.reasoning {
            Some(ReasoningParam::MaxTokens { max_tokens }) => {
                assert_eq!(state, ReasoningState::BudgetAllotted(max_tokens));
            }
            other => panic!("expected max_tokens shape, got {other:?}"),
        }
    }

    #[test]
    fn test_enabled_flag_shape() {
        let (request, state) = build_for(ReasoningConvention::EnabledFlag, PerformanceMode::Think);
        assert_eq!(
            request.reasoning,
            Some(ReasoningParam::Enabled { enabled: true })
        );
        assert_eq!(state, ReasoningState::DynamicRequested);

        let (request, state) = build_for(ReasoningConvention::EnabledFlag, PerformanceMode::Fast);
        assert_eq!(
            request.reasoning,
            Some(ReasoningParam::Enabled { enabled: false })
        );
        assert_eq!(state, ReasoningState::NotRequested);
    }

    #[test]
    fn test_fast_mode_emits_no_directive() {
        let (request, state) = build_for(ReasoningConvention::EffortKeyword, PerformanceMode::Fast);
        assert!(request.reasoning.is_none());
        assert_eq!(state, ReasoningState::NotRequested);
    }

    #[test]
    fn test_override_precedence_model_wins() {
        let s = spec(ReasoningConvention::None);
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Fast).unwrap();
        let mut overrides = ParameterOverrides::default();
        overrides
            .provider
            .insert("temperature".into(), serde_json::json!(0.2));
        overrides
            .provider
            .insert("top_p".into(), serde_json::json!(0.8));
        overrides
            .model
            .insert("temperature".into(), serde_json::json!(0.9));

        let (request, _) =
            RequestBuilder::build("c", "q", &s, &budget, Some(&overrides));
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.extra["top_p"], serde_json::json!(0.8));
    }

    #[test]
    fn test_override_cannot_widen_budget() {
        let s = spec(ReasoningConvention::None);
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Fast).unwrap();
        let mut overrides = ParameterOverrides::default();
        overrides
            .model
            .insert("max_tokens".into(), serde_json::json!(1_000_000));

        let (request, _) =
            RequestBuilder::build("c", "q", &s, &budget, Some(&overrides));
        assert_eq!(request.max_tokens, s.max_output_tokens);
    }

    #[test]
    fn test_protected_keys_ignored() {
        let s = spec(ReasoningConvention::None);
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Fast).unwrap();
        let mut overrides = ParameterOverrides::default();
        overrides
            .model
            .insert("model".into(), serde_json::json!("other/model"));
        overrides
            .model
            .insert("stream".into(), serde_json::json!(false));

        let (request, _) =
            RequestBuilder::build("c", "q", &s, &budget, Some(&overrides));
        assert_eq!(request.model, "test/model");
        assert_eq!(request.stream, Some(true));
        assert!(request.extra.is_empty());
    }
}

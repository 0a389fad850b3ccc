use serde::{Deserialize, Serialize};

pub type ModelId = String;

/// Immutable capability descriptor for one model.
///
/// Owned exclusively by [`super::ModelRegistry`]; looked up by id and never
/// mutated after registry construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: ModelId,
    /// Context window in tokens.
    pub context_length: u64,
    /// Hard ceiling on output tokens, reasoning included.
    pub max_output_tokens: u32,
    /// Which reasoning-control convention the provider speaks.
    pub reasoning: ReasoningConvention,
    /// Fractional share of the output budget reasoning consumes per mode.
    /// Only meaningful for `EffortKeyword` and `TokenBudget` conventions.
    #[serde(default)]
    pub effort_ratios: EffortRatios,
    pub supports_streaming: bool,
}

/// The reasoning-control conventions are mutually incompatible wire formats;
/// request construction matches exhaustively on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningConvention {
    /// Model has no reasoning support.
    None,
    /// Provider accepts a qualitative effort level (low/medium/high).
    EffortKeyword,
    /// Provider accepts an explicit reasoning-token cap.
    TokenBudget,
    /// Provider accepts a boolean toggle and manages its own budget.
    EnabledFlag,
}

/// Per-mode fractional reasoning cost, each in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffortRatios {
    pub fast: f64,
    pub mid: f64,
    pub think: f64,
}

impl Default for EffortRatios {
    fn default() -> Self {
        Self::NONE
    }
}

impl EffortRatios {
    /// No reasoning cost in any mode.
    pub const NONE: Self = Self {
        fast: 0.0,
        mid: 0.0,
        think: 0.0,
    };

    pub fn new(fast: f64, mid: f64, think: f64) -> Self {
        Self { fast, mid, think }
    }

    pub fn is_valid(&self) -> bool {
        [self.fast, self.mid, self.think]
            .iter()
            .all(|r| (0.0..1.0).contains(r))
    }
}

impl ModelSpec {
    /// Structural validity check used when merging external entries.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("model id must not be empty".into());
        }
        if self.context_length == 0 {
            return Err("context_length must be positive".into());
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be positive".into());
        }
        if !self.effort_ratios.is_valid() {
            return Err("effort ratios must be in [0, 1)".into());
        }
        Ok(())
    }
}

//! Pure budget arithmetic: output-token allotments and input byte ceilings.
//!
//! Reasoning-capable models consume part of their output allowance on
//! internal deliberation. A fixed ceiling without compensation produces
//! empty or truncated visible answers, so the realized budget is inflated by
//! the mode's effort ratio before clamping to the descriptor's hard maximum.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{ModelSpec, ReasoningConvention};
use crate::{Error, Result};

/// Default visible-output allotment in tokens (~300 lines of code).
pub const DEFAULT_OUTPUT_TOKENS: u32 = 8_000;
/// Visible-output allotment for small-context models.
pub const SMALL_OUTPUT_TOKENS: u32 = 4_000;
/// Context length at or below which a model counts as small.
pub const SMALL_MODEL_THRESHOLD: u64 = 100_000;
/// Floor for an explicit reasoning-token cap; providers reject lower values.
pub const MIN_REASONING_TOKENS: u32 = 1_024;

/// Character-based token estimate for code and prose.
pub const BYTES_PER_TOKEN: f64 = 3.2;
/// Context share always reserved for the query text and response headroom.
const FIXED_RESERVED_FRACTION: f64 = 0.05;

/// Caller-chosen performance tier controlling how much reasoning to request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Fast,
    #[default]
    Mid,
    Think,
}

impl PerformanceMode {
    /// Context share reserved for reasoning overhead in this mode, on top of
    /// the fixed query/headroom reservation.
    fn reasoning_reserved_fraction(self) -> f64 {
        match self {
            PerformanceMode::Fast => 0.05,
            PerformanceMode::Mid => 0.15,
            PerformanceMode::Think => 0.30,
        }
    }
}

impl std::fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PerformanceMode::Fast => "fast",
            PerformanceMode::Mid => "mid",
            PerformanceMode::Think => "think",
        };
        f.write_str(s)
    }
}

impl FromStr for PerformanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fast" => Ok(PerformanceMode::Fast),
            "mid" => Ok(PerformanceMode::Mid),
            "think" => Ok(PerformanceMode::Think),
            other => Err(Error::Config(format!(
                "unknown performance mode '{other}' (expected fast, mid, or think)"
            ))),
        }
    }
}

/// Qualitative effort level for `effort_keyword` providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EffortLevel::Low => "low",
            EffortLevel::Medium => "medium",
            EffortLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// The concrete wire-level reasoning instruction to emit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReasoningDirective {
    /// No reasoning parameter at all.
    None,
    /// Qualitative effort keyword.
    Effort(EffortLevel),
    /// Explicit reasoning-token cap.
    TokenBudget(u32),
    /// Boolean toggle; the provider allocates its own budget.
    Enabled(bool),
}

/// Per-request budget, derived from one descriptor and one mode.
///
/// Never persisted; owned by the call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    /// Realized output ceiling sent to the provider, reasoning included.
    /// Invariant: never exceeds the descriptor's `max_output_tokens`.
    pub max_output_tokens: u32,
    /// Ceiling on assembled file content, in bytes.
    pub max_input_bytes: u64,
    pub directive: ReasoningDirective,
}

pub struct BudgetCalculator;

impl BudgetCalculator {
    /// Derive the budget for one request.
    ///
    /// Fails with [`Error::UnsupportedFeature`] when reasoning is explicitly
    /// requested (`think`) on a model with no reasoning support, and with
    /// [`Error::UnsupportedMode`] only for malformed descriptors.
    pub fn compute(spec: &ModelSpec, mode: PerformanceMode) -> Result<Budget> {
        if !spec.effort_ratios.is_valid() {
            return Err(Error::UnsupportedMode {
                model: spec.id.clone(),
                mode: mode.to_string(),
            });
        }

        let visible = Self::desired_visible_output(spec);
        let (max_output_tokens, directive) = match spec.reasoning {
            ReasoningConvention::None => {
                if mode == PerformanceMode::Think {
                    return Err(Error::UnsupportedFeature {
                        model: spec.id.clone(),
                        feature: "reasoning".into(),
                    });
                }
                (visible, ReasoningDirective::None)
            }
            ReasoningConvention::EffortKeyword => {
                let realized = Self::realized_output(spec, mode, visible);
                let directive = match mode {
                    PerformanceMode::Fast => ReasoningDirective::None,
                    PerformanceMode::Mid => ReasoningDirective::Effort(EffortLevel::Medium),
                    PerformanceMode::Think => ReasoningDirective::Effort(EffortLevel::High),
                };
                (realized, directive)
            }
            ReasoningConvention::TokenBudget => {
                let realized = Self::realized_output(spec, mode, visible);
                let reasoning = realized.saturating_sub(visible);
                let directive = if reasoning == 0 {
                    ReasoningDirective::None
                } else {
                    ReasoningDirective::TokenBudget(reasoning.max(MIN_REASONING_TOKENS))
                };
                (realized, directive)
            }
            ReasoningConvention::EnabledFlag => {
                // The provider manages its own dynamic budget; grant the raw
                // descriptor maximum so deliberation cannot starve the answer.
                let enabled = mode != PerformanceMode::Fast;
                (
                    spec.max_output_tokens,
                    ReasoningDirective::Enabled(enabled),
                )
            }
        };

        Ok(Budget {
            max_output_tokens,
            max_input_bytes: Self::max_input_bytes(spec, mode),
            directive,
        })
    }

    /// Visible answer length the caller should receive, before reasoning
    /// inflation.
    pub fn desired_visible_output(spec: &ModelSpec) -> u32 {
        let visible = if spec.context_length > SMALL_MODEL_THRESHOLD {
            DEFAULT_OUTPUT_TOKENS
        } else {
            SMALL_OUTPUT_TOKENS
        };
        visible.min(spec.max_output_tokens)
    }

    /// Effort-ratio formula: `ceil(visible / (1 - r))`, clamped to the
    /// descriptor ceiling.
    fn realized_output(spec: &ModelSpec, mode: PerformanceMode, visible: u32) -> u32 {
        let r = match mode {
            PerformanceMode::Fast => spec.effort_ratios.fast,
            PerformanceMode::Mid => spec.effort_ratios.mid,
            PerformanceMode::Think => spec.effort_ratios.think,
        };
        let realized = (f64::from(visible) / (1.0 - r)).ceil() as u32;
        realized.min(spec.max_output_tokens)
    }

    /// Dynamic per-request ceiling on assembled file content.
    pub fn max_input_bytes(spec: &ModelSpec, mode: PerformanceMode) -> u64 {
        let reserved = FIXED_RESERVED_FRACTION + mode.reasoning_reserved_fraction();
        (spec.context_length as f64 * BYTES_PER_TOKEN * (1.0 - reserved)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EffortRatios;

    fn spec(
        context_length: u64,
        max_output_tokens: u32,
        reasoning: ReasoningConvention,
        ratios: EffortRatios,
    ) -> ModelSpec {
        ModelSpec {
            id: "test/model".into(),
            context_length,
            max_output_tokens,
            reasoning,
            effort_ratios: ratios,
            supports_streaming: true,
        }
    }

    #[test]
    fn test_ceiling_invariant_all_conventions_and_modes() {
        let specs = [
            spec(
                1_000_000,
                16_000,
                ReasoningConvention::TokenBudget,
                EffortRatios::new(0.0, 0.3, 0.6),
            ),
            spec(
                1_000_000,
                9_000,
                ReasoningConvention::EffortKeyword,
                EffortRatios::new(0.0, 0.5, 0.8),
            ),
            spec(
                1_000_000,
                65_536,
                ReasoningConvention::EnabledFlag,
                EffortRatios::NONE,
            ),
            spec(
                128_000,
                4_096,
                ReasoningConvention::None,
                EffortRatios::NONE,
            ),
        ];
        for s in &specs {
            for mode in [
                PerformanceMode::Fast,
                PerformanceMode::Mid,
                PerformanceMode::Think,
            ] {
                let Ok(budget) = BudgetCalculator::compute(s, mode) else {
                    continue; // think on no-reasoning model is a caller error
                };
                assert!(
                    budget.max_output_tokens <= s.max_output_tokens,
                    "{} {mode}: {} > {}",
                    s.id,
                    budget.max_output_tokens,
                    s.max_output_tokens
                );
            }
        }
    }

    #[test]
    fn test_effort_ratio_formula_pre_clamp() {
        // ratio 0.5, visible 4000 (small-context model) -> realized 8000
        let s = spec(
            100_000,
            64_000,
            ReasoningConvention::EffortKeyword,
            EffortRatios::new(0.0, 0.25, 0.5),
        );
        assert_eq!(BudgetCalculator::desired_visible_output(&s), 4_000);
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Think).unwrap();
        assert_eq!(budget.max_output_tokens, 8_000);
        assert_eq!(
            budget.directive,
            ReasoningDirective::Effort(EffortLevel::High)
        );
    }

    #[test]
    fn test_realized_budget_is_clamped() {
        let s = spec(
            1_000_000,
            10_000,
            ReasoningConvention::TokenBudget,
            EffortRatios::new(0.0, 0.3, 0.6),
        );
        // unclamped: ceil(8000 / 0.4) = 20000
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Think).unwrap();
        assert_eq!(budget.max_output_tokens, 10_000);
    }

    #[test]
    fn test_token_budget_directive_carries_reasoning_share() {
        let s = spec(
            1_000_000,
            64_000,
            ReasoningConvention::TokenBudget,
            EffortRatios::new(0.0, 0.3, 0.5),
        );
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Think).unwrap();
        // realized = ceil(8000 / 0.5) = 16000, reasoning = 8000
        assert_eq!(budget.max_output_tokens, 16_000);
        assert_eq!(budget.directive, ReasoningDirective::TokenBudget(8_000));
    }

    #[test]
    fn test_token_budget_respects_minimum() {
        let s = spec(
            1_000_000,
            64_000,
            ReasoningConvention::TokenBudget,
            EffortRatios::new(0.0, 0.05, 0.5),
        );
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Mid).unwrap();
        match budget.directive {
            ReasoningDirective::TokenBudget(n) => assert!(n >= MIN_REASONING_TOKENS),
            other => panic!("expected token budget, got {other:?}"),
        }
    }

    #[test]
    fn test_enabled_flag_uses_raw_maximum() {
        let s = spec(
            1_000_000,
            65_536,
            ReasoningConvention::EnabledFlag,
            EffortRatios::NONE,
        );
        let budget = BudgetCalculator::compute(&s, PerformanceMode::Think).unwrap();
        assert_eq!(budget.max_output_tokens, 65_536);
        assert_eq!(budget.directive, ReasoningDirective::Enabled(true));

        let budget = BudgetCalculator::compute(&s, PerformanceMode::Fast).unwrap();
        assert_eq!(budget.directive, ReasoningDirective::Enabled(false));
    }

    #[test]
    fn test_think_on_no_reasoning_model_is_unsupported() {
        let s = spec(
            128_000,
            8_000,
            ReasoningConvention::None,
            EffortRatios::NONE,
        );
        let err = BudgetCalculator::compute(&s, PerformanceMode::Think).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { .. }));
        // fast and mid still resolve
        assert!(BudgetCalculator::compute(&s, PerformanceMode::Fast).is_ok());
        assert!(BudgetCalculator::compute(&s, PerformanceMode::Mid).is_ok());
    }

    #[test]
    fn test_input_ceiling_ordering() {
        let s = spec(
            200_000,
            8_000,
            ReasoningConvention::TokenBudget,
            EffortRatios::new(0.0, 0.3, 0.5),
        );
        let fast = BudgetCalculator::max_input_bytes(&s, PerformanceMode::Fast);
        let mid = BudgetCalculator::max_input_bytes(&s, PerformanceMode::Mid);
        let think = BudgetCalculator::max_input_bytes(&s, PerformanceMode::Think);
        assert!(think < mid, "think ({think}) must reserve more than mid ({mid})");
        assert!(mid < fast, "mid ({mid}) must reserve more than fast ({fast})");
    }

    #[test]
    fn test_malformed_ratios_are_internal_errors() {
        let s = spec(
            128_000,
            8_000,
            ReasoningConvention::TokenBudget,
            EffortRatios::new(0.0, 0.3, 1.5),
        );
        let err = BudgetCalculator::compute(&s, PerformanceMode::Mid).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMode { .. }));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("think".parse::<PerformanceMode>().unwrap(), PerformanceMode::Think);
        assert!("turbo".parse::<PerformanceMode>().is_err());
        assert_eq!(PerformanceMode::default(), PerformanceMode::Mid);
    }
}

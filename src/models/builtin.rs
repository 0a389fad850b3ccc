use super::registry::ModelRegistry;
use super::spec::{EffortRatios, ModelSpec, ReasoningConvention};

pub fn register_all(registry: &mut ModelRegistry) {
    registry.register(gemini_2_5_flash());
    registry.register(gemini_2_5_pro());
    registry.register(gemini_3_pro());
    registry.register(claude_sonnet_4());
    registry.register(claude_opus_4());
    registry.register(gpt_4_1());
    registry.register(gpt_4_1_mini());
    registry.register(o1());
    registry.register(gpt_4o_mini());
}

fn gemini_2_5_flash() -> ModelSpec {
    ModelSpec {
        id: "google/gemini-2.5-flash".into(),
        context_length: 1_048_576,
        max_output_tokens: 65_536,
        reasoning: ReasoningConvention::TokenBudget,
        // Flash caps thinking at 24_576 tokens; roughly half the realized
        // budget at full effort.
        effort_ratios: EffortRatios::new(0.0, 0.3, 0.5),
        supports_streaming: true,
    }
}

fn gemini_2_5_pro() -> ModelSpec {
    ModelSpec {
        id: "google/gemini-2.5-pro".into(),
        context_length: 1_048_576,
        max_output_tokens: 65_536,
        reasoning: ReasoningConvention::TokenBudget,
        effort_ratios: EffortRatios::new(0.0, 0.35, 0.6),
        supports_streaming: true,
    }
}

fn gemini_3_pro() -> ModelSpec {
    ModelSpec {
        id: "google/gemini-3-pro".into(),
        context_length: 1_048_576,
        max_output_tokens: 65_536,
        // Gemini 3 allocates its own thinking budget dynamically; the wire
        // parameter is a toggle, not a token count.
        reasoning: ReasoningConvention::EnabledFlag,
        effort_ratios: EffortRatios::NONE,
        supports_streaming: true,
    }
}

fn claude_sonnet_4() -> ModelSpec {
    ModelSpec {
        id: "anthropic/claude-sonnet-4".into(),
        context_length: 200_000,
        max_output_tokens: 64_000,
        reasoning: ReasoningConvention::TokenBudget,
        effort_ratios: EffortRatios::new(0.0, 0.3, 0.5),
        supports_streaming: true,
    }
}

fn claude_opus_4() -> ModelSpec {
    ModelSpec {
        id: "anthropic/claude-opus-4".into(),
        context_length: 200_000,
        max_output_tokens: 32_000,
        reasoning: ReasoningConvention::TokenBudget,
        effort_ratios: EffortRatios::new(0.0, 0.3, 0.5),
        supports_streaming: true,
    }
}

fn gpt_4_1() -> ModelSpec {
    ModelSpec {
        id: "openai/gpt-4.1".into(),
        context_length: 1_047_576,
        max_output_tokens: 32_768,
        reasoning: ReasoningConvention::EffortKeyword,
        // effort=high historically consumed ~80% of the output budget.
        effort_ratios: EffortRatios::new(0.0, 0.5, 0.8),
        supports_streaming: true,
    }
}

fn gpt_4_1_mini() -> ModelSpec {
    ModelSpec {
        id: "openai/gpt-4.1-mini".into(),
        context_length: 1_047_576,
        max_output_tokens: 32_768,
        reasoning: ReasoningConvention::EffortKeyword,
        effort_ratios: EffortRatios::new(0.0, 0.5, 0.8),
        supports_streaming: true,
    }
}

fn o1() -> ModelSpec {
    ModelSpec {
        id: "openai/o1".into(),
        context_length: 200_000,
        max_output_tokens: 100_000,
        reasoning: ReasoningConvention::EffortKeyword,
        effort_ratios: EffortRatios::new(0.0, 0.5, 0.8),
        supports_streaming: true,
    }
}

fn gpt_4o_mini() -> ModelSpec {
    ModelSpec {
        id: "openai/gpt-4o-mini".into(),
        context_length: 128_000,
        max_output_tokens: 16_384,
        reasoning: ReasoningConvention::None,
        effort_ratios: EffortRatios::NONE,
        supports_streaming: true,
    }
}

//! Maps dispatch outcomes and reasoning-state sentinels into the
//! caller-facing result shape. No error escapes this layer; every path
//! returns a structured reply.

use serde::Serialize;

use crate::budget::EffortLevel;
use crate::stream::{FailureKind, StreamOutcome, TokenUsage};
use crate::Error;

/// What was asked of the model's reasoning machinery, fixed at request-build
/// time. An explicit tagged value rather than a numeric sentinel, so it
/// cannot be mistaken for a token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningState {
    /// No reasoning directive was emitted.
    NotRequested,
    /// A qualitative effort keyword was emitted.
    EffortRequested(EffortLevel),
    /// An explicit reasoning-token cap was emitted.
    BudgetAllotted(u32),
    /// A dynamic-reasoning toggle was emitted; whether the model actually
    /// reasoned is only observable in the response.
    DynamicRequested,
}

/// Fixed caller-facing strings for the three observable dynamic-reasoning
/// response states.
pub const DYNAMIC_REASONING_USED: &str = "dynamic reasoning: used";
pub const DYNAMIC_REASONING_UNUSED: &str = "dynamic reasoning: enabled but not used";
pub const DYNAMIC_REASONING_UNSUPPORTED: &str = "dynamic reasoning: not supported by this model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Complete,
    Truncated,
    Error,
}

/// Final structured result returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ConsultReply {
    pub status: ReplyStatus,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Map a dispatch outcome plus the reasoning sentinel into the final reply.
pub fn interpret(
    outcome: StreamOutcome,
    state: ReasoningState,
    file_count: usize,
    content_bytes: u64,
) -> ConsultReply {
    match outcome {
        StreamOutcome::Complete {
            text,
            reasoning_text,
            usage,
        } => ConsultReply {
            status: ReplyStatus::Complete,
            text,
            reasoning_note: reasoning_note(state, &reasoning_text, usage.as_ref()),
            usage,
        },
        StreamOutcome::Truncated {
            partial_text,
            elapsed,
            reason,
        } => {
            let notice = format!(
                "[Truncated after {:.1}s ({reason}); partial answer below covers {file_count} files ({content_bytes} bytes) processed]\n\n",
                elapsed.as_secs_f64(),
            );
            ConsultReply {
                status: ReplyStatus::Truncated,
                text: format!("{notice}{partial_text}"),
                reasoning_note: None,
                usage: None,
            }
        }
        StreamOutcome::TimedOut { elapsed } => {
            let err = Error::TimedOut(elapsed);
            error_reply(format!("Error: {err}"), err.hint())
        }
        StreamOutcome::Failed { kind, detail } => {
            error_reply(format!("Error ({kind}): {detail}"), failure_hint(kind))
        }
    }
}

/// Map a pre-dispatch error (unknown model, oversized input, ...) into the
/// same structured reply shape.
pub fn interpret_error(err: &Error) -> ConsultReply {
    error_reply(format!("Error: {err}"), err.hint())
}

fn error_reply(message: String, hint: &str) -> ConsultReply {
    ConsultReply {
        status: ReplyStatus::Error,
        text: format!("{message}\nHint: {hint}"),
        reasoning_note: None,
        usage: None,
    }
}

fn failure_hint(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::AuthFailure => "verify the API key and its access to the requested model",
        FailureKind::RateLimited => "wait and retry, or reduce request frequency",
        FailureKind::NetworkFailure => "check connectivity and the configured endpoint URL",
        FailureKind::UpstreamServerError => {
            "upstream failure - the model may be overloaded, try again later"
        }
        FailureKind::MalformedUpstreamResponse => {
            "the endpoint returned an unexpected payload - verify it is OpenAI-compatible"
        }
    }
}

fn reasoning_note(
    state: ReasoningState,
    reasoning_text: &str,
    usage: Option<&TokenUsage>,
) -> Option<String> {
    match state {
        ReasoningState::NotRequested => None,
        ReasoningState::EffortRequested(level) => {
            Some(format!("reasoning effort: {level}"))
        }
        ReasoningState::BudgetAllotted(tokens) => {
            Some(format!("reasoning budget: {tokens} tokens"))
        }
        ReasoningState::DynamicRequested => {
            let note = if !reasoning_text.is_empty() {
                DYNAMIC_REASONING_USED
            } else {
                match usage.and_then(|u| u.reasoning_tokens()) {
                    Some(n) if n > 0 => DYNAMIC_REASONING_USED,
                    Some(_) => DYNAMIC_REASONING_UNUSED,
                    None => DYNAMIC_REASONING_UNSUPPORTED,
                }
            };
            Some(note.to_string())
        }
    }
}

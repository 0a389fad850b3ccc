//! Wire-level request construction for OpenAI-compatible endpoints.

mod builder;
mod payload;

pub use builder::{ParameterOverrides, RequestBuilder, SYSTEM_PROMPT};
pub use payload::{ChatMessage, ChatRequest, ReasoningParam, Role};

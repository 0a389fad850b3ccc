//! Streaming dispatch: SSE consumption with a hard deadline.

mod dispatcher;
mod parser;

pub use dispatcher::{FailureKind, StreamOutcome, dispatch};
pub use parser::{
    ChatChunk, ChunkChoice, ChunkDelta, CompletionTokensDetails, SseParser, TokenUsage,
};

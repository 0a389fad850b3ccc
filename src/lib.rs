//! # consult
//!
//! Consult large-context language models over OpenAI-compatible
//! chat-completions endpoints.
//!
//! Given a model identifier and a performance mode, this crate resolves the
//! model's capabilities (context window, reasoning convention), computes a
//! safe output-token budget and input byte ceiling, builds the wire-level
//! request for one of several mutually incompatible reasoning-control
//! conventions, dispatches it as a bounded-duration event stream, and
//! reassembles a complete answer or a precise failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use consult::{Consultation, ConsultRequest, PerformanceMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), consult::Error> {
//!     let consultation = Consultation::builder()
//!         .api_key("sk-or-v1-...")
//!         .build()?;
//!
//!     let reply = consultation
//!         .consult(ConsultRequest {
//!             content: "fn main() { ... }".into(),
//!             content_bytes: 18,
//!             file_count: 1,
//!             query: "Summarize this program".into(),
//!             model_id: "google/gemini-2.5-pro".into(),
//!             mode: PerformanceMode::Think,
//!             timeout: None,
//!             overrides: None,
//!         })
//!         .await;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod budget;
pub mod config;
pub mod engine;
pub mod interpret;
pub mod models;
pub mod request;
pub mod stream;

pub use budget::{Budget, BudgetCalculator, EffortLevel, PerformanceMode, ReasoningDirective};
pub use config::{ConfigIssue, LoadedConfig, ProviderEndpoint, ProviderFile, load_provider_file};
pub use engine::{ConsultRequest, Consultation, ConsultationBuilder};
pub use interpret::{ConsultReply, ReasoningState, ReplyStatus, interpret};
pub use models::{EffortRatios, ModelRegistry, ModelSpec, ReasoningConvention, RegistryRejection};
pub use stream::{FailureKind, SseParser, StreamOutcome, TokenUsage, dispatch};

/// Error type for consultation operations.
///
/// Every variant names the failure kind; [`Error::hint`] adds an actionable
/// suggestion suitable for surfacing to the caller verbatim. Conditions
/// observed on an in-flight dispatch (auth rejection, rate limits, upstream
/// 5xx) are reported through [`stream::FailureKind`] in the dispatch
/// outcome, not here.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Requested model id is not present in the registry.
    #[error("unknown model '{0}'")]
    ModelNotFound(String),

    /// Requested mode or feature is not supported by the model.
    #[error("{feature} is not supported by model '{model}'")]
    UnsupportedFeature { model: String, feature: String },

    /// Descriptor declares no behavior for the requested mode. Internal
    /// invariant violation: well-formed descriptors resolve every mode.
    #[error("model '{model}' has no mapping for mode '{mode}'")]
    UnsupportedMode { model: String, mode: String },

    /// Assembled content exceeds the computed input byte ceiling.
    #[error("content too large: {collected} bytes collected, limit is {limit} bytes")]
    OversizedInput { collected: u64, limit: u64 },

    /// Connection, DNS, or TLS failure.
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Deadline expired before any response data arrived.
    #[error("request timed out after {:.1}s", .0.as_secs_f64())]
    TimedOut(std::time::Duration),

    /// Upstream payload could not be parsed.
    #[error("malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed (configuration loading only).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category for coarse-grained handling at the dispatch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input from the caller (unknown model, oversized content).
    Caller,
    /// Configuration or setup errors.
    Configuration,
    /// Network or upstream errors.
    Upstream,
    /// Deadline expiry.
    Deadline,
    /// Internal errors (IO, JSON, invariant violations).
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ModelNotFound(_)
            | Error::UnsupportedFeature { .. }
            | Error::OversizedInput { .. } => ErrorCategory::Caller,

            Error::Config(_) => ErrorCategory::Configuration,

            Error::Network(_) | Error::MalformedUpstreamResponse(_) => ErrorCategory::Upstream,

            Error::TimedOut(_) => ErrorCategory::Deadline,

            Error::UnsupportedMode { .. } | Error::Json(_) | Error::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Actionable suggestion for resolving this error.
    pub fn hint(&self) -> &'static str {
        match self {
            Error::ModelNotFound(_) => {
                "check the model id against the registry, or add it via provider configuration"
            }
            Error::UnsupportedFeature { .. } => {
                "model does not support reasoning - try a different mode or model"
            }
            Error::UnsupportedMode { .. } => {
                "descriptor is malformed - every model must resolve all three modes"
            }
            Error::OversizedInput { .. } => {
                "content too large - use fewer files or a larger-context model"
            }
            Error::Network(_) => "check connectivity and the configured endpoint URL",
            Error::TimedOut(_) => "raise the timeout, use fewer files, or pick a faster mode",
            Error::MalformedUpstreamResponse(_) => {
                "the endpoint returned an unexpected payload - verify it is OpenAI-compatible"
            }
            Error::Config(_) => "fix the provider configuration file and restart",
            Error::Json(_) | Error::Io(_) => "internal error - please report this",
        }
    }

    pub fn is_caller_error(&self) -> bool {
        self.category() == ErrorCategory::Caller
    }
}

/// Result alias for consultation operations.
pub type Result<T> = std::result::Result<T, Error>;

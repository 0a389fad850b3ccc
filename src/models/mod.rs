//! Model capability registry.
//!
//! Maps a model identifier to its capability descriptor: context window,
//! output ceiling, and which reasoning-control convention its provider
//! speaks. Built-in entries are compiled in; externally configured entries
//! are merged in a second pass and can never displace a built-in.

mod builtin;
mod registry;
mod spec;

pub use registry::{ModelRegistry, RegistryRejection, RejectionReason};
pub use spec::{EffortRatios, ModelId, ModelSpec, ReasoningConvention};

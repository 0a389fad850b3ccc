//! Declarative configuration for custom OpenAI-compatible providers.
//!
//! Loaded once at start-up. A malformed file or entry never prevents
//! built-in descriptors from loading: invalid providers are skipped and the
//! problems collected into a side list for the operator.

mod loader;

pub use loader::{
    Authentication, ConfigIssue, CustomProvider, FeatureSupport, LoadedConfig, ModelEntry,
    ProviderEndpoint, ProviderFile, load_provider_file,
};

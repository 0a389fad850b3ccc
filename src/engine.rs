//! Caller-facing consultation flow.
//!
//! One `consult` call is a single request-response flow: registry lookup,
//! budget derivation, pre-network oversize rejection, payload construction,
//! bounded-duration dispatch, interpretation. No retries, no state held
//! across calls; concurrent calls share only the read-only registry.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::budget::{BudgetCalculator, PerformanceMode};
use crate::config::{ProviderEndpoint, load_provider_file};
use crate::interpret::{ConsultReply, interpret, interpret_error};
use crate::models::ModelRegistry;
use crate::request::{ParameterOverrides, RequestBuilder};
use crate::stream::dispatch;
use crate::{Error, Result};

/// Default endpoint when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Default deadline; leaves headroom under typical tool-invocation timeouts.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(180);

/// One consultation request, with content pre-assembled by the caller.
#[derive(Debug, Clone)]
pub struct ConsultRequest {
    /// Assembled file content. The caller is responsible for staying under
    /// the computed byte ceiling; oversize is rejected, never truncated.
    pub content: String,
    pub content_bytes: u64,
    pub file_count: usize,
    pub query: String,
    pub model_id: String,
    pub mode: PerformanceMode,
    /// Per-call deadline override.
    pub timeout: Option<Duration>,
    /// Per-call parameter overrides, layered under any configured ones.
    pub overrides: Option<ParameterOverrides>,
}

/// Consultation engine: owns the registry, HTTP client, and credentials.
#[derive(Debug)]
pub struct Consultation {
    registry: Arc<ModelRegistry>,
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    deadline: Duration,
    startup_issues: Vec<String>,
}

impl Consultation {
    pub fn builder() -> ConsultationBuilder {
        ConsultationBuilder::default()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Problems found while loading external configuration at start-up.
    /// Built-ins load regardless; these are surfaced for the operator.
    pub fn startup_issues(&self) -> &[String] {
        &self.startup_issues
    }

    /// Run one consultation. Never fails: every error is folded into a
    /// structured reply for the surrounding server to wrap.
    pub async fn consult(&self, request: ConsultRequest) -> ConsultReply {
        match self.run(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(model = %request.model_id, error = %err, "consultation failed");
                interpret_error(&err)
            }
        }
    }

    async fn run(&self, request: &ConsultRequest) -> Result<ConsultReply> {
        let spec = self.registry.lookup(&request.model_id)?;
        let budget = BudgetCalculator::compute(spec, request.mode)?;

        if request.content_bytes > budget.max_input_bytes {
            return Err(Error::OversizedInput {
                collected: request.content_bytes,
                limit: budget.max_input_bytes,
            });
        }

        let (payload, state) = RequestBuilder::build(
            &request.content,
            &request.query,
            spec,
            &budget,
            request.overrides.as_ref(),
        );

        let deadline = request.timeout.unwrap_or(self.deadline);
        let outcome = dispatch(&self.client, &self.endpoint, &self.api_key, &payload, deadline).await;

        Ok(interpret(
            outcome,
            state,
            request.file_count,
            request.content_bytes,
        ))
    }
}

/// Builder for [`Consultation`].
#[derive(Default)]
pub struct ConsultationBuilder {
    api_key: Option<SecretString>,
    endpoint: Option<String>,
    deadline: Option<Duration>,
    registry: Option<ModelRegistry>,
    startup_issues: Vec<String>,
}

impl ConsultationBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use a pre-built registry (fixture registries in tests).
    pub fn registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Merge custom providers and models from a YAML configuration file.
    ///
    /// Built-ins always load; rejected entries and file problems are
    /// collected into [`Consultation::startup_issues`].
    pub fn provider_config(mut self, path: &Path) -> Self {
        let loaded = load_provider_file(path);
        let mut registry = self.registry.take().unwrap_or_else(ModelRegistry::builtins);

        for issue in &loaded.issues {
            self.startup_issues
                .push(format!("provider '{}': {}", issue.provider, issue.message));
        }
        for rejection in registry.merge_external(loaded.models) {
            self.startup_issues
                .push(format!("model '{}': {}", rejection.id, rejection.reason));
        }

        self.registry = Some(registry);
        self
    }

    /// Point the engine at a configured custom endpoint, resolving its
    /// bearer token from the environment.
    pub fn provider(mut self, endpoint: &ProviderEndpoint) -> Result<Self> {
        self.endpoint = Some(endpoint.chat_completions_url());
        self.api_key = Some(endpoint.resolve_api_key()?);
        Ok(self)
    }

    pub fn build(self) -> Result<Consultation> {
        let api_key = self
            .api_key
            .ok_or_else(|| Error::Config("no API key configured".into()))?;

        let client = reqwest::Client::builder()
            // Connection setup gets its own cap; the consultation deadline
            // governs total time.
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Consultation {
            registry: Arc::new(self.registry.unwrap_or_else(ModelRegistry::builtins)),
            client,
            endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            api_key,
            deadline: self.deadline.unwrap_or(DEFAULT_DEADLINE),
            startup_issues: self.startup_issues,
        })
    }
}

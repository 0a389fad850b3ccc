use std::collections::HashMap;
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::models::{EffortRatios, ModelSpec, ReasoningConvention};
use crate::request::ParameterOverrides;
use crate::{Error, Result};

/// Provider names reserved for built-in endpoints.
const BUILTIN_PROVIDER_NAMES: &[&str] = &["openrouter", "google", "openai"];

/// Root schema of the provider configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFile {
    #[serde(default)]
    pub custom_providers: Vec<CustomProvider>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomProvider {
    pub name: String,
    pub display_name: String,
    pub api_base_url: String,
    pub authentication: Authentication,
    #[serde(default)]
    pub feature_support: FeatureSupport,
    #[serde(default)]
    pub parameter_overrides: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Authentication {
    #[serde(default = "default_auth_type", rename = "type")]
    pub auth_type: String,
    pub api_key_env: String,
}

fn default_auth_type() -> String {
    "bearer_token".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSupport {
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default)]
    pub thinking_mode: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureSupport {
    fn default() -> Self {
        Self {
            streaming: true,
            thinking_mode: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub context_length: u64,
    pub max_output_tokens: u32,
    #[serde(default)]
    pub parameter_overrides: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A validated custom endpoint ready for dispatch.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub name: String,
    pub display_name: String,
    pub base_url: Url,
    pub api_key_env: String,
    pub overrides: serde_json::Map<String, serde_json::Value>,
    model_overrides: HashMap<String, serde_json::Map<String, serde_json::Value>>,
}

impl ProviderEndpoint {
    /// Chat-completions URL under this provider's base.
    pub fn chat_completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Layered overrides for one model: provider-global plus model-specific.
    pub fn overrides_for(&self, model: &str) -> ParameterOverrides {
        ParameterOverrides {
            provider: self.overrides.clone(),
            model: self.model_overrides.get(model).cloned().unwrap_or_default(),
        }
    }

    /// Resolve the bearer token from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<SecretString> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(SecretString::from(key)),
            _ => Err(Error::Config(format!(
                "API key environment variable '{}' is not set",
                self.api_key_env
            ))),
        }
    }
}

/// One skipped provider and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub provider: String,
    pub message: String,
}

/// Result of loading the configuration file. Built-ins are unaffected by
/// anything in here; `issues` is surfaced to the operator.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    pub providers: Vec<ProviderEndpoint>,
    pub models: Vec<ModelSpec>,
    pub issues: Vec<ConfigIssue>,
}

/// Load and validate custom providers from a YAML file.
///
/// Never fails: an unreadable or unparseable file yields an empty config
/// with the problem recorded as an issue.
pub fn load_provider_file(path: &Path) -> LoadedConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no provider configuration loaded");
            return LoadedConfig {
                issues: vec![ConfigIssue {
                    provider: String::new(),
                    message: format!("cannot read {}: {e}", path.display()),
                }],
                ..Default::default()
            };
        }
    };

    let file: ProviderFile = match serde_yaml_bw::from_str(&raw) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "invalid provider configuration");
            return LoadedConfig {
                issues: vec![ConfigIssue {
                    provider: String::new(),
                    message: format!("invalid YAML in {}: {e}", path.display()),
                }],
                ..Default::default()
            };
        }
    };

    let mut config = LoadedConfig::default();
    let mut seen_names: Vec<String> = Vec::new();

    for provider in file.custom_providers {
        match validate_provider(&provider, &seen_names) {
            Ok(endpoint) => {
                seen_names.push(provider.name.clone());
                for model in &provider.models {
                    config.models.push(to_model_spec(model, &provider));
                }
                tracing::debug!(
                    provider = %endpoint.name,
                    models = provider.models.len(),
                    "loaded custom provider"
                );
                config.providers.push(endpoint);
            }
            Err(message) => {
                tracing::warn!(provider = %provider.name, %message, "skipping custom provider");
                config.issues.push(ConfigIssue {
                    provider: provider.name.clone(),
                    message,
                });
            }
        }
    }

    config
}

fn validate_provider(
    provider: &CustomProvider,
    seen_names: &[String],
) -> std::result::Result<ProviderEndpoint, String> {
    let name = &provider.name;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "provider name must contain only alphanumeric characters, hyphens, and underscores"
                .into(),
        );
    }
    if BUILTIN_PROVIDER_NAMES.contains(&name.as_str()) {
        return Err(format!("provider name '{name}' conflicts with a built-in provider"));
    }
    if seen_names.contains(name) {
        return Err(format!("duplicate provider name '{name}'"));
    }
    if provider.authentication.auth_type != "bearer_token" {
        return Err(format!(
            "unsupported authentication type '{}' (only bearer_token)",
            provider.authentication.auth_type
        ));
    }

    let base_url = Url::parse(provider.api_base_url.trim_end_matches('/'))
        .map_err(|e| format!("invalid api_base_url: {e}"))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err("api_base_url must use http or https".into());
    }

    if provider.models.is_empty() {
        return Err("at least one model must be specified".into());
    }
    for model in &provider.models {
        if model.context_length == 0 || model.max_output_tokens == 0 {
            return Err(format!(
                "model '{}': token limits must be positive",
                model.name
            ));
        }
    }

    Ok(ProviderEndpoint {
        name: provider.name.clone(),
        display_name: provider.display_name.clone(),
        base_url,
        api_key_env: provider.authentication.api_key_env.clone(),
        overrides: provider.parameter_overrides.clone().unwrap_or_default(),
        model_overrides: provider
            .models
            .iter()
            .filter_map(|m| {
                m.parameter_overrides
                    .clone()
                    .map(|o| (m.name.clone(), o))
            })
            .collect(),
    })
}

fn to_model_spec(model: &ModelEntry, provider: &CustomProvider) -> ModelSpec {
    let (reasoning, ratios) = if provider.feature_support.thinking_mode {
        (
            ReasoningConvention::TokenBudget,
            EffortRatios::new(0.0, 0.3, 0.5),
        )
    } else {
        (ReasoningConvention::None, EffortRatios::NONE)
    };
    ModelSpec {
        id: model.name.clone(),
        context_length: model.context_length,
        max_output_tokens: model.max_output_tokens,
        reasoning,
        effort_ratios: ratios,
        supports_streaming: provider.feature_support.streaming,
    }
}

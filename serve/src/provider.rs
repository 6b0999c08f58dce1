//! Resolves a config-layer `Provider` selection into a concrete engine
//! provider adapter plus the model string to use for the turn.

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use config::Provider;
use engine::provider::{AnthropicAdapter, OpenAiAdapter};

use crate::error::ServeError;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Builds the adapter for `provider`, resolving `model` against the
/// provider's default and validating provider-specific requirements.
pub fn build_adapter(
    provider: Provider,
    model: Option<&str>,
    openai_compatible_endpoint: Option<&str>,
) -> Result<(Arc<dyn engine::provider::ProviderAdapter>, String), ServeError> {
    match provider {
        Provider::OpenAi => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| ServeError::Validation("OPENAI_API_KEY is not set".to_string()))?;
            let mut cfg = OpenAIConfig::new().with_api_key(api_key);
            if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
                cfg = cfg.with_api_base(base.trim_end_matches('/'));
            }
            let model = model.unwrap_or(DEFAULT_OPENAI_MODEL).to_string();
            Ok((Arc::new(OpenAiAdapter::new(cfg)), model))
        }
        Provider::Anthropic => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| ServeError::Validation("ANTHROPIC_API_KEY is not set".to_string()))?;
            let model = model.unwrap_or(DEFAULT_ANTHROPIC_MODEL).to_string();
            Ok((Arc::new(AnthropicAdapter::new(api_key)), model))
        }
        Provider::OpenAiCompatible => {
            let endpoint = openai_compatible_endpoint.ok_or_else(|| {
                ServeError::Validation(
                    "openai-compatible provider requires an explicit endpoint".to_string(),
                )
            })?;
            let model = model
                .ok_or_else(|| {
                    ServeError::Validation(
                        "openai-compatible provider requires an explicit model".to_string(),
                    )
                })?
                .to_string();
            let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            let cfg = OpenAIConfig::new()
                .with_api_base(endpoint.trim_end_matches('/'))
                .with_api_key(api_key);
            Ok((Arc::new(OpenAiAdapter::new(cfg)), model))
        }
    }
}

//! Resolves a config-layer [`config::Provider`] selection into a concrete
//! engine provider adapter plus the model string to use for the turn.
//!
//! Mirrors `serve`'s adapter construction so both front ends build the same
//! provider shapes from the same environment variables.

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use config::Provider;
use engine::provider::{AnthropicAdapter, OpenAiAdapter, ProviderAdapter};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

pub fn build_adapter(
    provider: Provider,
    model: Option<&str>,
    openai_compatible_endpoint: Option<&str>,
) -> Result<(Arc<dyn ProviderAdapter>, String), String> {
    match provider {
        Provider::OpenAi => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| "OPENAI_API_KEY is not set".to_string())?;
            let mut cfg = OpenAIConfig::new().with_api_key(api_key);
            if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
                cfg = cfg.with_api_base(base.trim_end_matches('/'));
            }
            let model = model.unwrap_or(DEFAULT_OPENAI_MODEL).to_string();
            Ok((Arc::new(OpenAiAdapter::new(cfg)), model))
        }
        Provider::Anthropic => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| "ANTHROPIC_API_KEY is not set".to_string())?;
            let model = model.unwrap_or(DEFAULT_ANTHROPIC_MODEL).to_string();
            Ok((Arc::new(AnthropicAdapter::new(api_key)), model))
        }
        Provider::OpenAiCompatible => {
            let endpoint = openai_compatible_endpoint
                .ok_or_else(|| "openai-compatible provider requires an explicit endpoint".to_string())?;
            let model = model
                .ok_or_else(|| "openai-compatible provider requires an explicit model".to_string())?
                .to_string();
            let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
            let cfg = OpenAIConfig::new()
                .with_api_base(endpoint.trim_end_matches('/'))
                .with_api_key(api_key);
            Ok((Arc::new(OpenAiAdapter::new(cfg)), model))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_without_api_key_is_an_error() {
        std::env::remove_var("OPENAI_API_KEY");
        let result = build_adapter(Provider::OpenAi, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn openai_compatible_requires_endpoint_and_model() {
        let result = build_adapter(Provider::OpenAiCompatible, None, None);
        assert!(result.unwrap_err().contains("endpoint"));

        let result = build_adapter(Provider::OpenAiCompatible, None, Some("http://localhost:8000/v1"));
        assert!(result.unwrap_err().contains("model"));
    }

    #[test]
    fn openai_compatible_resolves_with_endpoint_and_model() {
        let result = build_adapter(
            Provider::OpenAiCompatible,
            Some("local-model"),
            Some("http://localhost:8000/v1"),
        );
        let (_, model) = result.unwrap();
        assert_eq!(model, "local-model");
    }
}

//! Resolves the provider/model settings for one agent run from the `[agent]`
//! table in `config.toml`, with `RELAY_PROVIDER`/`RELAY_MODEL` environment
//! overrides taking priority over the file.

use std::path::PathBuf;

use serde::Deserialize;

use crate::LoadError;

/// Which backend the agent talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    OpenAiCompatible,
}

impl Provider {
    /// Parses a provider name, accepting the canonical spelling and the
    /// `openai_compatible` underscore alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "anthropic" => Some(Provider::Anthropic),
            "openai-compatible" | "openai_compatible" => Some(Provider::OpenAiCompatible),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::OpenAiCompatible => "openai-compatible",
        }
    }
}

/// Resolved provider/model settings for one agent run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub openai_compatible_endpoint: Option<String>,
}

#[derive(Deserialize, Default)]
struct AgentTable {
    provider: Option<String>,
    model: Option<String>,
    #[serde(alias = "openai_compatible_endpoint", alias = "openai-compatible-endpoint")]
    openai_compatible_endpoint: Option<String>,
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    agent: AgentTable,
}

fn xdg_config_toml_path(app_name: &str) -> Option<PathBuf> {
    let base = cross_xdg::BaseDirs::new().ok()?;
    let path = base.config_home().join(app_name).join("config.toml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn read_agent_table(app_name: &str) -> Result<AgentTable, LoadError> {
    let Some(path) = xdg_config_toml_path(app_name) else {
        return Ok(AgentTable::default());
    };
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let file: ConfigFile = toml::from_str(&content)?;
    Ok(file.agent)
}

impl AgentConfig {
    /// Resolution order: `RELAY_PROVIDER`/`RELAY_MODEL` env vars, then the
    /// `[agent]` table in `~/.config/<app_name>/config.toml`, then defaults
    /// (`provider = "openai"`).
    pub fn resolve(app_name: &str) -> Result<Self, LoadError> {
        let table = read_agent_table(app_name)?;

        let provider_str = std::env::var("RELAY_PROVIDER")
            .ok()
            .or(table.provider)
            .unwrap_or_else(|| "openai".to_string());
        let provider = Provider::parse(&provider_str)
            .ok_or_else(|| LoadError::InvalidProvider(provider_str))?;

        let model = std::env::var("RELAY_MODEL").ok().or(table.model);

        Ok(AgentConfig {
            provider,
            model,
            openai_compatible_endpoint: table.openai_compatible_endpoint,
        })
    }
}

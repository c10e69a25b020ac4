//! Provider configuration for the LLM oracle.
//!
//! Credentials never live in `civitas-config.yaml`. The YAML file only
//! lists provider names in the order they are tried; each provider's key,
//! URL, and model come from the environment:
//!
//! | Provider    | Key                 | URL (optional)      | Model (optional)  |
//! |-------------|---------------------|---------------------|-------------------|
//! | `deepseek`  | `DEEPSEEK_API_KEY`  | `DEEPSEEK_API_URL`  | `DEEPSEEK_MODEL`  |
//! | `openai`    | `OPENAI_API_KEY`    | `OPENAI_API_URL`    | `OPENAI_MODEL`    |
//! | `anthropic` | `ANTHROPIC_API_KEY` | `ANTHROPIC_API_URL` | `ANTHROPIC_MODEL` |
//! | `step`      | `STEP_API_KEY`      | `STEP_API_URL`      | `STEP_MODEL`      |
//!
//! A provider without a key is skipped.

use std::fmt;

use tracing::{debug, warn};

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `DeepSeek` chat completions.
    DeepSeek,
    /// `OpenAI` chat completions.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// `StepFun` chat completions.
    Step,
}

/// Request format a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `OpenAI`-compatible `/chat/completions`.
    OpenAi,
    /// Anthropic `/messages`.
    Anthropic,
}

impl ProviderKind {
    /// Parse a provider name as it appears in the config file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "deepseek" => Some(Self::DeepSeek),
            "openai" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "step" | "stepfun" => Some(Self::Step),
            _ => None,
        }
    }

    /// Canonical lowercase name, also the rate-limit key.
    pub const fn name(self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Step => "step",
        }
    }

    /// Prefix of this provider's environment variables.
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::DeepSeek => "DEEPSEEK",
            Self::OpenAi => "OPENAI",
            Self::Anthropic => "ANTHROPIC",
            Self::Step => "STEP",
        }
    }

    /// Request format for this provider.
    pub const fn wire_format(self) -> WireFormat {
        match self {
            Self::Anthropic => WireFormat::Anthropic,
            Self::DeepSeek | Self::OpenAi | Self::Step => WireFormat::OpenAi,
        }
    }

    /// Base URL used when `*_API_URL` is unset.
    pub const fn default_api_url(self) -> &'static str {
        match self {
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Step => "https://api.stepfun.com/v1",
        }
    }

    /// Model used when `*_MODEL` is unset.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek-chat",
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Step => "step-1-flash",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything needed to call one provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Which provider.
    pub kind: ProviderKind,
    /// Base API URL, without a trailing slash.
    pub api_url: String,
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderConfig {
    /// Build a provider config from a variable lookup.
    ///
    /// Returns `None` when the key is missing or blank.
    pub fn from_lookup(kind: ProviderKind, lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let prefix = kind.env_prefix();
        let api_key = lookup(&format!("{prefix}_API_KEY")).filter(|k| !k.trim().is_empty())?;
        let api_url = lookup(&format!("{prefix}_API_URL"))
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| kind.default_api_url().to_owned());
        let model = lookup(&format!("{prefix}_MODEL"))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_owned());
        Some(Self {
            kind,
            api_url: api_url.trim_end_matches('/').to_owned(),
            api_key,
            model,
        })
    }

    /// Build a provider config from the process environment.
    pub fn from_env(kind: ProviderKind) -> Option<Self> {
        Self::from_lookup(kind, |name| std::env::var(name).ok())
    }
}

/// Resolve the configured provider order into usable providers.
///
/// Unknown names are logged and skipped, as are providers without a key
/// and duplicates.
pub fn resolve_providers(
    order: &[String],
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<ProviderConfig> {
    let mut resolved: Vec<ProviderConfig> = Vec::new();
    for name in order {
        let Some(kind) = ProviderKind::from_name(name) else {
            warn!(provider = %name, "Unknown oracle provider in config");
            continue;
        };
        if resolved.iter().any(|p| p.kind == kind) {
            continue;
        }
        match ProviderConfig::from_lookup(kind, &lookup) {
            Some(config) => resolved.push(config),
            None => debug!(provider = %kind, "No API key set, skipping provider"),
        }
    }
    resolved
}

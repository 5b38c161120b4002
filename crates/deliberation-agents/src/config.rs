use anyhow::{Context, Result};
use deliberation::{
    FinalizerConfig, GeminiConfig, OrchestratorConfig, ServiceConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Model endpoint configuration.
#[derive(Debug, Clone)]
pub struct ModelEndpoint {
    /// Base URL up to the API version (e.g. `.../v1beta`).
    pub url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
}

/// Top-level host configuration.
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    pub endpoint: ModelEndpoint,
    /// Timeout for a single negotiation turn.
    pub round_timeout: Duration,
    /// Timeout for an administrator synthesis call.
    pub finalize_timeout: Duration,
    /// Directory holding one JSON file per session.
    pub store_dir: PathBuf,
    /// Cap for `run` when no Arbiter round appears.
    pub max_rounds: u32,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            endpoint: ModelEndpoint {
                url: std::env::var("DELIBERATION_MODEL_URL")
                    .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
                model: std::env::var("DELIBERATION_MODEL")
                    .unwrap_or_else(|_| "gemini-1.5-flash".into()),
                api_key: std::env::var("DELIBERATION_API_KEY")
                    .or_else(|_| std::env::var("GEMINI_API_KEY"))
                    .unwrap_or_default(),
                temperature: 0.7,
            },
            round_timeout: timeout_from_env("DELIBERATION_TIMEOUT_SECS", 60),
            finalize_timeout: timeout_from_env("DELIBERATION_FINALIZE_TIMEOUT_SECS", 90),
            store_dir: std::env::var("DELIBERATION_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".deliberation/sessions")),
            max_rounds: 12,
        }
    }
}

/// Optional overrides read from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub model_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub round_timeout_secs: Option<u64>,
    pub finalize_timeout_secs: Option<u64>,
    pub store_dir: Option<PathBuf>,
    pub max_rounds: Option<u32>,
}

impl AgentsConfig {
    /// Environment defaults, overlaid by a TOML file when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let file: ConfigFile =
                toml::from_str(&content).context("Failed to parse deliberation config TOML")?;
            config.apply(file);
        }
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(url) = file.model_url {
            self.endpoint.url = url;
        }
        if let Some(model) = file.model {
            self.endpoint.model = model;
        }
        if let Some(key) = file.api_key {
            self.endpoint.api_key = key;
        }
        if let Some(t) = file.temperature {
            self.endpoint.temperature = t;
        }
        if let Some(secs) = file.round_timeout_secs {
            self.round_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.finalize_timeout_secs {
            self.finalize_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = file.store_dir {
            self.store_dir = dir;
        }
        if let Some(max) = file.max_rounds {
            self.max_rounds = max;
        }
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            base_url: self.endpoint.url.clone(),
            model: self.endpoint.model.clone(),
            api_key: self.endpoint.api_key.clone(),
            temperature: self.endpoint.temperature,
            // Engine deadline fires first.
            request_timeout: self.round_timeout.max(self.finalize_timeout) + Duration::from_secs(5),
        }
    }

    pub fn service(&self) -> ServiceConfig {
        ServiceConfig {
            orchestrator: OrchestratorConfig {
                generation_timeout: self.round_timeout,
                ..OrchestratorConfig::default()
            },
            finalizer: FinalizerConfig {
                generation_timeout: self.finalize_timeout,
            },
        }
    }
}

fn timeout_from_env(var: &str, default_secs: u64) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}

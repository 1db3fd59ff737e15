use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Application configuration.
///
/// Layered: built-in defaults, then an optional `callpilot.toml` next to the
/// binary, then `CALLPILOT_`-prefixed environment variables with `__` as the
/// section separator (e.g. `CALLPILOT_SERVER__PORT=9000`,
/// `CALLPILOT_GENERATOR__API_KEY=...`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mongo: MongoConfig,
    pub generator: GeneratorConfig,
    pub orchestrator: OrchestratorSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// OpenAI-compatible chat completions endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Client-side request timeout; the orchestrator applies its own tighter
    /// generation timeout on top.
    pub request_timeout_secs: u64,
}

/// Live session orchestrator tunables. Mirrored into the orchestrator crate's
/// own config at startup; this crate stays free of domain dependencies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub min_words_for_analysis: usize,
    pub min_suggestion_interval_secs: u64,
    pub long_pause_threshold_secs: u64,
    pub periodic_interval_secs: u64,
    pub max_wait_without_suggestion_secs: u64,
    pub history_capacity: usize,
    pub context_max_entries: usize,
    pub context_max_words: usize,
    pub dedup_capacity: usize,
    pub generation_timeout_secs: u64,
    pub drain_grace_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "callpilot".to_string(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            min_words_for_analysis: 20,
            min_suggestion_interval_secs: 30,
            long_pause_threshold_secs: 7,
            periodic_interval_secs: 60,
            max_wait_without_suggestion_secs: 120,
            history_capacity: 50,
            context_max_entries: 10,
            context_max_words: 400,
            dedup_capacity: 100,
            generation_timeout_secs: 15,
            drain_grace_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            mongo: MongoConfig::default(),
            generator: GeneratorConfig::default(),
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("callpilot").required(false))
            .add_source(Environment::with_prefix("CALLPILOT").separator("__"))
            .build()?
            .try_deserialize()
    }
}

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::warn;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub http_port: u16,
    #[serde(default = "default_graphrag_root_dir")]
    pub graphrag_root_dir: String,
    #[serde(default = "default_chat_history_dir")]
    pub chat_history_dir: String,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_entity_collection")]
    pub entity_collection: String,
    #[serde(default = "default_index_command")]
    pub index_command: String,
}

fn default_graphrag_root_dir() -> String {
    "./data".to_string()
}

fn default_chat_history_dir() -> String {
    "./chat_history".to_string()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_entity_collection() -> String {
    "default-entity-description".to_string()
}

fn default_index_command() -> String {
    "graphrag".to_string()
}

impl AppConfig {
    pub fn output_dir(&self) -> PathBuf {
        Path::new(&self.graphrag_root_dir).join("output")
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

/// Per-model settings from the indexer's settings file. Field names follow
/// the external indexing process so the same file drives both sides.
#[derive(Clone, Deserialize, Debug)]
pub struct ModelSettings {
    pub model: String,
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_encoding_model")]
    pub encoding_model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_answer_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_encoding_model() -> String {
    "cl100k_base".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_answer_max_tokens() -> u32 {
    2000
}

#[derive(Clone, Deserialize, Debug)]
pub struct EngineSettings {
    pub default_chat_model: ModelSettings,
    pub default_embedding_model: ModelSettings,
}

/// Reads the model settings file at `<root>/settings.{toml,yaml,json}`,
/// merged with the environment. Read once at process start.
pub fn get_engine_settings(root_dir: &str) -> Result<EngineSettings, ConfigError> {
    let settings_path = Path::new(root_dir).join("settings");
    let config = Config::builder()
        .add_source(File::with_name(&settings_path.to_string_lossy()))
        .add_source(Environment::default().separator("__"))
        .build()?;

    config.try_deserialize()
}

/// Resolves an api key value that may be a literal or a `${VAR}` indirection
/// into the environment. Unresolved keys return `None` with a warning rather
/// than failing: some deployments run keyless local models.
pub fn resolve_api_key(value: Option<&str>) -> Option<String> {
    let value = value?;
    if let Some(var_name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        let resolved = std::env::var(var_name).ok();
        if resolved.is_none() {
            warn!(variable = var_name, "api key environment variable not set");
        }
        return resolved;
    }
    if let Ok(direct) = std::env::var(value) {
        warn!(
            variable = value,
            "api key found via bare environment variable name, prefer ${{...}} syntax"
        );
        return Some(direct);
    }
    Some(value.to_string())
}

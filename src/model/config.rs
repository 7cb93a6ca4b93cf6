use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

const ENV_CONFIG_PATH: &str = "CONFORMA_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "conforma.yaml";

const ENV_SEARCH_ENDPOINT: &str = "CONFORMA_SEARCH_ENDPOINT";
const ENV_SEARCH_API_KEY: &str = "CONFORMA_SEARCH_API_KEY";
const ENV_SEARCH_INDEX: &str = "CONFORMA_SEARCH_INDEX";
const ENV_EMBEDDING_ENDPOINT: &str = "CONFORMA_EMBEDDING_ENDPOINT";
const ENV_EMBEDDING_API_KEY: &str = "CONFORMA_EMBEDDING_API_KEY";
const ENV_EMBEDDING_MODEL: &str = "CONFORMA_EMBEDDING_MODEL";

const DEFAULT_SEARCH_ENDPOINT: &str = "http://127.0.0.1:9200";
const DEFAULT_SEARCH_INDEX: &str = "document-chunks";
const DEFAULT_EMBEDDING_ENDPOINT: &str = "http://127.0.0.1:9201/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Search index collaborator settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub index: String,
    /// Results requested per retrieval strategy.
    pub top_k: usize,
}

/// Embedding collaborator settings.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub model: String,
}

/// Behavioral tunables, overridable from the YAML config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Concurrent requirement evaluations per document run.
    pub concurrency: usize,
    pub requirement_timeout_secs: u64,
    /// Consecutive failures before a document run is aborted.
    pub failure_threshold: u32,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub top_k: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            requirement_timeout_secs: 120,
            failure_threshold: 3,
            retry_max_attempts: 3,
            retry_initial_backoff_ms: 500,
            top_k: 10,
        }
    }
}

impl LimitsConfig {
    pub fn requirement_timeout(&self) -> Duration {
        Duration::from_secs(self.requirement_timeout_secs)
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    limits: LimitsConfig,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
    pub limits: LimitsConfig,
}

impl EngineConfig {
    /// Load configuration from environment and the optional config file.
    ///
    /// Every knob has a default; a missing or malformed config file logs and
    /// falls back rather than failing.
    pub fn from_env() -> Self {
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let limits = Self::load_config_file(&config_path)
            .map(|cf| cf.limits)
            .unwrap_or_default();

        let search = SearchConfig {
            endpoint: env_url(ENV_SEARCH_ENDPOINT, DEFAULT_SEARCH_ENDPOINT),
            api_key: std::env::var(ENV_SEARCH_API_KEY).ok(),
            index: std::env::var(ENV_SEARCH_INDEX)
                .unwrap_or_else(|_| DEFAULT_SEARCH_INDEX.to_string()),
            top_k: limits.top_k,
        };

        let embedding = EmbeddingConfig {
            endpoint: env_url(ENV_EMBEDDING_ENDPOINT, DEFAULT_EMBEDDING_ENDPOINT),
            api_key: std::env::var(ENV_EMBEDDING_API_KEY).ok(),
            model: std::env::var(ENV_EMBEDDING_MODEL)
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
        };

        Self {
            search,
            embedding,
            limits,
        }
    }

    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match serde_yaml::from_str(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }
}

fn env_url(key: &str, default: &str) -> Url {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).unwrap_or_else(|e| {
        tracing::warn!(key = key, value = %raw, error = %e, "Invalid endpoint URL, using default");
        Url::parse(default).expect("default endpoint URL is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_to_documented_values() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.concurrency, 3);
        assert_eq!(limits.failure_threshold, 3);
        assert_eq!(limits.retry_max_attempts, 3);
        assert_eq!(limits.top_k, 10);
    }

    #[test]
    fn limits_parse_partial_yaml() {
        let parsed: LimitsConfig = serde_yaml::from_str("concurrency: 8").unwrap();
        assert_eq!(parsed.concurrency, 8);
        assert_eq!(parsed.top_k, 10);
    }
}

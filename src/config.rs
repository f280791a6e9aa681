use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{info, debug};

use crate::interaction::{EmbeddingConfig, RuleDefinition};

/// Server configuration with environment variable support
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub embedding_dimensions: usize,
    pub max_text_length: usize,
    /// JSON array of rule definitions loaded at startup instead of the
    /// built-in catalogue
    #[serde(default)]
    pub rules_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub persist: bool,
    pub stats_path: String,
    pub overrides_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_history_entries: usize,
    pub max_drug_name_length: usize,
    pub max_text_length: usize,
    pub max_page_size: usize,
}

impl Config {
    /// Load configuration from environment variables with fallback to config file
    pub fn load() -> Result<Self> {
        if Path::new(".env").exists() {
            dotenv::dotenv().ok();
            debug!("Loaded .env file");
        }

        let config_path = env::var("CONFIG_PATH")
            .unwrap_or_else(|_| "config/prismcare.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.override_from_env();
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from TOML file
    fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    fn override_from_env(&mut self) {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.server.log_level = val;
        }

        if let Ok(val) = env::var("EMBEDDING_DIMENSIONS") {
            if let Ok(num) = val.parse() {
                self.engine.embedding_dimensions = num;
            }
        }
        if let Ok(val) = env::var("RULES_PATH") {
            self.engine.rules_path = Some(val);
        }

        if let Ok(val) = env::var("PERSIST_STATE") {
            self.storage.persist = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("STATS_FILE") {
            self.storage.stats_path = val;
        }
        if let Ok(val) = env::var("OVERRIDES_FILE") {
            self.storage.overrides_path = val;
        }

        if let Ok(val) = env::var("MAX_HISTORY_ENTRIES") {
            if let Ok(num) = val.parse() {
                self.limits.max_history_entries = num;
            }
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.engine.embedding_dimensions == 0 {
            return Err(anyhow::anyhow!("Engine embedding_dimensions must be greater than 0"));
        }

        if self.storage.persist
            && (self.storage.stats_path.is_empty() || self.storage.overrides_path.is_empty())
        {
            return Err(anyhow::anyhow!(
                "Storage paths are required when persistence is enabled. Set STATS_FILE and OVERRIDES_FILE."
            ));
        }

        if self.limits.max_history_entries == 0
            || self.limits.max_drug_name_length == 0
            || self.limits.max_page_size == 0
        {
            return Err(anyhow::anyhow!("Request limits in config must be greater than 0"));
        }

        Ok(())
    }

    pub fn embedding(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            embedding_dimensions: self.engine.embedding_dimensions,
            max_text_length: self.engine.max_text_length,
        }
    }

    /// Rules from `engine.rules_path`, if one is configured
    pub fn load_rule_file(&self) -> Result<Option<Vec<RuleDefinition>>> {
        let Some(path) = &self.engine.rules_path else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path))?;
        let rules: Vec<RuleDefinition> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rules file: {}", path))?;

        info!("Read {} rule definitions from {}", rules.len(), path);
        Ok(Some(rules))
    }

    /// Get a summary of the configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Config: Dimensions={}, Rules={}, Persist={}, LogLevel={}",
            self.engine.embedding_dimensions,
            self.engine.rules_path.as_deref().unwrap_or("built-in"),
            self.storage.persist,
            self.server.log_level
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let embedding = EmbeddingConfig::default();
        Self {
            server: ServerConfig {
                name: "prismcare-engine".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                log_level: "info".to_string(),
            },
            engine: EngineConfig {
                embedding_dimensions: embedding.embedding_dimensions,
                max_text_length: embedding.max_text_length,
                rules_path: None,
            },
            storage: StorageConfig {
                persist: true,
                stats_path: "stats.json".to_string(),
                overrides_path: "overrides.json".to_string(),
            },
            limits: LimitsConfig {
                max_history_entries: 100,
                max_drug_name_length: 200,
                max_text_length: 5000,
                max_page_size: 100,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.name, "prismcare-engine");
        assert_eq!(config.engine.embedding_dimensions, 4096);
        assert_eq!(config.storage.stats_path, "stats.json");
        assert!(config.engine.rules_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("EMBEDDING_DIMENSIONS", "512");
        env::set_var("STATS_FILE", "/tmp/prismcare-stats.json");
        env::set_var("LOG_LEVEL", "debug");

        let mut config = Config::default();
        config.override_from_env();

        assert_eq!(config.engine.embedding_dimensions, 512);
        assert_eq!(config.storage.stats_path, "/tmp/prismcare-stats.json");
        assert_eq!(config.server.log_level, "debug");

        // Clean up
        env::remove_var("EMBEDDING_DIMENSIONS");
        env::remove_var("STATS_FILE");
        env::remove_var("LOG_LEVEL");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.engine.embedding_dimensions = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.stats_path = String::new();
        assert!(config.validate().is_err());

        config.storage.persist = false;
        assert!(config.validate().is_ok());

        config.limits.max_history_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            name = "prismcare-engine"
            version = "0.1.0"
            log_level = "warn"

            [engine]
            embedding_dimensions = 1024
            max_text_length = 1024

            [storage]
            persist = false
            stats_path = "stats.json"
            overrides_path = "overrides.json"

            [limits]
            max_history_entries = 20
            max_drug_name_length = 100
            max_text_length = 1000
            max_page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.embedding_dimensions, 1024);
        assert!(config.engine.rules_path.is_none());
        assert!(!config.storage.persist);
    }

    #[test]
    fn test_rule_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let rules = crate::interaction::default_rules();
        std::fs::write(&path, serde_json::to_string(&rules).unwrap()).unwrap();

        let mut config = Config::default();
        assert!(config.load_rule_file().unwrap().is_none());

        config.engine.rules_path = Some(path.to_string_lossy().to_string());
        let loaded = config.load_rule_file().unwrap().unwrap();
        assert_eq!(loaded, rules);
    }
}

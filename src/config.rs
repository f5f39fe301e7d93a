use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LifelogConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub encryption: EncryptionConfig,
    pub sync: SyncConfig,
    pub questions: QuestionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    /// Capacity of each per-table change channel.
    pub change_buffer: usize,
}

/// Argon2id parameters used when a new vault salt is generated.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EncryptionConfig {
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the sync backend. `None` disables sync; local storage is unaffected.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct QuestionsConfig {
    /// TOML file of extra questions merged into the built-in catalog at load time.
    pub extended_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_lifelog_dir()
            .join("journal.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            change_buffer: 256,
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: 65536, // 64 MiB
            argon2_iterations: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
            batch_size: 100,
        }
    }
}

/// Returns `~/.lifelog/`
pub fn default_lifelog_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lifelog")
}

/// Returns the default config file path: `~/.lifelog/config.toml`
pub fn default_config_path() -> PathBuf {
    default_lifelog_dir().join("config.toml")
}

impl LifelogConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LifelogConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (LIFELOG_DB, LIFELOG_LOG_LEVEL, LIFELOG_SYNC_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LIFELOG_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("LIFELOG_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("LIFELOG_SYNC_URL") {
            let trimmed = val.trim();
            self.sync.endpoint = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Sync is available only when an endpoint is configured.
    pub fn sync_available(&self) -> bool {
        self.sync.endpoint.is_some()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

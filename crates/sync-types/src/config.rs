//! Configuration loading for search-sync.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/search-sync/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Connection settings for the external search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Base URL of the search backend (e.g. "http://localhost:9200")
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password (prefer SEARCH_SYNC_INDEX__PASSWORD over the file)
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Tuning for the drain and bulk reindex jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Push attempts per document in the bulk job
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Entities fetched per page during bulk enumeration
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Entities processed between unit-of-work commits in the bulk job
    #[serde(default = "default_commit_interval")]
    pub commit_interval: usize,

    /// Maximum records per drain run (0 = drain until empty)
    #[serde(default)]
    pub drain_limit: usize,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_page_size() -> usize {
    20
}

fn default_commit_interval() -> usize {
    20
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            page_size: default_page_size(),
            commit_interval: default_commit_interval(),
            drain_limit: 0,
        }
    }
}

/// Per entity type indexing settings.
///
/// Kept as an array of tables so entity type names keep their case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySettings {
    /// Entity type this block configures (e.g. "Publication")
    pub entity_type: String,

    /// Target index name
    pub index: String,

    /// Append the current year to `index` at startup
    #[serde(default)]
    pub year_suffix: bool,

    /// Multi-valued fields exploded into separate documents, in order
    #[serde(default)]
    pub denormalize: Vec<String>,

    /// Metadata fields emitted by the crosswalk (empty = all)
    #[serde(default)]
    pub fields: Vec<String>,
}

impl EntitySettings {
    /// Create settings for an entity type targeting `index`.
    pub fn new(entity_type: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            index: index.into(),
            year_suffix: false,
            denormalize: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Set the denormalized fields.
    pub fn with_denormalize(mut self, fields: &[&str]) -> Self {
        self.denormalize = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the crosswalk field projection.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Enable the year suffix name generator.
    pub fn with_year_suffix(mut self, enabled: bool) -> Self {
        self.year_suffix = enabled;
        self
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// External index connection
    #[serde(default)]
    pub index: IndexSettings,

    /// Job tuning
    #[serde(default)]
    pub sync: SyncSettings,

    /// Supported entity types
    #[serde(default)]
    pub entities: Vec<EntitySettings>,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "search-sync")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            index: IndexSettings::default(),
            sync: SyncSettings::default(),
            entities: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/search-sync/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SEARCH_SYNC_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "search-sync")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())?
            .set_default("log_level", default_log_level())?
            .set_default("index.url", default_index_url())?
            .set_default("index.timeout_secs", default_timeout_secs() as i64)?
            .set_default("sync.max_attempts", default_max_attempts() as i64)?
            .set_default("sync.page_size", default_page_size() as i64)?
            .set_default("sync.commit_interval", default_commit_interval() as i64)?
            .set_default("sync.drain_limit", 0i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SEARCH_SYNC_DB_PATH, SEARCH_SYNC_INDEX__URL, SEARCH_SYNC_SYNC__MAX_ATTEMPTS, ...
        builder = builder.add_source(
            Environment::with_prefix("SEARCH_SYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the jobs cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::Invalid("sync.max_attempts must be > 0".to_string()));
        }
        if self.sync.page_size == 0 {
            return Err(ConfigError::Invalid("sync.page_size must be > 0".to_string()));
        }
        if self.sync.commit_interval == 0 {
            return Err(ConfigError::Invalid(
                "sync.commit_interval must be > 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entity in &self.entities {
            if entity.entity_type.trim().is_empty() {
                return Err(ConfigError::Invalid("entity_type must not be blank".to_string()));
            }
            if entity.index.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "index for {} must not be blank",
                    entity.entity_type
                )));
            }
            if !seen.insert(entity.entity_type.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "entity type {} configured twice",
                    entity.entity_type
                )));
            }
        }
        Ok(())
    }

    /// Settings for one entity type.
    pub fn entity(&self, entity_type: &str) -> Option<&EntitySettings> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

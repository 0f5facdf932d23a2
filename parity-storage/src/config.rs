use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parity_core::{DEFAULT_IGNORE_PATHS, ReplayOptions, Target};
use serde::{Deserialize, Serialize};

use crate::StorageError;

pub const DEFAULT_CONFIG_FILE: &str = "parity.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParityConfig {
    /// Base URLs, one per target.
    pub targets: Vec<String>,
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub allow_insecure_tls: bool,
    pub concurrency_limit: usize,
    pub ignore_diff_paths: Vec<String>,
    pub default_headers: BTreeMap<String, String>,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub max_entries: usize,
}

impl Default for ParityConfig {
    fn default() -> Self {
        let options = ReplayOptions::default();
        Self {
            targets: vec!["http://localhost:8080".to_string()],
            timeout_ms: options.timeout_ms,
            follow_redirects: options.follow_redirects,
            allow_insecure_tls: options.allow_insecure_tls,
            concurrency_limit: options.concurrency_limit,
            ignore_diff_paths: DEFAULT_IGNORE_PATHS
                .iter()
                .map(|path| path.to_string())
                .collect(),
            default_headers: BTreeMap::new(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".parity/history.db"),
            max_entries: 100,
        }
    }
}

impl ParityConfig {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path).map_err(|err| StorageError::Io(err.to_string()))?;
        toml::from_str(&raw).map_err(|err| StorageError::Config(err.to_string()))
    }

    pub fn load_or_create(path: &Path) -> Result<Self, StorageError> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Reads `path` when it exists; defaults otherwise, without writing.
    pub fn load_or_default(path: &Path) -> Result<Self, StorageError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| StorageError::Io(err.to_string()))?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|err| StorageError::Config(err.to_string()))?;
        std::fs::write(path, contents).map_err(|err| StorageError::Io(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        self.replay_options()
            .validate()
            .map_err(|err| StorageError::InvalidConfig(err.to_string()))?;
        self.targets()?;
        Ok(())
    }

    /// Targets named after their `host[:port]`.
    pub fn targets(&self) -> Result<Vec<Target>, StorageError> {
        self.targets
            .iter()
            .enumerate()
            .map(|(position, base_url)| {
                Target::from_url(base_url, position)
                    .map_err(|err| StorageError::InvalidConfig(err.to_string()))
            })
            .collect()
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            timeout_ms: self.timeout_ms,
            follow_redirects: self.follow_redirects,
            allow_insecure_tls: self.allow_insecure_tls,
            default_headers: self.default_headers.clone(),
            concurrency_limit: self.concurrency_limit,
        }
    }
}

//! Configuration for the client resilience layer.
//!
//! The file is TOML. Every field is optional at the boundary; [`ResolvedConfig`]
//! applies defaults and validates cross-field constraints so the components
//! never see an `Option` or an inconsistent pair of durations.
//!
//! ```toml
//! [features]
//! version_check = true
//! activity_monitor = true
//! chunk_recovery = true
//!
//! [activity]
//! idle_threshold_secs = 300
//! check_interval_secs = 30
//!
//! [version]
//! endpoint = "https://example.org/version.json"
//! min_interval_secs = 60
//! check_interval_secs = 600
//!
//! [recovery]
//! max_retries = 3
//! base_delay_ms = 1000
//! cache_namespaces = ["next-static", "chunks"]
//! ```

use serde::Deserialize;
use std::{env, fs, path::PathBuf};
use thiserror::Error;

mod resolved;

pub use resolved::{
    ActivitySettings, Features, RecoverySettings, ResolvedConfig, VersionSettings,
};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "STALEGUARD_CONFIG";

// Default value function for serde (bool::default() is false, so only true needs a fn)
pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct StaleguardConfig {
    pub features: Option<FeaturesConfig>,
    pub activity: Option<ActivityConfig>,
    pub version: Option<VersionConfig>,
    pub recovery: Option<RecoveryConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

/// Component switches.
#[derive(Debug, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub version_check: bool,
    #[serde(default = "default_true")]
    pub activity_monitor: bool,
    #[serde(default = "default_true")]
    pub chunk_recovery: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            version_check: true,
            activity_monitor: true,
            chunk_recovery: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityConfig {
    /// No input for this long flips the page to idle.
    pub idle_threshold_secs: Option<u64>,
    /// How often the idle check runs.
    pub check_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionConfig {
    /// URL of the version descriptor. `${VAR}` references are expanded.
    pub endpoint: Option<String>,
    /// Checks closer together than this are dropped.
    pub min_interval_secs: Option<u64>,
    /// Periodic check cadence.
    pub check_interval_secs: Option<u64>,
    /// Delay before the first check after mount.
    pub initial_delay_secs: Option<u64>,
    /// Delay after a navigation before checking.
    pub route_change_delay_ms: Option<u64>,
    /// Delay after activity resumes before checking.
    pub resume_delay_ms: Option<u64>,
    /// Hard timeout for one descriptor request. Must be below `min_interval_secs`.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecoveryConfig {
    pub max_retries: Option<u32>,
    /// Retry `n` (0-based) waits `base_delay_ms * 2^n`.
    pub base_delay_ms: Option<u64>,
    /// How long the recovery notification stays up without user action.
    pub display_window_secs: Option<u64>,
    /// Delay between mount and registering the loader hook.
    pub init_delay_ms: Option<u64>,
    /// Path prefix identifying chunk scripts, e.g. `/_next/static/chunks/`.
    pub static_chunk_path: Option<String>,
    /// Platform caches whose names contain any of these are purged on retry.
    pub cache_namespaces: Option<Vec<String>>,
}

/// Expand `${VAR}` references from the environment. Unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

impl StaleguardConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(path),
            None => Ok(None),
        }
    }

    /// Load from an explicit path. `Ok(None)` when the file does not exist.
    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        ResolvedConfig::from_config(self)
    }
}

/// `$STALEGUARD_CONFIG`, else `~/.staleguard/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_PATH_ENV)
        && !explicit.trim().is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".staleguard").join("config.toml"))
}

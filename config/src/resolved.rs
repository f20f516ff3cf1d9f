//! Resolved, invariant-safe configuration.
//!
//! Converts the optional, boundary-level [`StaleguardConfig`] into concrete
//! `Duration`-based settings for the components.

use std::time::Duration;

use url::Url;

use crate::{ConfigError, StaleguardConfig, expand_env_vars};

const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(5 * 60);
const DEFAULT_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_ROUTE_CHANGE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_RESUME_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_DISPLAY_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_INIT_DELAY: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_STATIC_CHUNK_PATH: &str = "/_next/static/chunks/";
pub(crate) const DEFAULT_CACHE_NAMESPACES: &[&str] = &["next-static", "chunks"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub version_check: bool,
    pub activity_monitor: bool,
    pub chunk_recovery: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            version_check: true,
            activity_monitor: true,
            chunk_recovery: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySettings {
    pub idle_threshold: Duration,
    pub check_interval: Duration,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            check_interval: DEFAULT_IDLE_CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSettings {
    /// `None` when the host supplies its own version source.
    pub endpoint: Option<Url>,
    pub min_interval: Duration,
    pub check_interval: Duration,
    pub initial_delay: Duration,
    pub route_change_delay: Duration,
    pub resume_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            min_interval: DEFAULT_MIN_INTERVAL,
            check_interval: DEFAULT_CHECK_INTERVAL,
            initial_delay: DEFAULT_INITIAL_DELAY,
            route_change_delay: DEFAULT_ROUTE_CHANGE_DELAY,
            resume_delay: DEFAULT_RESUME_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySettings {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub display_window: Duration,
    pub init_delay: Duration,
    pub static_chunk_path: String,
    pub cache_namespaces: Vec<String>,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            display_window: DEFAULT_DISPLAY_WINDOW,
            init_delay: DEFAULT_INIT_DELAY,
            static_chunk_path: DEFAULT_STATIC_CHUNK_PATH.to_string(),
            cache_namespaces: DEFAULT_CACHE_NAMESPACES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub features: Features,
    pub activity: ActivitySettings,
    pub version: VersionSettings,
    pub recovery: RecoverySettings,
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_secs)
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn non_zero(field: &'static str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl ResolvedConfig {
    pub fn from_config(config: &StaleguardConfig) -> Result<Self, ConfigError> {
        let features = config
            .features
            .as_ref()
            .map(|f| Features {
                version_check: f.version_check,
                activity_monitor: f.activity_monitor,
                chunk_recovery: f.chunk_recovery,
            })
            .unwrap_or_default();

        Ok(Self {
            features,
            activity: ActivitySettings::from_config(config)?,
            version: VersionSettings::from_config(config)?,
            recovery: RecoverySettings::from_config(config)?,
        })
    }
}

impl ActivitySettings {
    fn from_config(config: &StaleguardConfig) -> Result<Self, ConfigError> {
        let raw = config.activity.as_ref();
        Ok(Self {
            idle_threshold: non_zero(
                "activity.idle_threshold_secs",
                secs(
                    raw.and_then(|a| a.idle_threshold_secs),
                    DEFAULT_IDLE_THRESHOLD,
                ),
            )?,
            check_interval: non_zero(
                "activity.check_interval_secs",
                secs(
                    raw.and_then(|a| a.check_interval_secs),
                    DEFAULT_IDLE_CHECK_INTERVAL,
                ),
            )?,
        })
    }
}

impl VersionSettings {
    fn from_config(config: &StaleguardConfig) -> Result<Self, ConfigError> {
        let raw = config.version.as_ref();

        let endpoint = raw
            .and_then(|v| v.endpoint.as_deref())
            .map(expand_env_vars)
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                Url::parse(&s).map_err(|e| ConfigError::Invalid {
                    field: "version.endpoint",
                    reason: format!("{e} ({s})"),
                })
            })
            .transpose()?;

        let min_interval = non_zero(
            "version.min_interval_secs",
            secs(raw.and_then(|v| v.min_interval_secs), DEFAULT_MIN_INTERVAL),
        )?;
        let request_timeout = non_zero(
            "version.request_timeout_secs",
            secs(
                raw.and_then(|v| v.request_timeout_secs),
                DEFAULT_REQUEST_TIMEOUT,
            ),
        )?;
        if request_timeout >= min_interval {
            return Err(ConfigError::Invalid {
                field: "version.request_timeout_secs",
                reason: format!(
                    "must be below min_interval_secs ({}s >= {}s)",
                    request_timeout.as_secs(),
                    min_interval.as_secs()
                ),
            });
        }

        Ok(Self {
            endpoint,
            min_interval,
            check_interval: non_zero(
                "version.check_interval_secs",
                secs(
                    raw.and_then(|v| v.check_interval_secs),
                    DEFAULT_CHECK_INTERVAL,
                ),
            )?,
            initial_delay: secs(
                raw.and_then(|v| v.initial_delay_secs),
                DEFAULT_INITIAL_DELAY,
            ),
            route_change_delay: millis(
                raw.and_then(|v| v.route_change_delay_ms),
                DEFAULT_ROUTE_CHANGE_DELAY,
            ),
            resume_delay: millis(raw.and_then(|v| v.resume_delay_ms), DEFAULT_RESUME_DELAY),
            request_timeout,
        })
    }
}

impl RecoverySettings {
    fn from_config(config: &StaleguardConfig) -> Result<Self, ConfigError> {
        let raw = config.recovery.as_ref();

        let max_retries = raw
            .and_then(|r| r.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "recovery.max_retries",
                reason: "must be at least 1".to_string(),
            });
        }

        let static_chunk_path = raw
            .and_then(|r| r.static_chunk_path.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STATIC_CHUNK_PATH.to_string());

        let cache_namespaces: Vec<String> = raw
            .and_then(|r| r.cache_namespaces.clone())
            .unwrap_or_else(|| {
                DEFAULT_CACHE_NAMESPACES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            })
            .into_iter()
            .filter(|ns| !ns.trim().is_empty())
            .collect();

        Ok(Self {
            max_retries,
            base_delay: non_zero(
                "recovery.base_delay_ms",
                millis(raw.and_then(|r| r.base_delay_ms), DEFAULT_BASE_DELAY),
            )?,
            display_window: non_zero(
                "recovery.display_window_secs",
                secs(
                    raw.and_then(|r| r.display_window_secs),
                    DEFAULT_DISPLAY_WINDOW,
                ),
            )?,
            init_delay: millis(raw.and_then(|r| r.init_delay_ms), DEFAULT_INIT_DELAY),
            static_chunk_path,
            cache_namespaces,
        })
    }
}

//! Application-level configuration loading, including poll and timing knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "POLL_BATTLE_BACK_CONFIG_PATH";

/// Question displayed for every room in this version of the system.
const DEFAULT_QUESTION: &str = "Cats vs Dogs?";
/// Countdown duration applied when a create request omits one.
const DEFAULT_DURATION_SECS: u64 = 60;
/// Interval between liveness probes on idle WebSocket connections.
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
/// How long a closed room stays resolvable before the registry drops it.
const DEFAULT_CLOSED_ROOM_TTL_SECS: u64 = 300;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    question: String,
    default_duration: Duration,
    probe_interval: Duration,
    closed_room_ttl: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Poll question shown to every participant.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Countdown duration used when the create request does not specify one.
    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Interval at which idle connections are probed for liveness.
    pub fn probe_interval(&self) -> Duration {
        self.probe_interval
    }

    /// Grace period a closed room remains queryable before disposal.
    pub fn closed_room_ttl(&self) -> Duration {
        self.closed_room_ttl
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            question: DEFAULT_QUESTION.to_string(),
            default_duration: Duration::from_secs(DEFAULT_DURATION_SECS),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            closed_room_ttl: Duration::from_secs(DEFAULT_CLOSED_ROOM_TTL_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    question: Option<String>,
    default_duration_secs: Option<u64>,
    probe_interval_secs: Option<u64>,
    closed_room_ttl_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            question: value.question.unwrap_or(defaults.question),
            default_duration: value
                .default_duration_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_duration),
            probe_interval: value
                .probe_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_interval),
            closed_room_ttl: value
                .closed_room_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.closed_room_ttl),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

//! Application-level configuration loading: match slots, reset policy and store selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{board::MatchSlot, reset::ResetGuard, session::SessionSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MATCHDAY_BOARD_CONFIG_PATH";
const STORE_ENV: &str = "BOARD_STORE";
const FIREBASE_URL_ENV: &str = "FIREBASE_DATABASE_URL";
const DEFAULT_COUNTDOWN_INTERVAL_SECS: u64 = 60;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    slots: Vec<MatchSlot>,
    reset_guard: ResetGuard,
    countdown_interval: Duration,
    notification_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        slots = app_config.slots.len(),
                        guard = ?app_config.reset_guard,
                        "loaded board configuration"
                    );
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

    fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Matches recreated by every daily reset, in display order.
    pub fn slots(&self) -> &[MatchSlot] {
        &self.slots
    }

    /// Settings handed to the board session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            slots: self.slots.clone(),
            reset_guard: self.reset_guard,
            countdown_interval: self.countdown_interval,
            notification_capacity: self.notification_capacity,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            reset_guard: ResetGuard::default(),
            countdown_interval: Duration::from_secs(DEFAULT_COUNTDOWN_INTERVAL_SECS),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    matches: Option<Vec<RawSlot>>,
    #[serde(default)]
    reset_guard: ResetGuard,
    #[serde(default = "default_countdown_interval_secs")]
    countdown_interval_secs: u64,
    #[serde(default = "default_notification_capacity")]
    notification_capacity: usize,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let slots = match value.matches {
            Some(slots) if !slots.is_empty() => slots.into_iter().map(Into::into).collect(),
            _ => default_slots(),
        };

        Self {
            slots,
            reset_guard: value.reset_guard,
            countdown_interval: Duration::from_secs(value.countdown_interval_secs.max(1)),
            notification_capacity: value.notification_capacity.max(1),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single match slot inside the configuration file.
struct RawSlot {
    key: String,
    time: String,
}

impl From<RawSlot> for MatchSlot {
    fn from(value: RawSlot) -> Self {
        MatchSlot::new(value.key, value.time)
    }
}

fn default_countdown_interval_secs() -> u64 {
    DEFAULT_COUNTDOWN_INTERVAL_SECS
}

fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in match slots shipped with the binary.
fn default_slots() -> Vec<MatchSlot> {
    vec![
        MatchSlot::new("match1", "NTPA-13:00"),
        MatchSlot::new("match2", "VTPA-15:00"),
        MatchSlot::new("match3", "VTPa-19:00"),
    ]
}

/// Which tree store backs the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store; data lives as long as the server.
    Memory,
    /// Firebase Realtime Database over its REST API.
    Firebase,
}

impl StoreBackend {
    /// Select the backend from `BOARD_STORE`, defaulting to Firebase when a database URL is set.
    pub fn from_env() -> Self {
        let requested = env::var(STORE_ENV).ok();
        let firebase_configured = env::var(FIREBASE_URL_ENV)
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false);
        Self::select(requested.as_deref(), firebase_configured)
    }

    fn select(requested: Option<&str>, firebase_configured: bool) -> Self {
        let fallback = if firebase_configured {
            StoreBackend::Firebase
        } else {
            StoreBackend::Memory
        };

        match requested.map(|value| value.trim().to_ascii_lowercase()) {
            None => fallback,
            Some(value) if value.is_empty() => fallback,
            Some(value) if value == "memory" => StoreBackend::Memory,
            Some(value) if value == "firebase" => StoreBackend::Firebase,
            Some(value) => {
                warn!(%value, fallback = ?fallback, "unknown {STORE_ENV}; using default backend");
                fallback
            }
        }
    }
}

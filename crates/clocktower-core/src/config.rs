//! Configuration for the coordination layer

#[path = "config_tests.rs"]
mod config_tests;

use std::env::VarError;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_RESTART_MESSAGE: &str =
    "Bot on the Clocktower is restarting. Please wait a few moments, then try again.";
const DEFAULT_TOWNS_PER_BATCH: usize = 5;
const DEFAULT_BATCH_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_SWEEP_INTERVAL_DAYS: u64 = 14;
const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Environment variable access, so configuration can be read from a fake
/// environment in tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> std::result::Result<String, VarError>;
}

/// Delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> std::result::Result<String, VarError> {
        std::env::var(key)
    }
}

/// Complete configuration of the coordination layer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Interaction queue settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractionConfig {
    /// Sent instead of the initial status once shutdown has been requested
    #[serde(default = "default_restart_message")]
    pub restart_message: String,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            restart_message: default_restart_message(),
        }
    }
}

/// Town maintenance sweep settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Towns processed per scheduled batch
    #[serde(default = "default_towns_per_batch")]
    pub towns_per_batch: usize,
    /// Delay between batches of one sweep
    #[serde(default = "default_batch_interval_secs")]
    pub batch_interval_secs: u64,
    /// Delay between the end of a sweep and the start of the next one
    #[serde(default = "default_sweep_interval_days")]
    pub sweep_interval_days: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            towns_per_batch: DEFAULT_TOWNS_PER_BATCH,
            batch_interval_secs: DEFAULT_BATCH_INTERVAL_SECS,
            sweep_interval_days: DEFAULT_SWEEP_INTERVAL_DAYS,
        }
    }
}

impl MaintenanceConfig {
    /// Batch size, never below one.
    pub fn batch_size(&self) -> usize {
        self.towns_per_batch.max(1)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_days.saturating_mul(SECS_PER_DAY))
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: CoreConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// - `CLOCKTOWER_RESTART_MESSAGE`
    /// - `CLOCKTOWER_TOWNS_PER_BATCH` (default: 5)
    /// - `CLOCKTOWER_BATCH_INTERVAL_SECS` (default: 300)
    /// - `CLOCKTOWER_SWEEP_INTERVAL_DAYS` (default: 14)
    ///
    /// Values that fail to parse fall back to their defaults.
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        Self {
            interaction: InteractionConfig {
                restart_message: env
                    .var("CLOCKTOWER_RESTART_MESSAGE")
                    .ok()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(default_restart_message),
            },
            maintenance: MaintenanceConfig {
                towns_per_batch: parse_or(env, "CLOCKTOWER_TOWNS_PER_BATCH", DEFAULT_TOWNS_PER_BATCH)
                    .max(1),
                batch_interval_secs: parse_or(
                    env,
                    "CLOCKTOWER_BATCH_INTERVAL_SECS",
                    DEFAULT_BATCH_INTERVAL_SECS,
                ),
                sweep_interval_days: parse_or(
                    env,
                    "CLOCKTOWER_SWEEP_INTERVAL_DAYS",
                    DEFAULT_SWEEP_INTERVAL_DAYS,
                ),
            },
        }
    }
}

fn parse_or<E: ReadEnv, T: std::str::FromStr>(env: &E, key: &str, default: T) -> T {
    env.var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn default_restart_message() -> String {
    DEFAULT_RESTART_MESSAGE.to_string()
}

fn default_towns_per_batch() -> usize {
    DEFAULT_TOWNS_PER_BATCH
}

fn default_batch_interval_secs() -> u64 {
    DEFAULT_BATCH_INTERVAL_SECS
}

fn default_sweep_interval_days() -> u64 {
    DEFAULT_SWEEP_INTERVAL_DAYS
}

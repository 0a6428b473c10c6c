// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is read from `tripsync.toml`. Every field has a default, so
//! an absent file or a partial file is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "tripsync.toml";

/// Error type for loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning knobs for the bridge, the monitor, the queue and the sync manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Periodic health probe interval (milliseconds).
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Health probe timeout (milliseconds).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Consecutive failures at which the state reads degraded.
    #[serde(default = "default_degraded_after_failures")]
    pub degraded_after_failures: u32,
    /// Consecutive failures at which the state reads offline.
    #[serde(default = "default_offline_after_failures")]
    pub offline_after_failures: u32,
    /// Consecutive network-like failures that force offline immediately.
    #[serde(default = "default_network_offline_after_failures")]
    pub network_offline_after_failures: u32,
    /// Reachability probe interval while the bridge reads offline (milliseconds).
    #[serde(default = "default_reachability_interval_ms")]
    pub reachability_interval_ms: u64,
    /// Maximum queued entries; the oldest are evicted first.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum conflict backups; the oldest are evicted first.
    #[serde(default = "default_conflict_capacity")]
    pub conflict_capacity: usize,
    /// Replay attempts per entry per run.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff base delay (milliseconds). Attempt `n` waits `base * 2^(n-1)`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Pause between entries within a run (milliseconds).
    #[serde(default = "default_entry_pacing_ms")]
    pub entry_pacing_ms: u64,
    /// Background retry timer interval (milliseconds).
    #[serde(default = "default_background_interval_ms")]
    pub background_interval_ms: u64,
    /// Replay call timeout on a normal link (milliseconds).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Replay call timeout when the bridge reports a slow link (milliseconds).
    #[serde(default = "default_slow_request_timeout_ms")]
    pub slow_request_timeout_ms: u64,
}

fn default_probe_interval_ms() -> u64 {
    30_000
}

fn default_probe_timeout_ms() -> u64 {
    8_000
}

fn default_degraded_after_failures() -> u32 {
    1
}

fn default_offline_after_failures() -> u32 {
    3
}

fn default_network_offline_after_failures() -> u32 {
    2
}

fn default_reachability_interval_ms() -> u64 {
    15_000
}

fn default_queue_capacity() -> usize {
    50
}

fn default_conflict_capacity() -> usize {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_entry_pacing_ms() -> u64 {
    250
}

fn default_background_interval_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_slow_request_timeout_ms() -> u64 {
    30_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            degraded_after_failures: default_degraded_after_failures(),
            offline_after_failures: default_offline_after_failures(),
            network_offline_after_failures: default_network_offline_after_failures(),
            reachability_interval_ms: default_reachability_interval_ms(),
            queue_capacity: default_queue_capacity(),
            conflict_capacity: default_conflict_capacity(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            entry_pacing_ms: default_entry_pacing_ms(),
            background_interval_ms: default_background_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            slow_request_timeout_ms: default_slow_request_timeout_ms(),
        }
    }
}

impl SyncConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `tripsync.toml` from `dir`, falling back to defaults if it is absent.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(dir.join(CONFIG_FILE_NAME)) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        if self.degraded_after_failures > self.offline_after_failures {
            return Err(ConfigError::Invalid(format!(
                "degraded_after_failures ({}) exceeds offline_after_failures ({})",
                self.degraded_after_failures, self.offline_after_failures
            )));
        }
        Ok(())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn reachability_interval(&self) -> Duration {
        Duration::from_millis(self.reachability_interval_ms)
    }

    pub fn entry_pacing(&self) -> Duration {
        Duration::from_millis(self.entry_pacing_ms)
    }

    pub fn background_interval(&self) -> Duration {
        Duration::from_millis(self.background_interval_ms)
    }

    /// Timeout tier for replay calls.
    pub fn request_timeout(&self, slow_link: bool) -> Duration {
        if slow_link {
            Duration::from_millis(self.slow_request_timeout_ms)
        } else {
            Duration::from_millis(self.request_timeout_ms)
        }
    }

    /// Backoff after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }

    /// Sets the backoff base delay.
    pub fn with_base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Sets the pause between entries.
    pub fn with_entry_pacing_ms(mut self, ms: u64) -> Self {
        self.entry_pacing_ms = ms;
        self
    }

    /// Sets the per-run attempt cap.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the conflict archive capacity.
    pub fn with_conflict_capacity(mut self, capacity: usize) -> Self {
        self.conflict_capacity = capacity;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

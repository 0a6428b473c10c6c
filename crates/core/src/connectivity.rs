// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity health and link-quality types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Tri-state backend reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    /// Backend reachable and the last probe succeeded.
    #[default]
    Online,
    /// Backend reachable but recently failing.
    Degraded,
    /// Backend unreachable.
    Offline,
}

impl ConnectivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityState::Online => "online",
            ConnectivityState::Degraded => "degraded",
            ConnectivityState::Offline => "offline",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectivityState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(ConnectivityState::Online),
            "degraded" => Ok(ConnectivityState::Degraded),
            "offline" => Ok(ConnectivityState::Offline),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

/// Published view of the connectivity monitor.
///
/// `state` is always derived from `consecutive_failures`, the browser online
/// flag and the override; it is never assigned on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub state: ConnectivityState,
    /// Short human-readable cause of the latest transition.
    pub reason: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub is_forced: bool,
    pub forced_state: Option<ConnectivityState>,
}

impl ConnectivitySnapshot {
    /// Compares everything except timestamps.
    ///
    /// Two snapshots that only differ in `last_success_at`/`last_failure_at`
    /// are not announced twice.
    pub fn same_reading(&self, other: &ConnectivitySnapshot) -> bool {
        self.state == other.state
            && self.reason == other.reason
            && self.consecutive_failures == other.consecutive_failures
            && self.is_forced == other.is_forced
            && self.forced_state == other.forced_state
    }
}

/// Read-only mirror of the runtime's link-quality hints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkConnectionSnapshot {
    /// Effective connection type as reported by the runtime (`4g`, `3g`, `slow-2g`, ...).
    pub effective_type: Option<String>,
    pub save_data: bool,
    /// Round-trip estimate in milliseconds.
    pub rtt: Option<u32>,
    /// Downlink estimate in megabits per second.
    pub downlink: Option<f64>,
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;

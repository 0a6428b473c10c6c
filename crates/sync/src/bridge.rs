// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network status bridge.
//!
//! Normalizes the runtime's raw online/offline events and link-quality hints.
//! While the device reads offline, a background task probes reachability on a
//! fixed interval; the first successful probe flips the bridge back online
//! without waiting for a native event that may never arrive.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use ts_core::{NetworkConnectionSnapshot, ReachabilityProbe};

use crate::config::SyncConfig;

/// Effective types the runtime reports for slow links.
const SLOW_EFFECTIVE_TYPES: &[&str] = &["slow-2g", "2g", "3g"];
const SLOW_RTT_MS: u32 = 700;
const SLOW_DOWNLINK_MBPS: f64 = 1.2;

/// Returns true if the link should use the longer timeout tier.
pub fn is_slow_connection(connection: &NetworkConnectionSnapshot) -> bool {
    if connection.save_data {
        return true;
    }
    if let Some(ref effective_type) = connection.effective_type {
        let effective_type = effective_type.to_ascii_lowercase();
        if SLOW_EFFECTIVE_TYPES.contains(&effective_type.as_str()) {
            return true;
        }
    }
    if connection.rtt.is_some_and(|rtt| rtt >= SLOW_RTT_MS) {
        return true;
    }
    connection.downlink.is_some_and(|downlink| downlink > 0.0 && downlink <= SLOW_DOWNLINK_MBPS)
}

/// What caused the latest online/offline reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    Initial,
    /// A native online/offline event.
    Native,
    /// The bridge's own reachability probe.
    Probe,
    /// A manual override.
    Forced,
}

/// Published view of the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSnapshot {
    pub online: bool,
    pub connection: NetworkConnectionSnapshot,
    pub source: TransitionSource,
}

struct BridgeState {
    native_online: bool,
    forced: Option<bool>,
    connection: NetworkConnectionSnapshot,
}

impl BridgeState {
    fn effective_online(&self) -> bool {
        self.forced.unwrap_or(self.native_online)
    }
}

/// Handle to the bridge. Clones share state.
#[derive(Clone)]
pub struct NetworkStatusBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    state: Mutex<BridgeState>,
    tx: watch::Sender<BridgeSnapshot>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    interval: Duration,
    probe_timeout: Duration,
    running: Mutex<Option<CancellationToken>>,
}

impl NetworkStatusBridge {
    /// Creates a bridge seeded with the runtime's current online flag.
    ///
    /// Without a probe the bridge only follows native events.
    pub fn new(
        initially_online: bool,
        probe: Option<Arc<dyn ReachabilityProbe>>,
        config: &SyncConfig,
    ) -> Self {
        let state = BridgeState {
            native_online: initially_online,
            forced: None,
            connection: NetworkConnectionSnapshot::default(),
        };
        let (tx, _) = watch::channel(BridgeSnapshot {
            online: initially_online,
            connection: NetworkConnectionSnapshot::default(),
            source: TransitionSource::Initial,
        });
        NetworkStatusBridge {
            inner: Arc::new(BridgeInner {
                state: Mutex::new(state),
                tx,
                probe,
                interval: config.reachability_interval(),
                probe_timeout: config.probe_timeout(),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        self.inner.tx.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        self.inner.tx.borrow().online
    }

    /// Returns true if the current link hints call for the slow timeout tier.
    pub fn is_slow(&self) -> bool {
        is_slow_connection(&self.inner.tx.borrow().connection)
    }

    /// Subscribes to online/offline and link-quality changes.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<BridgeSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Native `online` event.
    pub fn handle_online_event(&self) {
        self.set_native_online(true, TransitionSource::Native);
    }

    /// Native `offline` event.
    pub fn handle_offline_event(&self) {
        self.set_native_online(false, TransitionSource::Native);
    }

    /// Link-quality hints changed.
    pub fn update_connection(&self, connection: NetworkConnectionSnapshot) {
        self.mutate(TransitionSource::Native, |state| {
            if state.connection == connection {
                return false;
            }
            state.connection = connection;
            true
        });
    }

    /// Pins the online flag (`Some`) or returns to observed values (`None`).
    ///
    /// While pinned, native events are still recorded but not published and
    /// the reachability probe is skipped.
    pub fn set_forced(&self, forced: Option<bool>) {
        let source = if forced.is_some() {
            TransitionSource::Forced
        } else {
            TransitionSource::Native
        };
        self.mutate(source, |state| {
            if state.forced == forced {
                return false;
            }
            state.forced = forced;
            true
        });
    }

    pub fn is_forced(&self) -> bool {
        self.lock_state().forced.is_some()
    }

    /// Runs one reachability probe if the bridge reads offline.
    ///
    /// A probe that outlives the probe timeout counts as unreachable.
    /// Returns the online flag afterwards.
    pub async fn probe_once(&self) -> bool {
        let Some(probe) = self.inner.probe.clone() else {
            return self.is_online();
        };
        {
            let state = self.lock_state();
            if state.forced.is_some() || state.native_online {
                return state.effective_online();
            }
        }

        let reachable = match tokio::time::timeout(self.inner.probe_timeout, probe.probe()).await {
            Ok(reachable) => reachable,
            Err(_) => {
                tracing::debug!(timeout = ?self.inner.probe_timeout, "reachability probe timed out");
                false
            }
        };
        tracing::debug!(reachable, "reachability probe finished");
        if reachable {
            self.set_native_online(true, TransitionSource::Probe);
        }
        self.is_online()
    }

    /// Starts the reachability loop. Calling it twice is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            tracing::warn!("network bridge already started");
            return;
        }
        if self.inner.probe.is_none() {
            return;
        }

        let token = CancellationToken::new();
        *running = Some(token.clone());

        let bridge = self.clone();
        let interval = self.inner.interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                let (offline, forced) = {
                    let state = bridge.lock_state();
                    (!state.native_online, state.forced.is_some())
                };
                if offline && !forced {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = bridge.probe_once() => {}
                    }
                }
            }
        });
    }

    /// Stops the reachability loop.
    pub fn stop(&self) {
        let token = self.inner.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    fn set_native_online(&self, online: bool, source: TransitionSource) {
        let published = self.mutate(source, |state| {
            if state.native_online == online {
                return false;
            }
            state.native_online = online;
            true
        });
        if published {
            tracing::info!(online, ?source, "network status changed");
        }
    }

    /// Applies `change` and republishes if the published view changed.
    fn mutate(
        &self,
        source: TransitionSource,
        change: impl FnOnce(&mut BridgeState) -> bool,
    ) -> bool {
        let mut state = self.lock_state();
        if !change(&mut state) {
            return false;
        }
        let online = state.effective_online();
        let connection = state.connection.clone();
        self.inner.tx.send_if_modified(|published| {
            if published.online == online && published.connection == connection {
                return false;
            }
            if published.online != online {
                published.source = source;
            }
            published.online = online;
            published.connection = connection;
            true
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BridgeState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity monitor.
//!
//! Derives the online/degraded/offline health signal from three inputs:
//! the bridge's online flag, a consecutive-failure counter fed by health
//! probes and replay outcomes, and an optional persisted override. The
//! published state is always recomputed by [`resolve_state`]; nothing
//! assigns it directly.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use ts_core::{
    ClockSource, ConnectivitySnapshot, ConnectivityState, KeyValueStore, RemoteError, RemoteStore,
};

use crate::bridge::NetworkStatusBridge;
use crate::config::SyncConfig;
use crate::override_flag::OverrideFlag;
use crate::visibility::PageVisibility;

/// Resolves the published state from the monitor's inputs.
///
/// A forced state wins outright. Otherwise a browser that reports offline,
/// a network outage detected by the fast path, or enough consecutive
/// failures read offline; any failure at all reads degraded.
pub fn resolve_state(
    failures: u32,
    network_outage: bool,
    forced: Option<ConnectivityState>,
    browser_online: bool,
    config: &SyncConfig,
) -> ConnectivityState {
    if let Some(state) = forced {
        return state;
    }
    if !browser_online || network_outage || failures >= config.offline_after_failures {
        return ConnectivityState::Offline;
    }
    if failures >= config.degraded_after_failures && failures > 0 {
        return ConnectivityState::Degraded;
    }
    ConnectivityState::Online
}

struct MonitorState {
    failures: u32,
    /// Set when network-like failures hit the fast-path threshold.
    network_outage: bool,
    forced: Option<ConnectivityState>,
    browser_online: bool,
    reason: String,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Handle to the connectivity monitor. Clones share state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    state: Mutex<MonitorState>,
    tx: watch::Sender<ConnectivitySnapshot>,
    remote: Arc<dyn RemoteStore>,
    bridge: NetworkStatusBridge,
    visibility: PageVisibility,
    overrides: OverrideFlag,
    clock: Arc<dyn ClockSource>,
    config: SyncConfig,
    probe_requested: Notify,
    running: Mutex<Option<CancellationToken>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor and applies any persisted override.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        bridge: NetworkStatusBridge,
        visibility: PageVisibility,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn ClockSource>,
        config: SyncConfig,
    ) -> Self {
        let overrides = OverrideFlag::new(store);
        let forced = match overrides.load() {
            Ok(forced) => forced,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable connectivity override");
                None
            }
        };
        if let Some(mode) = forced {
            bridge.set_forced(Some(mode != ConnectivityState::Offline));
        }

        let state = MonitorState {
            failures: 0,
            network_outage: false,
            forced,
            browser_online: bridge.is_online(),
            reason: match forced {
                Some(mode) => format!("forced {mode}"),
                None => "startup".to_string(),
            },
            last_success_at: None,
            last_failure_at: None,
        };
        let (tx, _) = watch::channel(build_snapshot(&state, &config));

        ConnectivityMonitor {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(state),
                tx,
                remote,
                bridge,
                visibility,
                overrides,
                clock,
                config,
                probe_requested: Notify::new(),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        self.inner.tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectivityState {
        self.inner.tx.borrow().state
    }

    pub fn is_forced(&self) -> bool {
        self.lock_state().forced.is_some()
    }

    pub fn bridge(&self) -> &NetworkStatusBridge {
        &self.inner.bridge
    }

    pub fn visibility(&self) -> &PageVisibility {
        &self.inner.visibility
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.remote
    }

    /// Subscribes to connectivity changes. Dropping the receiver unsubscribes.
    ///
    /// Only semantic changes notify; timestamp-only updates are visible
    /// through [`snapshot`](Self::snapshot) but do not wake receivers.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivitySnapshot> {
        self.inner.tx.subscribe()
    }

    /// Records a failed remote call and returns the updated snapshot.
    ///
    /// While forced the counter is left alone.
    pub fn mark_failure(&self, error: &RemoteError, context: &str) -> ConnectivitySnapshot {
        let now = self.inner.clock.now();
        let mut state = self.lock_state();
        if state.forced.is_none() {
            state.failures = state.failures.saturating_add(1);
            if error.is_network_like()
                && state.failures >= self.inner.config.network_offline_after_failures
            {
                state.network_outage = true;
            }
        }
        state.last_failure_at = Some(now);
        state.reason = format!("{context}: {error}");
        tracing::debug!(failures = state.failures, %error, context, "remote call failed");
        self.publish(&state)
    }

    /// Records a successful remote call and returns the updated snapshot.
    pub fn mark_success(&self, reason: &str) -> ConnectivitySnapshot {
        let now = self.inner.clock.now();
        let mut state = self.lock_state();
        state.failures = 0;
        state.network_outage = false;
        state.last_success_at = Some(now);
        state.reason = reason.to_string();
        self.publish(&state)
    }

    /// Forces the published state to `mode` and persists the choice.
    pub fn set_override(&self, mode: ConnectivityState) -> ConnectivitySnapshot {
        if let Err(e) = self.inner.overrides.save(mode) {
            tracing::warn!(error = %e, "failed to persist connectivity override");
        }
        let snapshot = {
            let mut state = self.lock_state();
            state.forced = Some(mode);
            state.reason = format!("forced {mode}");
            self.publish(&state)
        };
        self.inner.bridge.set_forced(Some(mode != ConnectivityState::Offline));
        tracing::info!(%mode, "connectivity override set");
        snapshot
    }

    /// Removes the override and asks the probe loop for a fresh reading.
    pub fn clear_override(&self) -> ConnectivitySnapshot {
        if let Err(e) = self.inner.overrides.clear() {
            tracing::warn!(error = %e, "failed to remove connectivity override");
        }
        self.inner.bridge.set_forced(None);
        let browser_online = self.inner.bridge.is_online();

        let snapshot = {
            let mut state = self.lock_state();
            state.forced = None;
            state.browser_online = browser_online;
            state.reason = "override cleared".to_string();
            self.publish(&state)
        };
        tracing::info!("connectivity override cleared");
        self.inner.probe_requested.notify_one();
        snapshot
    }

    /// Runs one health probe against the remote store.
    ///
    /// Skipped while forced. A probe that outlives the probe timeout counts
    /// as a network failure.
    pub async fn probe_now(&self) -> ConnectivitySnapshot {
        if self.is_forced() {
            return self.snapshot();
        }
        let timeout = self.inner.config.probe_timeout();
        match tokio::time::timeout(timeout, self.inner.remote.ping()).await {
            Ok(Ok(())) => self.mark_success("health probe succeeded"),
            Ok(Err(e)) => self.mark_failure(&e, "health probe"),
            Err(_) => self.mark_failure(&RemoteError::Timeout, "health probe"),
        }
    }

    /// Starts the periodic probe and the bridge watcher.
    ///
    /// Must be called from within a tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            tracing::warn!("connectivity monitor already started");
            return;
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());

        tokio::spawn(self.clone().probe_loop(token.clone()));
        tokio::spawn(self.clone().bridge_loop(token));
    }

    /// Stops the background tasks.
    pub fn stop(&self) {
        let token = self.inner.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    async fn probe_loop(self, token: CancellationToken) {
        let mut visible_rx = self.inner.visibility.subscribe();
        let interval = self.inner.config.probe_interval();
        loop {
            let visible = *visible_rx.borrow_and_update();
            if visible {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = self.probe_now() => {}
                }
            }

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
                _ = self.inner.probe_requested.notified() => {}
                changed = visible_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn bridge_loop(self, token: CancellationToken) {
        let mut bridge_rx = self.inner.bridge.subscribe();
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                changed = bridge_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            let online = bridge_rx.borrow_and_update().online;
            if self.set_browser_online(online) && online {
                // A recovered link still has to prove the backend is reachable.
                self.inner.probe_requested.notify_one();
            }
        }
    }

    /// Returns true if the flag changed.
    fn set_browser_online(&self, online: bool) -> bool {
        let mut state = self.lock_state();
        if state.browser_online == online {
            return false;
        }
        state.browser_online = online;
        if state.forced.is_some() {
            return false;
        }
        state.reason = if online {
            "browser reported online".to_string()
        } else {
            "browser reported offline".to_string()
        };
        self.publish(&state);
        true
    }

    /// Stores the snapshot, waking receivers only for semantic changes.
    fn publish(&self, state: &MonitorState) -> ConnectivitySnapshot {
        let snapshot = build_snapshot(state, &self.inner.config);
        let previous = self.inner.tx.borrow().state;
        let notified = self.inner.tx.send_if_modified(|current| {
            let changed = !current.same_reading(&snapshot);
            *current = snapshot.clone();
            changed
        });
        if notified && previous != snapshot.state {
            tracing::info!(
                from = %previous,
                to = %snapshot.state,
                reason = %snapshot.reason,
                "connectivity state changed"
            );
        }
        snapshot
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_snapshot(state: &MonitorState, config: &SyncConfig) -> ConnectivitySnapshot {
    ConnectivitySnapshot {
        state: resolve_state(
            state.failures,
            state.network_outage,
            state.forced,
            state.browser_online,
            config,
        ),
        reason: state.reason.clone(),
        last_success_at: state.last_success_at,
        last_failure_at: state.last_failure_at,
        consecutive_failures: state.failures,
        is_forced: state.forced.is_some(),
        forced_state: state.forced,
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;

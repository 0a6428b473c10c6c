// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring for the whole subsystem.
//!
//! [`SyncEngine`] builds the bridge, monitor, queue, cache and manager over
//! one remote store and one key-value store, and starts or stops their
//! background tasks together.

use std::sync::Arc;

use ts_core::{ClockSource, KeyValueStore, ReachabilityProbe, RemoteStore, SystemClock};

use crate::bridge::NetworkStatusBridge;
use crate::cache::EntityCache;
use crate::config::SyncConfig;
use crate::manager::SyncManager;
use crate::monitor::ConnectivityMonitor;
use crate::queue::OfflineQueue;
use crate::visibility::PageVisibility;

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    remote: Arc<dyn RemoteStore>,
    store: Arc<dyn KeyValueStore>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    clock: Arc<dyn ClockSource>,
    config: SyncConfig,
    initially_online: bool,
    initially_visible: bool,
}

impl SyncEngineBuilder {
    /// Reachability probe the bridge uses while offline.
    pub fn probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// The runtime's online flag at startup.
    pub fn initially_online(mut self, online: bool) -> Self {
        self.initially_online = online;
        self
    }

    pub fn initially_visible(mut self, visible: bool) -> Self {
        self.initially_visible = visible;
        self
    }

    pub fn build(self) -> SyncEngine {
        let bridge = NetworkStatusBridge::new(self.initially_online, self.probe, &self.config);
        let visibility = PageVisibility::new(self.initially_visible);
        let monitor = ConnectivityMonitor::new(
            self.remote,
            bridge.clone(),
            visibility.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.config.clone(),
        );
        let queue = OfflineQueue::new(self.store.clone(), self.clock.clone(), &self.config);
        let cache = EntityCache::new(self.store);
        let manager =
            SyncManager::new(monitor.clone(), queue.clone(), cache.clone(), self.clock, self.config);

        SyncEngine { bridge, visibility, monitor, queue, cache, manager }
    }
}

/// The assembled subsystem.
#[derive(Clone)]
pub struct SyncEngine {
    bridge: NetworkStatusBridge,
    visibility: PageVisibility,
    monitor: ConnectivityMonitor,
    queue: OfflineQueue,
    cache: EntityCache,
    manager: SyncManager,
}

impl SyncEngine {
    pub fn builder(
        remote: Arc<dyn RemoteStore>,
        store: Arc<dyn KeyValueStore>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            remote,
            store,
            probe: None,
            clock: Arc::new(SystemClock),
            config: SyncConfig::default(),
            initially_online: true,
            initially_visible: true,
        }
    }

    /// Starts every background task. Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.bridge.start();
        self.monitor.start();
        self.manager.start();
        tracing::info!("sync engine started");
    }

    pub fn stop(&self) {
        self.manager.stop();
        self.monitor.stop();
        self.bridge.stop();
        tracing::info!("sync engine stopped");
    }

    pub fn bridge(&self) -> &NetworkStatusBridge {
        &self.bridge
    }

    pub fn visibility(&self) -> &PageVisibility {
        &self.visibility
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tripsync: offline-first sync engine for trip documents
//!
//! The engine lets edits continue while the device is offline and replays
//! them once the backend is reachable again:
//!
//! - [`NetworkStatusBridge`] normalizes native online/offline events and
//!   probes reachability while offline.
//! - [`ConnectivityMonitor`] derives the online/degraded/offline health signal.
//! - [`OfflineQueue`] holds deferred writes and conflict backups.
//! - [`SyncManager`] drains the queue with retries, backoff and conflict capture.
//!
//! [`SyncEngine`] wires all of them over one remote store and one key-value store.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod monitor;
pub mod override_flag;
pub mod queue;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bridge::{is_slow_connection, BridgeSnapshot, NetworkStatusBridge, TransitionSource};
pub use cache::EntityCache;
pub use config::{ConfigError, SyncConfig, CONFIG_FILE_NAME};
pub use engine::{SyncEngine, SyncEngineBuilder};
pub use error::ReplayError;
pub use manager::SyncManager;
pub use monitor::{resolve_state, ConnectivityMonitor};
pub use override_flag::{OverrideFlag, OVERRIDE_KEY};
pub use queue::{OfflineQueue, CONFLICTS_KEY, QUEUE_KEY};
pub use visibility::PageVisibility;

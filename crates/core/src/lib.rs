// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ts-core: Shared library for the trip sync engine
//!
//! This crate provides the data model, the collaborator interfaces (remote
//! store, key-value storage, reachability probe) and the error taxonomy used
//! by the `tripsync` engine and the `tsync` debug CLI.

pub mod clock;
pub mod connectivity;
pub mod entity;
pub mod error;
pub mod remote;
pub mod status;
pub mod storage;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use connectivity::{ConnectivitySnapshot, ConnectivityState, NetworkConnectionSnapshot};
pub use entity::{ConflictBackupEntry, EntitySnapshot, QueueEntry, QueueEntryPatch, QueueSnapshot};
pub use error::{Error, Result};
pub use remote::{
    classify_message, ErrorClass, ReachabilityProbe, RemoteError, RemoteFuture, RemoteResult,
    RemoteStore,
};
pub use status::{SyncRunSnapshot, SyncToast, SyncTrigger};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

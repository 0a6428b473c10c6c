// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote store collaborator interface.
//!
//! The concrete wire protocol lives outside this workspace. The sync
//! subsystem only sees the [`RemoteStore`] trait and the [`RemoteError`]
//! rejections it produces, which keeps it testable with scripted mocks.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::entity::EntitySnapshot;

/// Boxed future returned by collaborator calls.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Result type for remote store calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// How the sync subsystem reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient transport trouble; drives the connectivity failure counter.
    Network,
    /// Access-control denial; the write is dropped and never retried.
    Permission,
    /// Backend logic failure; retried, but never counted as an outage.
    Application,
}

/// Rejection from a remote store call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (fetch failed, connection reset, DNS, ...).
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP-style status.
    #[error("remote returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// Access-control denial.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Anything else; classified from its message.
    #[error("{0}")]
    Other(String),
}

const NETWORK_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "failed to fetch",
    "fetch failed",
    "network",
    "connection refused",
    "connection reset",
    "econnreset",
    "econnrefused",
    "load failed",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "row-level security",
    "row level security",
    "not authorized",
    "forbidden",
    "42501",
];

impl RemoteError {
    /// Classifies the rejection.
    ///
    /// Structured variants are classified by variant and status code; only
    /// [`RemoteError::Other`] falls back to inspecting the message.
    pub fn class(&self) -> ErrorClass {
        match self {
            RemoteError::Timeout | RemoteError::Network(_) => ErrorClass::Network,
            RemoteError::PermissionDenied(_) => ErrorClass::Permission,
            RemoteError::Status { code, message } => match code {
                408 | 500..=599 => ErrorClass::Network,
                403 => ErrorClass::Permission,
                _ => classify_message(message),
            },
            RemoteError::Other(message) => classify_message(message),
        }
    }

    pub fn is_network_like(&self) -> bool {
        self.class() == ErrorClass::Network
    }
}

/// Classifies a bare error message.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if PERMISSION_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Permission
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorClass::Network
    } else {
        ErrorClass::Application
    }
}

/// The remote store the queue is drained against.
pub trait RemoteStore: Send + Sync {
    /// Lightweight "are you there" call used by the health probe.
    fn ping(&self) -> RemoteFuture<'_, ()>;

    /// Establishes or confirms a session. `None` means no session is available.
    fn ensure_session(&self) -> RemoteFuture<'_, Option<String>>;

    /// Fetches the current remote copy of an entity.
    fn get_entity<'a>(&'a self, entity_id: &'a str) -> RemoteFuture<'a, Option<EntitySnapshot>>;

    /// Writes the entity (and its companion data). Returns the stored id.
    fn upsert_entity<'a>(
        &'a self,
        snapshot: &'a EntitySnapshot,
        aux_snapshot: Option<&'a Value>,
    ) -> RemoteFuture<'a, String>;

    /// Records an immutable version for a write. `None` means no version was created.
    fn create_version<'a>(
        &'a self,
        snapshot: &'a EntitySnapshot,
        label: &'a str,
    ) -> RemoteFuture<'a, Option<String>>;

    /// Lists every entity visible to the session.
    fn list_all(&self) -> RemoteFuture<'_, Vec<EntitySnapshot>>;
}

/// Cheap reachability check used while the device looks offline.
///
/// Implementations issue a HEAD-style request against a static, uncached
/// resource; `true` means the request completed.
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;

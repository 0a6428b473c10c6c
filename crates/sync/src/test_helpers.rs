// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use ts_core::{EntitySnapshot, ReachabilityProbe, RemoteError, RemoteFuture, RemoteResult, RemoteStore};

/// Build an entity snapshot with a small payload.
pub fn entity(id: &str, updated_at: i64) -> EntitySnapshot {
    EntitySnapshot::new(id, updated_at, json!({ "title": format!("trip {id}") }))
}

/// Reachability probe with a switchable answer.
#[derive(Clone, Default)]
pub struct MockProbe {
    reachable: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockProbe {
    pub fn new(reachable: bool) -> Self {
        MockProbe {
            reachable: Arc::new(AtomicBool::new(reachable)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReachabilityProbe for MockProbe {
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reachable = self.reachable.load(Ordering::SeqCst);
        Box::pin(async move { reachable })
    }
}

/// A call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Ping,
    EnsureSession,
    GetEntity(String),
    Upsert { entity_id: String, updated_at: i64 },
    CreateVersion { entity_id: String, label: String },
    ListAll,
}

struct MockState {
    calls: Vec<(Instant, RemoteCall)>,
    session: Option<String>,
    entities: BTreeMap<String, EntitySnapshot>,
    ping: VecDeque<RemoteResult<()>>,
    get: VecDeque<RemoteResult<Option<EntitySnapshot>>>,
    upsert: VecDeque<RemoteResult<String>>,
    version: VecDeque<RemoteResult<Option<String>>>,
    ping_delay: Option<Duration>,
    upsert_delay: Option<Duration>,
    versions_created: usize,
}

/// Scripted remote store.
///
/// Each operation pops its next scripted outcome; once the script is empty
/// the call succeeds against an in-memory entity map. Every call is recorded
/// with the (possibly paused) tokio clock.
pub struct MockRemote {
    state: Mutex<MockState>,
}

impl Default for MockRemote {
    fn default() -> Self {
        MockRemote {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                session: Some("session-1".to_string()),
                entities: BTreeMap::new(),
                ping: VecDeque::new(),
                get: VecDeque::new(),
                upsert: VecDeque::new(),
                version: VecDeque::new(),
                ping_delay: None,
                upsert_delay: None,
                versions_created: 0,
            }),
        }
    }
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: RemoteCall) {
        self.lock().calls.push((Instant::now(), call));
    }

    /// Seeds the remote copy of an entity.
    pub fn put_entity(&self, snapshot: EntitySnapshot) {
        self.lock().entities.insert(snapshot.id.clone(), snapshot);
    }

    pub fn remote_entity(&self, id: &str) -> Option<EntitySnapshot> {
        self.lock().entities.get(id).cloned()
    }

    pub fn set_session(&self, session: Option<&str>) {
        self.lock().session = session.map(String::from);
    }

    pub fn script_ping(&self, outcome: RemoteResult<()>) {
        self.lock().ping.push_back(outcome);
    }

    pub fn script_get(&self, outcome: RemoteResult<Option<EntitySnapshot>>) {
        self.lock().get.push_back(outcome);
    }

    pub fn script_upsert(&self, outcome: RemoteResult<String>) {
        self.lock().upsert.push_back(outcome);
    }

    pub fn script_version(&self, outcome: RemoteResult<Option<String>>) {
        self.lock().version.push_back(outcome);
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        self.lock().ping_delay = Some(delay);
    }

    pub fn set_upsert_delay(&self, delay: Duration) {
        self.lock().upsert_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&RemoteCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|(_, call)| pred(call)).count()
    }

    /// Instants of recorded calls matching `pred`.
    pub fn times(&self, pred: impl Fn(&RemoteCall) -> bool) -> Vec<Instant> {
        self.lock()
            .calls
            .iter()
            .filter(|(_, call)| pred(call))
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn pings(&self) -> usize {
        self.count(|c| matches!(c, RemoteCall::Ping))
    }

    pub fn upserts(&self) -> usize {
        self.count(|c| matches!(c, RemoteCall::Upsert { .. }))
    }

    pub fn upserts_of(&self, entity_id: &str) -> usize {
        self.count(|c| matches!(c, RemoteCall::Upsert { entity_id: id, .. } if id == entity_id))
    }

    pub fn version_calls(&self) -> usize {
        self.count(|c| matches!(c, RemoteCall::CreateVersion { .. }))
    }

    pub fn versions_created(&self) -> usize {
        self.lock().versions_created
    }
}

impl RemoteStore for MockRemote {
    fn ping(&self) -> RemoteFuture<'_, ()> {
        self.record(RemoteCall::Ping);
        let (delay, outcome) = {
            let mut state = self.lock();
            (state.ping_delay, state.ping.pop_front().unwrap_or(Ok(())))
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        })
    }

    fn ensure_session(&self) -> RemoteFuture<'_, Option<String>> {
        self.record(RemoteCall::EnsureSession);
        let session = self.lock().session.clone();
        Box::pin(async move { Ok(session) })
    }

    fn get_entity<'a>(&'a self, entity_id: &'a str) -> RemoteFuture<'a, Option<EntitySnapshot>> {
        self.record(RemoteCall::GetEntity(entity_id.to_string()));
        let outcome = {
            let mut state = self.lock();
            match state.get.pop_front() {
                Some(outcome) => outcome,
                None => Ok(state.entities.get(entity_id).cloned()),
            }
        };
        Box::pin(async move { outcome })
    }

    fn upsert_entity<'a>(
        &'a self,
        snapshot: &'a EntitySnapshot,
        _aux_snapshot: Option<&'a Value>,
    ) -> RemoteFuture<'a, String> {
        self.record(RemoteCall::Upsert {
            entity_id: snapshot.id.clone(),
            updated_at: snapshot.updated_at,
        });
        let (delay, scripted) = {
            let mut state = self.lock();
            (state.upsert_delay, state.upsert.pop_front())
        };
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match scripted {
                Some(Err(e)) => Err(e),
                Some(Ok(id)) => Ok(id),
                None => {
                    self.lock().entities.insert(snapshot.id.clone(), snapshot.clone());
                    Ok(snapshot.id.clone())
                }
            }
        })
    }

    fn create_version<'a>(
        &'a self,
        snapshot: &'a EntitySnapshot,
        label: &'a str,
    ) -> RemoteFuture<'a, Option<String>> {
        self.record(RemoteCall::CreateVersion {
            entity_id: snapshot.id.clone(),
            label: label.to_string(),
        });
        let outcome = {
            let mut state = self.lock();
            let outcome = match state.version.pop_front() {
                Some(outcome) => outcome,
                None => Ok(Some(format!("version-{}", state.versions_created + 1))),
            };
            if matches!(outcome, Ok(Some(_))) {
                state.versions_created += 1;
            }
            outcome
        };
        Box::pin(async move { outcome })
    }

    fn list_all(&self) -> RemoteFuture<'_, Vec<EntitySnapshot>> {
        self.record(RemoteCall::ListAll);
        let entities = self.lock().entities.values().cloned().collect();
        Box::pin(async move { Ok(entities) })
    }
}

/// Shorthand for a network-class rejection.
pub fn network_error() -> RemoteError {
    RemoteError::Network("fetch failed".to_string())
}

/// Shorthand for an application-class rejection.
pub fn application_error() -> RemoteError {
    RemoteError::Other("constraint violated".to_string())
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync manager.
//!
//! Drains the offline queue against the remote store. A drain run is started
//! by one of the [`SyncTrigger`]s; at most one run is in flight at a time and
//! any caller that asks for a run while one is active joins it instead.
//!
//! Each entry is replayed as: session check, remote fetch (with conflict
//! capture when the remote copy is newer), upsert, version creation, local
//! reconciliation. Failures are retried with exponential backoff up to
//! `max_attempts`; permission denials drop the entry immediately.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use ts_core::{
    ClockSource, ConnectivityState, ErrorClass, QueueEntry, QueueEntryPatch, RemoteFuture,
    SyncRunSnapshot, SyncToast, SyncTrigger,
};

use crate::cache::EntityCache;
use crate::config::SyncConfig;
use crate::error::ReplayError;
use crate::monitor::ConnectivityMonitor;
use crate::queue::OfflineQueue;
use crate::visibility::wait_until_visible;

const TOAST_CAPACITY: usize = 16;

type RunFuture = Shared<BoxFuture<'static, SyncRunSnapshot>>;

struct InFlight {
    id: u64,
    run: RunFuture,
}

/// Result of replaying one entry within a run.
enum EntryOutcome {
    Synced,
    /// Permission denial; the entry was dropped.
    Dropped(String),
    /// Attempts used up, or deferred until connectivity returns, with the
    /// entry still queued.
    Failed(String),
    /// The entry was removed or replaced while the run was working on it.
    Superseded,
}

/// Handle to the sync manager. Clones share state.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    monitor: ConnectivityMonitor,
    queue: OfflineQueue,
    cache: EntityCache,
    clock: Arc<dyn ClockSource>,
    config: SyncConfig,
    status_tx: watch::Sender<SyncRunSnapshot>,
    toast_tx: broadcast::Sender<SyncToast>,
    in_flight: Mutex<Option<InFlight>>,
    next_run_id: AtomicU64,
    bootstrapped: AtomicBool,
    running: Mutex<Option<CancellationToken>>,
}

impl SyncManager {
    pub fn new(
        monitor: ConnectivityMonitor,
        queue: OfflineQueue,
        cache: EntityCache,
        clock: Arc<dyn ClockSource>,
        config: SyncConfig,
    ) -> Self {
        let counts = queue.snapshot();
        let (status_tx, _) = watch::channel(SyncRunSnapshot {
            pending_count: counts.pending_count,
            failed_count: counts.failed_count,
            has_conflict_backups: queue.has_conflict_backups(),
            ..Default::default()
        });
        let (toast_tx, _) = broadcast::channel(TOAST_CAPACITY);

        SyncManager {
            inner: Arc::new(ManagerInner {
                monitor,
                queue,
                cache,
                clock,
                config,
                status_tx,
                toast_tx,
                in_flight: Mutex::new(None),
                next_run_id: AtomicU64::new(1),
                bootstrapped: AtomicBool::new(false),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> SyncRunSnapshot {
        self.inner.status_tx.borrow().clone()
    }

    /// Subscribes to run progress. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SyncRunSnapshot> {
        self.inner.status_tx.subscribe()
    }

    /// Subscribes to coarse run announcements.
    pub fn subscribe_toasts(&self) -> broadcast::Receiver<SyncToast> {
        self.inner.toast_tx.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Replays every entry that has attempts left. Joins an active run.
    pub async fn sync_now(&self) -> SyncRunSnapshot {
        self.begin(SyncTrigger::Manual).await
    }

    /// Replays only entries that have failed before, after resetting the
    /// attempt counters of exhausted ones. Joins an active run.
    pub async fn retry_failed(&self) -> SyncRunSnapshot {
        self.begin(SyncTrigger::RetryFailed).await
    }

    /// Starts the connectivity and queue watchers and the background timer.
    ///
    /// Must be called from within a tokio runtime. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            tracing::warn!("sync manager already started");
            return;
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());

        self.maybe_bootstrap();
        tokio::spawn(self.clone().connectivity_loop(token.clone()));
        tokio::spawn(self.clone().queue_loop(token.clone()));
        tokio::spawn(self.clone().background_loop(token));
    }

    /// Stops the watchers. A run already in flight finishes on its own.
    pub fn stop(&self) {
        let token = self.inner.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Returns the active run, starting one for `trigger` if none is active.
    ///
    /// The run itself is a spawned task, so dropping the returned future does
    /// not cancel it.
    fn begin(&self, trigger: SyncTrigger) -> RunFuture {
        let mut slot = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(active) = slot.as_ref() {
            tracing::debug!(%trigger, run_id = active.id, "joining sync run in flight");
            return active.run.clone();
        }

        let id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed);
        let worker = tokio::spawn(self.clone().run(trigger));
        let manager = self.clone();
        let supervisor = tokio::spawn(async move {
            let snapshot = match worker.await {
                Ok(snapshot) => snapshot,
                Err(e) => manager.abort_run(e),
            };
            manager.finish(id);
            snapshot
        });

        let status = self.clone();
        let run = async move {
            match supervisor.await {
                Ok(snapshot) => snapshot,
                Err(_) => status.status(),
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight { id, run: run.clone() });
        run
    }

    fn finish(&self, id: u64) {
        let mut slot = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|active| active.id == id) {
            *slot = None;
        }
    }

    fn abort_run(&self, error: JoinError) -> SyncRunSnapshot {
        tracing::error!(error = %error, "sync run aborted");
        let now = self.inner.clock.now();
        self.update_status(|status| {
            status.is_syncing = false;
            status.processing_entry_id = None;
            status.processing_entity_id = None;
            status.last_error = Some(format!("sync run aborted: {error}"));
            status.last_failure_at = Some(now);
        })
    }

    async fn run(self, trigger: SyncTrigger) -> SyncRunSnapshot {
        let max_attempts = self.inner.config.max_attempts;
        if trigger == SyncTrigger::RetryFailed {
            let reset = self.inner.queue.reset_exhausted(max_attempts);
            tracing::debug!(reset, "reset exhausted entries");
        }

        let entries: Vec<QueueEntry> = self
            .inner
            .queue
            .entries()
            .into_iter()
            .filter(|entry| selected(trigger, entry, max_attempts))
            .collect();

        let now = self.inner.clock.now();
        self.update_status(|status| {
            status.is_syncing = true;
            status.processing_entry_id = None;
            status.processing_entity_id = None;
            status.processed_count = 0;
            status.success_count = 0;
            status.failed_during_run = 0;
            status.last_run_at = Some(now);
            status.last_trigger = Some(trigger);
        });
        tracing::info!(%trigger, entries = entries.len(), "sync run started");
        let _ = self.inner.toast_tx.send(SyncToast::Started { trigger, pending: entries.len() });

        for (index, captured) in entries.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inner.config.entry_pacing()).await;
            }
            // Removed or replaced since the run started.
            let Some(entry) = self.inner.queue.entry(&captured.id) else {
                tracing::debug!(entry_id = %captured.id, "entry superseded before replay");
                continue;
            };

            self.update_status(|status| {
                status.processing_entry_id = Some(entry.id.clone());
                status.processing_entity_id = Some(entry.entity_id.clone());
            });

            let outcome = self.replay_entry(&entry).await;
            let now = self.inner.clock.now();
            self.update_status(|status| {
                status.processed_count += 1;
                match &outcome {
                    EntryOutcome::Synced => {
                        status.success_count += 1;
                        status.last_success_at = Some(now);
                    }
                    EntryOutcome::Dropped(error) | EntryOutcome::Failed(error) => {
                        status.failed_during_run += 1;
                        status.last_error = Some(error.clone());
                        status.last_failure_at = Some(now);
                    }
                    EntryOutcome::Superseded => {}
                }
            });
        }

        self.reconcile_after_run().await;

        let finished = self.update_status(|status| {
            status.is_syncing = false;
            status.processing_entry_id = None;
            status.processing_entity_id = None;
        });
        tracing::info!(
            %trigger,
            synced = finished.success_count,
            failed = finished.failed_during_run,
            pending = finished.pending_count,
            "sync run finished"
        );
        let toast = if finished.failed_during_run == 0 {
            SyncToast::Completed { synced: finished.success_count }
        } else {
            SyncToast::PartialFailure {
                synced: finished.success_count,
                failed: finished.failed_during_run,
                last_error: finished.last_error.clone(),
            }
        };
        let _ = self.inner.toast_tx.send(toast);
        finished
    }

    /// Replays one entry with retries and records the outcome on the queue.
    async fn replay_entry(&self, entry: &QueueEntry) -> EntryOutcome {
        let max_attempts = self.inner.config.max_attempts;
        let mut attempt = entry.attempt_count;
        let mut conflict_captured = false;

        loop {
            let error = match self.replay_once(entry, &mut conflict_captured).await {
                Ok(()) => {
                    if let Err(e) = self.inner.cache.store_reconciled(&entry.snapshot) {
                        tracing::warn!(entity_id = %entry.entity_id, error = %e, "failed to cache reconciled entity");
                    }
                    self.inner.queue.remove(&entry.id);
                    self.inner.monitor.mark_success("sync replay succeeded");
                    tracing::debug!(entry_id = %entry.id, entity_id = %entry.entity_id, "entry synced");
                    return EntryOutcome::Synced;
                }
                Err(error) => error,
            };

            if error.class() == ErrorClass::Permission {
                tracing::warn!(
                    entry_id = %entry.id,
                    entity_id = %entry.entity_id,
                    %error,
                    "remote store denied the write, dropping entry"
                );
                self.inner.queue.remove(&entry.id);
                return EntryOutcome::Dropped(error.to_string());
            }

            if matches!(error, ReplayError::Offline) {
                return self.defer_entry(entry, attempt, error.to_string());
            }

            attempt = attempt.saturating_add(1);
            let message = error.to_string();
            if self
                .inner
                .queue
                .update(&entry.id, QueueEntryPatch::failed_attempt(attempt, &message))
                .is_none()
            {
                return EntryOutcome::Superseded;
            }
            if let Some(remote_error) = error.connectivity_failure() {
                self.inner.monitor.mark_failure(&remote_error, "sync replay");
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    entry_id = %entry.id,
                    entity_id = %entry.entity_id,
                    attempts = attempt,
                    %error,
                    "giving up on entry until retried"
                );
                return EntryOutcome::Failed(message);
            }

            let delay = self.inner.config.backoff_delay(attempt);
            tracing::debug!(entry_id = %entry.id, attempt, ?delay, %error, "replay failed, backing off");
            tokio::time::sleep(delay).await;
            if self.inner.queue.entry(&entry.id).is_none() {
                return EntryOutcome::Superseded;
            }
        }
    }

    /// Leaves an entry for a later run when connectivity is not online.
    ///
    /// The attempt counter is not touched so the run started by restored
    /// connectivity still picks the entry up. An error from an earlier
    /// attempt in this run is kept over the connectivity message.
    fn defer_entry(&self, entry: &QueueEntry, attempt: u32, message: String) -> EntryOutcome {
        let failed_this_run = attempt > entry.attempt_count;
        if !failed_this_run {
            let patch = QueueEntryPatch {
                last_error: Some(Some(message.clone())),
                ..Default::default()
            };
            if self.inner.queue.update(&entry.id, patch).is_none() {
                return EntryOutcome::Superseded;
            }
        }
        tracing::debug!(entry_id = %entry.id, attempts = attempt, "connectivity not online, deferring entry");
        let error = match self.inner.queue.entry(&entry.id) {
            Some(current) => current.last_error.unwrap_or(message),
            None => return EntryOutcome::Superseded,
        };
        EntryOutcome::Failed(error)
    }

    /// One pass of the replay pipeline.
    async fn replay_once(
        &self,
        entry: &QueueEntry,
        conflict_captured: &mut bool,
    ) -> Result<(), ReplayError> {
        if self.inner.monitor.state() != ConnectivityState::Online {
            return Err(ReplayError::Offline);
        }
        let remote = self.inner.monitor.remote();
        let timeout = self.request_timeout();

        if call("ensure_session", timeout, remote.ensure_session()).await?.is_none() {
            return Err(ReplayError::NoSession);
        }

        let server = call("get_entity", timeout, remote.get_entity(&entry.entity_id)).await?;
        if let Some(server) = server {
            if !*conflict_captured && server.is_newer_than(&entry.snapshot) {
                tracing::warn!(
                    entity_id = %entry.entity_id,
                    server_updated_at = server.updated_at,
                    queued_updated_at = entry.snapshot.updated_at,
                    "remote copy is newer, keeping a backup before overwriting"
                );
                self.inner.queue.store_conflict_backup(&entry.id, server, entry.snapshot.clone());
                *conflict_captured = true;
                self.update_status(|_| {});
            }
        }

        call(
            "upsert_entity",
            timeout,
            remote.upsert_entity(&entry.snapshot, entry.aux_snapshot.as_ref()),
        )
        .await?;

        let version =
            call("create_version", timeout, remote.create_version(&entry.snapshot, &entry.label))
                .await?;
        if version.is_none() {
            return Err(ReplayError::VersionMissing);
        }
        Ok(())
    }

    /// Pulls the full remote list once the queue has drained.
    async fn reconcile_after_run(&self) {
        if !self.inner.queue.is_empty()
            || self.inner.monitor.state() != ConnectivityState::Online
        {
            return;
        }
        let remote = self.inner.monitor.remote();
        match call("list_all", self.request_timeout(), remote.list_all()).await {
            Ok(entities) => {
                if let Err(e) = self.inner.cache.replace_all(&entities) {
                    tracing::warn!(error = %e, "failed to refresh entity cache");
                }
            }
            Err(error) => {
                tracing::warn!(%error, "post-sync refresh failed");
                if let Some(remote_error) = error.connectivity_failure() {
                    self.inner.monitor.mark_failure(&remote_error, "post-sync refresh");
                }
            }
        }
    }

    fn request_timeout(&self) -> Duration {
        self.inner.config.request_timeout(self.inner.monitor.bridge().is_slow())
    }

    /// Applies `change` and refreshes the queue-derived counters.
    fn update_status(&self, change: impl FnOnce(&mut SyncRunSnapshot)) -> SyncRunSnapshot {
        let counts = self.inner.queue.snapshot();
        let has_conflicts = self.inner.queue.has_conflict_backups();
        self.inner.status_tx.send_modify(|status| {
            change(status);
            status.pending_count = counts.pending_count;
            status.failed_count = counts.failed_count;
            status.has_conflict_backups = has_conflicts;
        });
        self.status()
    }

    /// Starts the one-time bootstrap run once there is work and the monitor
    /// reads online.
    fn maybe_bootstrap(&self) {
        if self.inner.bootstrapped.load(Ordering::Acquire)
            || self.inner.queue.is_empty()
            || self.inner.monitor.state() != ConnectivityState::Online
        {
            return;
        }
        if !self.inner.bootstrapped.swap(true, Ordering::AcqRel) {
            drop(self.begin(SyncTrigger::Bootstrap));
        }
    }

    async fn connectivity_loop(self, token: CancellationToken) {
        let mut rx = self.inner.monitor.subscribe();
        let mut previous = rx.borrow_and_update().state;
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            let state = rx.borrow_and_update().state;
            if state == ConnectivityState::Online && previous != ConnectivityState::Online {
                if self.inner.queue.is_empty() {
                    tracing::debug!("connectivity restored with an empty queue");
                } else {
                    drop(self.begin(SyncTrigger::ConnectivityRestored));
                }
            }
            if state == ConnectivityState::Online {
                self.maybe_bootstrap();
            }
            previous = state;
        }
    }

    async fn queue_loop(self, token: CancellationToken) {
        let mut rx = self.inner.queue.subscribe();
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            self.update_status(|_| {});
            self.maybe_bootstrap();
        }
    }

    async fn background_loop(self, token: CancellationToken) {
        let mut visible_rx = self.inner.monitor.visibility().subscribe();
        let interval = self.inner.config.background_interval();
        loop {
            let visible = *visible_rx.borrow_and_update();
            if !visible {
                tokio::select! {
                    _ = token.cancelled() => return,
                    visible = wait_until_visible(&mut visible_rx) => {
                        if !visible {
                            return;
                        }
                    }
                }
            }
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            if self.should_retry_in_background(*visible_rx.borrow()) {
                drop(self.begin(SyncTrigger::Background));
            }
        }
    }

    fn should_retry_in_background(&self, visible: bool) -> bool {
        let max_attempts = self.inner.config.max_attempts;
        visible
            && !self.is_syncing()
            && self.inner.monitor.state() == ConnectivityState::Online
            && self.inner.queue.entries().iter().any(|e| !e.is_exhausted(max_attempts))
    }
}

/// Entries a run of `trigger` replays.
fn selected(trigger: SyncTrigger, entry: &QueueEntry, max_attempts: u32) -> bool {
    match trigger {
        SyncTrigger::RetryFailed => entry.has_failed() || entry.attempt_count > 0,
        _ => !entry.is_exhausted(max_attempts),
    }
}

/// Awaits a remote call under the request timeout.
async fn call<T>(
    operation: &'static str,
    timeout: Duration,
    request: RemoteFuture<'_, T>,
) -> Result<T, ReplayError> {
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result.map_err(ReplayError::from),
        Err(_) => Err(ReplayError::Timeout { operation }),
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

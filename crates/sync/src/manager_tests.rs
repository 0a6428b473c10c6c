// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use super::*;
use crate::bridge::NetworkStatusBridge;
use crate::test_helpers::{application_error, entity, network_error, MockRemote, RemoteCall};
use crate::visibility::PageVisibility;
use serde_json::json;
use ts_core::{ManualClock, MemoryStore, NetworkConnectionSnapshot, RemoteError};

struct Fixture {
    remote: Arc<MockRemote>,
    bridge: NetworkStatusBridge,
    visibility: PageVisibility,
    monitor: ConnectivityMonitor,
    queue: OfflineQueue,
    cache: EntityCache,
    manager: SyncManager,
}

fn fixture() -> Fixture {
    fixture_with(SyncConfig::default(), true)
}

fn fixture_with(config: SyncConfig, online: bool) -> Fixture {
    let remote = MockRemote::new();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at_ms(10_000));
    let bridge = NetworkStatusBridge::new(online, None, &config);
    let visibility = PageVisibility::new(true);
    let monitor = ConnectivityMonitor::new(
        remote.clone(),
        bridge.clone(),
        visibility.clone(),
        store.clone(),
        clock.clone(),
        config.clone(),
    );
    let queue = OfflineQueue::new(store.clone(), clock.clone(), &config);
    let cache = EntityCache::new(store);
    let manager = SyncManager::new(monitor.clone(), queue.clone(), cache.clone(), clock, config);
    Fixture { remote, bridge, visibility, monitor, queue, cache, manager }
}

fn within(actual: Duration, expected: Duration) -> bool {
    actual >= expected && actual < expected + Duration::from_millis(50)
}

#[tokio::test(start_paused = true)]
async fn queued_offline_edit_syncs_when_connectivity_returns() {
    let f = fixture_with(SyncConfig::default(), false);
    f.monitor.start();
    f.manager.start();
    f.queue.enqueue("T1", entity("T1", 100), None, "rename trip");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(f.remote.upserts(), 0, "nothing replays while offline");

    f.bridge.handle_online_event();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(f.remote.upserts_of("T1"), 1);
    assert_eq!(f.remote.version_calls(), 1);
    assert!(f.queue.is_empty());
    let status = f.manager.status();
    assert_eq!(status.success_count, 1);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.last_trigger, Some(SyncTrigger::ConnectivityRestored));
    assert!(!status.is_syncing);

    f.manager.stop();
    f.monitor.stop();
}

#[tokio::test(start_paused = true)]
async fn bootstrap_drains_a_preloaded_queue() {
    let f = fixture();
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    f.manager.start();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(f.queue.is_empty());
    assert_eq!(f.manager.status().last_trigger, Some(SyncTrigger::Bootstrap));
    f.manager.stop();
}

#[tokio::test(start_paused = true)]
async fn replay_follows_the_pipeline_order() {
    let f = fixture();
    f.queue.enqueue("T1", entity("T1", 100), Some(json!({"layout": "list"})), "add stop");

    f.manager.sync_now().await;

    assert_eq!(
        f.remote.calls(),
        vec![
            RemoteCall::EnsureSession,
            RemoteCall::GetEntity("T1".to_string()),
            RemoteCall::Upsert { entity_id: "T1".to_string(), updated_at: 100 },
            RemoteCall::CreateVersion { entity_id: "T1".to_string(), label: "add stop".to_string() },
            RemoteCall::ListAll,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn drained_queue_refreshes_the_cache() {
    let f = fixture();
    f.remote.put_entity(entity("T9", 50));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    f.manager.sync_now().await;

    let ids: Vec<String> = f.cache.list().unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["T1", "T9"]);
    assert!(f.cache.is_reconciled("T1").unwrap());
}

#[tokio::test(start_paused = true)]
async fn newer_remote_copy_is_backed_up_and_overwritten() {
    let f = fixture();
    f.remote.put_entity(entity("T1", 2000));
    let entry = f.queue.enqueue("T1", entity("T1", 1000), None, "edit");

    let status = f.manager.sync_now().await;

    let backups = f.queue.conflict_backups();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].queue_entry_id, entry.id);
    assert_eq!(backups[0].server_snapshot.updated_at, 2000);
    assert_eq!(backups[0].queued_snapshot.updated_at, 1000);
    assert_eq!(f.remote.remote_entity("T1").unwrap().updated_at, 1000);
    assert_eq!(status.success_count, 1);
    assert!(status.has_conflict_backups);
}

#[tokio::test(start_paused = true)]
async fn conflict_is_captured_once_per_run() {
    let f = fixture();
    f.remote.put_entity(entity("T1", 2000));
    f.remote.script_upsert(Err(application_error()));
    f.queue.enqueue("T1", entity("T1", 1000), None, "edit");

    f.manager.sync_now().await;

    assert_eq!(f.remote.upserts(), 2);
    assert_eq!(f.queue.conflict_backups().len(), 1);
    assert!(f.queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn older_remote_copy_needs_no_backup() {
    let f = fixture();
    f.remote.put_entity(entity("T1", 500));
    f.queue.enqueue("T1", entity("T1", 500), None, "edit");

    f.manager.sync_now().await;
    assert!(f.queue.conflict_backups().is_empty());
}

#[tokio::test(start_paused = true)]
async fn permission_denial_drops_the_entry() {
    let f = fixture();
    f.remote.script_upsert(Err(RemoteError::PermissionDenied("row-level security".to_string())));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    let mut toasts = f.manager.subscribe_toasts();

    let status = f.manager.sync_now().await;

    assert_eq!(f.remote.upserts(), 1);
    assert!(f.queue.is_empty());
    assert_eq!(f.monitor.snapshot().consecutive_failures, 0);
    assert_eq!(status.failed_during_run, 1);
    assert_eq!(status.success_count, 0);

    assert!(matches!(toasts.recv().await.unwrap(), SyncToast::Started { .. }));
    assert!(matches!(
        toasts.recv().await.unwrap(),
        SyncToast::PartialFailure { synced: 0, failed: 1, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn failures_back_off_exponentially() {
    let f = fixture();
    for _ in 0..3 {
        f.remote.script_upsert(Err(RemoteError::Status {
            code: 409,
            message: "duplicate key".to_string(),
        }));
    }
    let entry = f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    let status = f.manager.sync_now().await;

    let times = f.remote.times(|c| matches!(c, RemoteCall::Upsert { .. }));
    assert_eq!(times.len(), 3);
    assert!(within(times[1] - times[0], Duration::from_secs(1)));
    assert!(within(times[2] - times[1], Duration::from_secs(2)));

    let entry = f.queue.entry(&entry.id).unwrap();
    assert_eq!(entry.attempt_count, 3);
    assert!(entry.last_error.unwrap().contains("duplicate key"));
    assert_eq!(status.failed_during_run, 1);
    assert_eq!(status.failed_count, 1);
    assert_eq!(f.monitor.snapshot().consecutive_failures, 0, "application errors are not outages");
}

#[tokio::test(start_paused = true)]
async fn network_failure_degrades_and_halts_replay() {
    let f = fixture();
    f.remote.script_upsert(Err(network_error()));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    f.manager.sync_now().await;

    let snapshot = f.monitor.snapshot();
    assert_eq!(snapshot.consecutive_failures, 1);
    assert_eq!(snapshot.state, ConnectivityState::Degraded);
    assert_eq!(f.remote.upserts(), 1, "later attempts stop before the network");

    let entry = &f.queue.entries()[0];
    assert_eq!(entry.attempt_count, 1, "waiting for connectivity uses no attempts");
    assert_eq!(entry.last_error.as_deref(), Some("network error: fetch failed"));
}

#[tokio::test(start_paused = true)]
async fn entry_hit_by_a_network_blip_drains_after_recovery() {
    let f = fixture();
    f.remote.script_upsert(Err(network_error()));
    f.manager.start();
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(f.monitor.state(), ConnectivityState::Degraded);
    assert_eq!(f.remote.upserts(), 1);
    assert_eq!(f.queue.entries()[0].attempt_count, 1);
    assert!(!f.queue.entries()[0].is_exhausted(SyncConfig::default().max_attempts));

    // The first health probe succeeds and restores online.
    f.monitor.start();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(f.monitor.state(), ConnectivityState::Online);
    assert!(f.queue.is_empty());
    assert_eq!(f.remote.upserts_of("T1"), 2);
    assert_eq!(f.manager.status().last_trigger, Some(SyncTrigger::ConnectivityRestored));
    f.manager.stop();
    f.monitor.stop();
}

#[tokio::test(start_paused = true)]
async fn entries_are_paced_apart() {
    let f = fixture_with(SyncConfig::default().with_entry_pacing_ms(500), true);
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    f.queue.enqueue("T2", entity("T2", 100), None, "edit");

    f.manager.sync_now().await;

    let times = f.remote.times(|c| matches!(c, RemoteCall::Upsert { .. }));
    assert_eq!(times.len(), 2);
    assert!(within(times[1] - times[0], Duration::from_millis(500)));
}

#[tokio::test(start_paused = true)]
async fn slow_link_uses_the_longer_timeout() {
    let config = SyncConfig::default().with_max_attempts(1);
    assert!(config.request_timeout(false) < Duration::from_secs(20));
    assert!(config.request_timeout(true) > Duration::from_secs(20));

    let normal = fixture_with(config.clone(), true);
    normal.remote.set_upsert_delay(Duration::from_secs(20));
    normal.queue.enqueue("T1", entity("T1", 100), None, "edit");
    let status = normal.manager.sync_now().await;
    assert_eq!(status.last_error.as_deref(), Some("upsert_entity timed out"));
    assert_eq!(normal.queue.len(), 1);

    let slow = fixture_with(config, true);
    slow.bridge.update_connection(NetworkConnectionSnapshot {
        save_data: true,
        ..Default::default()
    });
    slow.remote.set_upsert_delay(Duration::from_secs(20));
    slow.queue.enqueue("T1", entity("T1", 100), None, "edit");
    let status = slow.manager.sync_now().await;
    assert_eq!(status.success_count, 1);
    assert!(slow.queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_version_is_not_an_outage() {
    let f = fixture();
    for _ in 0..3 {
        f.remote.script_version(Ok(None));
    }
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    f.manager.sync_now().await;

    assert_eq!(f.remote.versions_created(), 0);
    assert_eq!(f.monitor.snapshot().consecutive_failures, 0);
    let entry = &f.queue.entries()[0];
    assert_eq!(entry.attempt_count, 3);
    assert_eq!(entry.last_error.as_deref(), Some("remote store did not create a version"));
}

#[tokio::test(start_paused = true)]
async fn successful_pass_creates_exactly_one_version() {
    let f = fixture();
    f.remote.script_upsert(Err(application_error()));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    f.manager.sync_now().await;
    f.manager.sync_now().await;

    assert_eq!(f.remote.versions_created(), 1);
    assert_eq!(f.remote.version_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_calls_time_out_as_network_failures() {
    let f = fixture_with(SyncConfig::default().with_max_attempts(1), true);
    f.remote.set_upsert_delay(Duration::from_secs(60));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    let status = f.manager.sync_now().await;

    assert_eq!(status.last_error.as_deref(), Some("upsert_entity timed out"));
    assert_eq!(f.monitor.snapshot().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn offline_monitor_blocks_replay_without_network_calls() {
    let f = fixture();
    f.monitor.set_override(ConnectivityState::Offline);
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    f.manager.sync_now().await;

    assert!(f.remote.calls().is_empty());
    let entry = &f.queue.entries()[0];
    assert_eq!(entry.attempt_count, 0);
    assert_eq!(entry.last_error.as_deref(), Some("connectivity is not online"));
}

#[tokio::test(start_paused = true)]
async fn missing_session_is_retried() {
    let f = fixture();
    f.remote.set_session(None);
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    f.manager.sync_now().await;

    assert_eq!(f.remote.count(|c| matches!(c, RemoteCall::EnsureSession)), 3);
    assert_eq!(f.remote.upserts(), 0);
    assert_eq!(f.monitor.snapshot().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn retry_failed_only_touches_failed_entries() {
    let f = fixture();
    let healthy = f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    let failed = f.queue.enqueue("T2", entity("T2", 100), None, "edit");
    f.queue.update(&failed.id, QueueEntryPatch::failed_attempt(3, "boom"));

    let status = f.manager.retry_failed().await;

    assert_eq!(f.remote.upserts_of("T2"), 1);
    assert_eq!(f.remote.upserts_of("T1"), 0);
    assert_eq!(f.queue.entries(), vec![healthy]);
    assert_eq!(status.last_trigger, Some(SyncTrigger::RetryFailed));
    assert_eq!(f.remote.count(|c| matches!(c, RemoteCall::ListAll)), 0);
}

#[tokio::test(start_paused = true)]
async fn sync_now_skips_exhausted_entries() {
    let f = fixture();
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    let failed = f.queue.enqueue("T2", entity("T2", 100), None, "edit");
    f.queue.update(&failed.id, QueueEntryPatch::failed_attempt(3, "boom"));

    f.manager.sync_now().await;

    assert_eq!(f.remote.upserts_of("T1"), 1);
    assert_eq!(f.remote.upserts_of("T2"), 0);
    assert_eq!(f.queue.entries()[0].entity_id, "T2");
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_join_one_run() {
    let f = fixture();
    f.remote.set_upsert_delay(Duration::from_secs(2));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    let (first, second) = tokio::join!(f.manager.sync_now(), f.manager.retry_failed());

    assert_eq!(first, second);
    assert_eq!(first.last_trigger, Some(SyncTrigger::Manual));
    assert_eq!(f.remote.upserts(), 1);
    assert_eq!(f.remote.version_calls(), 1);
    assert!(!f.manager.is_syncing());
}

#[tokio::test(start_paused = true)]
async fn entries_queued_mid_run_wait_for_the_next_run() {
    let f = fixture();
    f.remote.set_upsert_delay(Duration::from_secs(1));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");

    let manager = f.manager.clone();
    let run = tokio::spawn(async move { manager.sync_now().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.manager.is_syncing());
    assert_eq!(f.manager.status().processing_entity_id.as_deref(), Some("T1"));
    f.queue.enqueue("T2", entity("T2", 100), None, "edit");

    let status = run.await.unwrap();
    assert_eq!(status.processed_count, 1);
    assert_eq!(f.remote.upserts_of("T2"), 0);
    assert_eq!(f.queue.entries()[0].entity_id, "T2");
    assert_eq!(status.pending_count, 1);
}

#[tokio::test(start_paused = true)]
async fn replaced_entries_are_skipped() {
    let f = fixture();
    f.remote.set_upsert_delay(Duration::from_secs(1));
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    f.queue.enqueue("T2", entity("T2", 100), None, "edit");

    let manager = f.manager.clone();
    let run = tokio::spawn(async move { manager.sync_now().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let replacement = f.queue.enqueue("T2", entity("T2", 200), None, "edit again");

    let status = run.await.unwrap();
    assert_eq!(status.success_count, 1);
    assert_eq!(f.remote.upserts_of("T2"), 0);
    assert_eq!(f.queue.entries(), vec![replacement]);
}

#[tokio::test(start_paused = true)]
async fn toasts_announce_start_and_completion() {
    let f = fixture();
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    let mut toasts = f.manager.subscribe_toasts();

    f.manager.sync_now().await;

    assert_eq!(
        toasts.recv().await.unwrap(),
        SyncToast::Started { trigger: SyncTrigger::Manual, pending: 1 }
    );
    assert_eq!(toasts.recv().await.unwrap(), SyncToast::Completed { synced: 1 });
}

#[tokio::test(start_paused = true)]
async fn background_timer_retries_while_visible() {
    let f = fixture();
    f.queue.enqueue("T0", entity("T0", 100), None, "edit");
    f.manager.start();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(f.queue.is_empty(), "bootstrap run drains the first entry");

    f.visibility.set_visible(false);
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(f.remote.upserts_of("T1"), 0, "no background retries while hidden");

    f.visibility.set_visible(true);
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(f.remote.upserts_of("T1"), 1);
    assert_eq!(f.manager.status().last_trigger, Some(SyncTrigger::Background));
    f.manager.stop();
}

#[tokio::test(start_paused = true)]
async fn status_tracks_queue_changes_between_runs() {
    let f = fixture_with(SyncConfig::default(), false);
    f.manager.start();
    f.queue.enqueue("T1", entity("T1", 100), None, "edit");
    f.queue.enqueue("T2", entity("T2", 100), None, "edit");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(f.manager.status().pending_count, 2);
    assert!(!f.manager.is_syncing());
    f.manager.stop();
}

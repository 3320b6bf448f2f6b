//! Local deletion handling, pending-deletion flush, full-listing refresh
//! and untracked-file cleanup

use std::sync::Arc;

use foldsync_core::domain::{now_millis, RemoteId};
use foldsync_remote::MemoryRemote;
use foldsync_state::MemoryStateStore;
use foldsync_sync::engine::{DeletionOutcome, EngineSettings, SyncEngine};
use foldsync_sync::filesystem::LocalFileSystemAdapter;

use crate::common::{mtime, set_mtime, Harness, T0};

// ============================================================================
// handle_local_deletion
// ============================================================================

#[tokio::test]
async fn test_local_deletion_removes_remote_counterpart() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "gone.txt", b"g", T0).await.unwrap();
    let path = h.path("gone.txt");

    assert_eq!(
        h.engine.handle_local_deletion(&path).await,
        DeletionOutcome::RemoteDeleted
    );
    assert!(h.remote_root_names().await.is_empty());
    assert!(h.engine.tracker().is_deleted_locally(&path));

    // Repeating the deletion is harmless
    assert_eq!(
        h.engine.handle_local_deletion(&path).await,
        DeletionOutcome::AlreadyAbsent
    );
}

#[tokio::test]
async fn test_local_deletion_removes_lingering_local_entry() {
    let h = Harness::new();
    let path = h.write("ghost.txt", b"still here");

    assert_eq!(
        h.engine.handle_local_deletion(&path).await,
        DeletionOutcome::AlreadyAbsent
    );
    assert!(!path.exists());
}

#[tokio::test]
async fn test_outside_root_deletion_is_ignored() {
    let h = Harness::new();
    let outside = std::env::temp_dir().join("foldsync-not-mine.txt");

    assert_eq!(
        h.engine.handle_local_deletion(&outside).await,
        DeletionOutcome::Skipped
    );
    assert!(!h.engine.tracker().is_deleted_locally(&outside));
}

#[tokio::test]
async fn test_failed_remote_delete_is_flushed_by_next_pass() {
    let h = Harness::new();
    let root = h.remote.root_id();
    let docs = h.remote.insert_folder(&root, "docs").await.unwrap();
    h.remote.insert_file(&docs, "old.txt", b"o", T0).await.unwrap();
    h.mkdir("docs");
    let path = h.path("docs/old.txt");

    h.remote.fail_name("old.txt").await;
    assert_eq!(
        h.engine.handle_local_deletion(&path).await,
        DeletionOutcome::Queued
    );
    assert!(h.engine.tracker().is_pending_deletion(&path));

    h.remote.clear_failures().await;
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.remote_deletions, 1);
    assert_eq!(report.downloads, 0);
    assert!(h.remote.names_in(&docs).await.is_empty());
    assert!(!path.exists());
    assert_eq!(h.engine.tracker().pending_deletion_count(), 0);
}

#[tokio::test]
async fn test_unresolvable_parent_queues_deletion() {
    let h = Harness::new();
    let path = h.path("never-synced/file.txt");

    assert_eq!(
        h.engine.handle_local_deletion(&path).await,
        DeletionOutcome::Queued
    );
    assert_eq!(h.engine.tracker().pending_deletion_count(), 1);
}

#[tokio::test]
async fn test_reconcile_does_not_resurrect_in_flight_deletion() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "racing.txt", b"r", T0).await.unwrap();
    h.engine.tracker().mark_deleted_locally(&h.path("racing.txt"));

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.downloads, 0);
    assert!(!h.path("racing.txt").exists());
}

#[tokio::test]
async fn test_local_folder_deletion_forgets_its_baseline() {
    let h = Harness::new();
    h.write("docs/sub/a.txt", b"a");
    h.engine.reconcile_root().await;
    assert_eq!(h.baseline("docs/sub"), vec!["a.txt"]);

    let docs = h.path("docs");
    std::fs::remove_dir_all(&docs).unwrap();

    assert_eq!(
        h.engine.handle_local_deletion(&docs).await,
        DeletionOutcome::RemoteDeleted
    );
    assert!(h.baseline("docs").is_empty());
    assert!(h.baseline("docs/sub").is_empty());
    let snapshot = h.store.snapshot().await;
    assert_eq!(snapshot.folder("docs"), None);
    assert_eq!(snapshot.folder("docs/sub"), None);
}

#[tokio::test]
async fn test_queued_deletion_already_absent_remotely_is_dropped() {
    let h = Harness::new();
    h.engine.tracker().queue_deletion(&h.path("ghost.txt"));

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.remote_deletions, 0);
    assert_eq!(h.engine.tracker().pending_deletion_count(), 0);
}

#[tokio::test]
async fn test_queued_deletion_of_recreated_path_keeps_both_copies() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "keep.txt", b"k", T0).await.unwrap();
    let path = h.write_at("keep.txt", b"k", T0).await;
    h.engine.tracker().queue_deletion(&path);

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.remote_deletions, 0);
    assert_eq!(h.remote_root_names().await, vec!["keep.txt"]);
    assert!(path.exists());
    assert_eq!(h.engine.tracker().pending_deletion_count(), 0);
}

// ============================================================================
// refresh_from_remote_listing
// ============================================================================

#[tokio::test]
async fn test_refresh_downloads_missing_and_newer_files_only() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "new.txt", b"new", T0).await.unwrap();
    h.remote.insert_file(&root, "stale.txt", b"fresh", T0).await.unwrap();
    h.remote.insert_file(&root, "same.txt", b"remote", T0).await.unwrap();
    h.remote.insert_file(&root, "deleting.txt", b"d", T0).await.unwrap();
    h.remote.insert_folder(&root, "folder").await.unwrap();

    h.write_at("stale.txt", b"old", T0 - 10_000).await;
    h.write_at("same.txt", b"local", T0).await;
    h.engine.tracker().mark_deleted_locally(&h.path("deleting.txt"));

    let report = h.engine.refresh_from_remote_listing().await;

    assert_eq!(report.downloads, 2);
    assert_eq!(std::fs::read(h.path("new.txt")).unwrap(), b"new");
    assert_eq!(std::fs::read(h.path("stale.txt")).unwrap(), b"fresh");
    assert_eq!(std::fs::read(h.path("same.txt")).unwrap(), b"local");
    assert!(!h.path("deleting.txt").exists());
    assert!(!h.path("folder").exists());
    assert_eq!(mtime(&h.path("new.txt")).await, T0);
}

#[tokio::test]
async fn test_refresh_is_quiet_once_in_sync() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "a.txt", b"a", T0).await.unwrap();

    assert_eq!(h.engine.refresh_from_remote_listing().await.downloads, 1);
    assert_eq!(h.engine.refresh_from_remote_listing().await.downloads, 0);
}

// ============================================================================
// cleanup_untracked_local
// ============================================================================

#[tokio::test]
async fn test_cleanup_removes_only_stale_untracked_root_files() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "tracked.txt", b"t", T0).await.unwrap();

    let orphan = h.write_at("orphan.txt", b"o", T0).await;
    let tracked = h.write_at("tracked.txt", b"t", T0).await;
    let future = h.write_at("future.txt", b"f", now_millis() + 60_000).await;
    let uploading = h.write_at("uploading.txt", b"u", T0).await;
    h.engine.tracker().mark_uploaded(&uploading);
    let nested = h.write_at("dir/inner.txt", b"i", T0).await;
    let state = h.write(".sync_state.json", b"{}");
    h.engine.tracker().mark_deleted_locally(&h.path("whatever.txt"));

    let report = h.engine.cleanup_untracked_local().await;

    assert_eq!(report.local_deletions, 1);
    assert!(!orphan.exists());
    assert!(tracked.exists());
    assert!(future.exists());
    assert!(uploading.exists());
    assert!(nested.exists());
    assert!(state.exists());
    assert!(!h.engine.tracker().is_deleted_locally(&h.path("whatever.txt")));
}

#[tokio::test]
async fn test_cleanup_aborts_when_remote_listing_fails() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let orphan = root.join("orphan.txt");
    std::fs::write(&orphan, b"o").unwrap();
    set_mtime(&orphan, T0).await;

    let engine = SyncEngine::new(
        Arc::new(MemoryRemote::new()),
        Arc::new(LocalFileSystemAdapter::new()),
        Arc::new(MemoryStateStore::new()),
        EngineSettings::new(&root, RemoteId::new("missing-root").unwrap()),
    );

    let report = engine.cleanup_untracked_local().await;

    assert!(!report.is_clean());
    assert_eq!(report.local_deletions, 0);
    assert!(orphan.exists());
}

#[tokio::test]
async fn test_reconcile_tree_runs_cleanup_after_reconciliation() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "a.txt", b"a", T0).await.unwrap();
    h.write_at("b.txt", b"b", T0).await;

    let report = h.engine.reconcile_tree().await;

    // b.txt is new locally, so it is uploaded rather than cleaned up
    assert_eq!(report.uploads, 1);
    assert_eq!(report.downloads, 1);
    assert_eq!(report.local_deletions, 0);
    assert_eq!(h.local_names(""), vec!["a.txt", "b.txt"]);
    assert_eq!(h.remote_root_names().await, vec!["a.txt", "b.txt"]);
}

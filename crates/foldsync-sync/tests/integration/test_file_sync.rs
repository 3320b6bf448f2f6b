//! Watcher-triggered per-file checks

use std::time::Duration;

use foldsync_sync::engine::FileSyncOutcome;

use crate::common::{mtime, Harness, T0};

async fn harness_with_remote_doc(remote_ms: i64) -> Harness {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote
        .insert_file(&root, "doc.txt", b"remote", remote_ms)
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn test_local_newer_beyond_threshold_replaces_remote() {
    let h = harness_with_remote_doc(T0).await;
    let path = h.write_at("doc.txt", b"local", T0 + 3000).await;

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Replaced);

    let counts = h.remote.counts();
    assert_eq!(counts.uploads, 1);
    let id = h.remote.child_id(&h.remote.root_id(), "doc.txt").await.unwrap();
    assert_eq!(h.remote.content_of(&id).await.unwrap(), b"local");
    // Replaced in place, not duplicated
    assert_eq!(h.remote_root_names().await, vec!["doc.txt"]);
}

#[tokio::test]
async fn test_remote_newer_takes_no_action() {
    let h = harness_with_remote_doc(T0).await;
    let path = h.write_at("doc.txt", b"local", T0 - 3000).await;

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::RemoteNewer);

    assert_eq!(h.remote.counts().total(), 0);
    assert_eq!(std::fs::read(&path).unwrap(), b"local");
}

#[tokio::test]
async fn test_small_delta_is_in_sync() {
    let h = harness_with_remote_doc(T0).await;
    let path = h.write_at("doc.txt", b"local", T0 + 500).await;

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::InSync);
    assert_eq!(h.remote.counts().total(), 0);
}

#[tokio::test]
async fn test_new_file_is_uploaded() {
    let h = Harness::new();
    let path = h.write("fresh.txt", b"hello");

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Uploaded);
    assert_eq!(h.remote_root_names().await, vec!["fresh.txt"]);
    assert!(h.engine.tracker().is_recently_uploaded(&path));
}

#[tokio::test]
async fn test_nested_file_resolves_parent_by_name() {
    let h = Harness::new();
    let root = h.remote.root_id();
    let docs = h.remote.insert_folder(&root, "docs").await.unwrap();
    let year = h.remote.insert_folder(&docs, "2024").await.unwrap();
    let path = h.write("docs/2024/report.pdf", b"pdf");

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Uploaded);
    assert_eq!(h.remote.names_in(&year).await, vec!["report.pdf"]);
}

#[tokio::test]
async fn test_unknown_parent_is_left_to_reconciliation() {
    let h = Harness::new();
    let path = h.write("brand-new-dir/file.txt", b"x");

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Skipped);
    assert_eq!(h.remote.counts().total(), 0);
}

#[tokio::test]
async fn test_non_syncable_paths_are_skipped() {
    let h = Harness::new();
    let dir = h.mkdir("folder");
    let state = h.write(".sync_state.json", b"{}");
    let outside = std::env::temp_dir().join("foldsync-outside.txt");

    assert_eq!(h.engine.sync_file(&dir).await, FileSyncOutcome::Skipped);
    assert_eq!(h.engine.sync_file(&state).await, FileSyncOutcome::Skipped);
    assert_eq!(h.engine.sync_file(&outside).await, FileSyncOutcome::Skipped);
    assert_eq!(
        h.engine.sync_file(&h.path("vanished.txt")).await,
        FileSyncOutcome::Skipped
    );
    assert_eq!(h.engine.sync_file(&h.root).await, FileSyncOutcome::Skipped);
    assert_eq!(h.remote.counts().total(), 0);
}

#[tokio::test]
async fn test_upload_failure_is_reported() {
    let h = Harness::new();
    h.remote.fail_name("broken.txt").await;
    let path = h.write("broken.txt", b"x");

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Failed);
    assert!(!h.engine.tracker().is_recently_uploaded(&path));
}

#[tokio::test(start_paused = true)]
async fn test_suppression_window_skips_rechecks() {
    let h = Harness::new();
    let path = h.write("report.pdf", b"v1");
    // Stamp uploads with the local time so the post-window check is in sync
    h.remote.set_clock(mtime(&path).await);

    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Uploaded);

    tokio::time::advance(Duration::from_millis(5000)).await;
    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::Suppressed);
    assert_eq!(h.remote.counts().uploads, 1);

    tokio::time::advance(Duration::from_millis(5001)).await;
    assert_eq!(h.engine.sync_file(&path).await, FileSyncOutcome::InSync);
    assert_eq!(h.remote.counts().uploads, 1);
}

#[tokio::test]
async fn test_creation_clears_deletion_bookkeeping() {
    let h = Harness::new();
    let path = h.path("back.txt");
    h.engine.tracker().mark_deleted_locally(&path);
    h.engine.tracker().queue_deletion(&path);

    h.engine.note_local_creation(&path);

    assert!(!h.engine.tracker().is_deleted_locally(&path));
    assert!(!h.engine.tracker().is_pending_deletion(&path));
}

//! Folder reconciliation: convergence, idempotence, deletions, failures

use std::time::Duration;

use foldsync_core::domain::SyncStateSnapshot;
use foldsync_core::ports::IRemoteStorage;

use crate::common::{names, set_mtime, Harness, T0};

#[tokio::test]
async fn test_empty_baseline_converges_to_union() {
    let h = Harness::new();
    let root = h.remote.root_id();

    h.write("a.txt", b"local a");
    h.write("sub/x.txt", b"local x");
    h.remote.insert_file(&root, "b.txt", b"remote b", T0).await.unwrap();
    let rsub = h.remote.insert_folder(&root, "rsub").await.unwrap();
    h.remote.insert_file(&rsub, "y.txt", b"remote y", T0).await.unwrap();

    let report = h.engine.reconcile_root().await;

    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(report.uploads, 2);
    assert_eq!(report.downloads, 2);
    assert_eq!(report.folders_created, 2);
    assert_eq!(report.remote_deletions + report.local_deletions, 0);

    let expected = vec!["a.txt", "b.txt", "rsub", "sub"];
    assert_eq!(h.local_names(""), expected);
    assert_eq!(h.remote_root_names().await, expected);
    assert_eq!(h.baseline(""), expected);

    assert_eq!(h.local_names("rsub"), vec!["y.txt"]);
    let sub = h.remote.child_id(&root, "sub").await.unwrap();
    assert_eq!(h.remote.names_in(&sub).await, vec!["x.txt"]);
    assert_eq!(std::fs::read(h.path("rsub/y.txt")).unwrap(), b"remote y");
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.write("a.txt", b"a");
    h.write("docs/notes.md", b"notes");
    h.remote.insert_file(&root, "b.txt", b"b", T0).await.unwrap();

    h.engine.reconcile_root().await;
    h.remote.reset_counts();

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.total_changes(), 0);
    assert!(report.is_clean());
    assert_eq!(h.remote.counts().total(), 0);
}

#[tokio::test]
async fn test_downloads_carry_remote_timestamp() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "photo.jpg", b"jpeg", T0).await.unwrap();

    h.engine.reconcile_root().await;

    assert_eq!(crate::common::mtime(&h.path("photo.jpg")).await, T0);
}

#[tokio::test]
async fn test_remote_deletion_propagates_locally() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "keep.txt", b"k", T0).await.unwrap();
    let doomed = h.remote.insert_file(&root, "doomed.txt", b"d", T0).await.unwrap();
    h.engine.reconcile_root().await;
    assert!(h.path("doomed.txt").exists());

    h.remote.delete(&doomed).await.unwrap();
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.local_deletions, 1);
    assert!(!h.path("doomed.txt").exists());
    assert_eq!(h.baseline(""), vec!["keep.txt"]);
}

#[tokio::test]
async fn test_local_deletion_propagates_remotely() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "keep.txt", b"k", T0).await.unwrap();
    h.remote.insert_file(&root, "doomed.txt", b"d", T0).await.unwrap();
    h.engine.reconcile_root().await;

    std::fs::remove_file(h.path("doomed.txt")).unwrap();
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.remote_deletions, 1);
    assert_eq!(h.remote_root_names().await, vec!["keep.txt"]);
    assert_eq!(h.baseline(""), vec!["keep.txt"]);
}

#[tokio::test]
async fn test_deleted_local_folder_removes_remote_subtree() {
    let h = Harness::new();
    h.write("album/one.jpg", b"1");
    h.write("album/two.jpg", b"2");
    h.engine.reconcile_root().await;
    assert_eq!(h.remote_root_names().await, vec!["album"]);

    std::fs::remove_dir_all(h.path("album")).unwrap();
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.remote_deletions, 1);
    assert!(h.remote_root_names().await.is_empty());
}

#[tokio::test]
async fn test_newer_remote_copy_is_left_alone_and_stale_local_name_removed() {
    // local {a.txt, b.txt}, remote {a.txt (newer)}, baseline {a.txt, b.txt}
    let mut snapshot = SyncStateSnapshot::new();
    snapshot.set_folder("", names(&["a.txt", "b.txt"]));
    let h = Harness::with_snapshot(snapshot);
    h.engine.load_state().await;

    let root = h.remote.root_id();
    h.write_at("a.txt", b"old a", T0).await;
    h.write_at("b.txt", b"b", T0).await;
    h.remote
        .insert_file(&root, "a.txt", b"new a", T0 + 60_000)
        .await
        .unwrap();

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.local_deletions, 1);
    assert_eq!(report.downloads, 0);
    assert_eq!(report.uploads, 0);
    assert_eq!(h.local_names(""), vec!["a.txt"]);
    assert_eq!(h.remote_root_names().await, vec!["a.txt"]);
    assert_eq!(h.baseline(""), vec!["a.txt"]);
    // Present on both sides, so the folder pass never compares content
    assert_eq!(std::fs::read(h.path("a.txt")).unwrap(), b"old a");
}

#[tokio::test]
async fn test_corrupt_state_infers_no_deletions() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sync");
    std::fs::create_dir_all(&root).unwrap();
    let state_path = root.join(".sync_state.json");
    std::fs::write(&state_path, b"{ this is not json").unwrap();
    std::fs::write(root.join("a.txt"), b"a").unwrap();

    let remote = std::sync::Arc::new(foldsync_remote::MemoryRemote::new());
    let remote_root = remote.root_id();
    remote
        .insert_file(&remote_root, "b.txt", b"b", T0)
        .await
        .unwrap();
    let engine = foldsync_sync::engine::SyncEngine::new(
        remote.clone(),
        std::sync::Arc::new(foldsync_sync::filesystem::LocalFileSystemAdapter::new()),
        std::sync::Arc::new(foldsync_state::JsonStateStore::new(&state_path)),
        foldsync_sync::engine::EngineSettings::new(&root, remote_root.clone()),
    );

    assert_eq!(engine.load_state().await, 0);
    let report = engine.reconcile_root().await;

    assert_eq!(report.remote_deletions + report.local_deletions, 0);
    assert_eq!(report.uploads, 1);
    assert_eq!(report.downloads, 1);
    // The state file itself never travels
    assert_eq!(remote.names_in(&remote_root).await, vec!["a.txt", "b.txt"]);

    let reloaded = foldsync_state::JsonStateStore::new(&state_path);
    let snapshot = foldsync_core::ports::ISyncStateStore::load(&reloaded).await;
    assert_eq!(snapshot.folder(""), Some(&names(&["a.txt", "b.txt"])));
}

#[tokio::test]
async fn test_failed_upload_stays_out_of_baseline_and_is_retried() {
    let h = Harness::new();
    h.write("good.txt", b"g");
    h.write("bad.txt", b"b");
    h.remote.fail_name("bad.txt").await;

    let report = h.engine.reconcile_root().await;
    assert_eq!(report.uploads, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(h.baseline(""), vec!["good.txt"]);

    h.remote.clear_failures().await;
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.uploads, 1);
    assert_eq!(report.local_deletions, 0);
    assert!(h.path("bad.txt").exists());
    assert_eq!(h.remote_root_names().await, vec!["bad.txt", "good.txt"]);
}

#[tokio::test]
async fn test_failed_remote_delete_is_retried_next_pass() {
    let h = Harness::new();
    let root = h.remote.root_id();
    h.remote.insert_file(&root, "stuck.txt", b"s", T0).await.unwrap();
    h.engine.reconcile_root().await;

    std::fs::remove_file(h.path("stuck.txt")).unwrap();
    h.remote.fail_name("stuck.txt").await;
    let report = h.engine.reconcile_root().await;
    assert_eq!(report.remote_deletions, 0);
    assert!(!report.is_clean());
    assert_eq!(h.baseline(""), vec!["stuck.txt"]);

    h.remote.clear_failures().await;
    let report = h.engine.reconcile_root().await;
    assert_eq!(report.remote_deletions, 1);
    assert!(h.remote_root_names().await.is_empty());
}

#[tokio::test]
async fn test_listing_failure_leaves_baseline_untouched() {
    let h = Harness::new();
    let bogus = foldsync_core::domain::RemoteId::new("no-such-folder").unwrap();

    let report = h.engine.reconcile(&bogus, &h.root).await;

    assert_eq!(report.errors.len(), 1);
    assert!(h.engine.baseline_for(&h.root).is_none());
}

#[tokio::test]
async fn test_new_remote_file_in_existing_subfolder_is_fetched() {
    let h = Harness::new();
    h.write("docs/a.md", b"a");
    h.engine.reconcile_root().await;

    let docs = h.remote.child_id(&h.remote.root_id(), "docs").await.unwrap();
    h.remote.insert_file(&docs, "b.md", b"b", T0).await.unwrap();
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.downloads, 1);
    assert_eq!(h.local_names("docs"), vec!["a.md", "b.md"]);
    assert_eq!(h.baseline("docs"), vec!["a.md", "b.md"]);
}

#[tokio::test]
async fn test_recent_upload_missing_remotely_is_not_deleted() {
    let mut snapshot = SyncStateSnapshot::new();
    snapshot.set_folder("", names(&["draft.txt"]));
    let h = Harness::with_snapshot(snapshot);
    h.engine.load_state().await;

    let path = h.write("draft.txt", b"d");
    h.engine.tracker().mark_uploaded(&path);

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.local_deletions, 0);
    assert!(path.exists());
}

#[tokio::test]
async fn test_state_is_persisted_after_each_folder() {
    let h = Harness::new();
    h.write("a/1.txt", b"1");
    h.write("b/2.txt", b"2");

    h.engine.reconcile_root().await;

    // root, a, b
    assert!(h.store.save_count() >= 3);
    let snapshot = h.store.snapshot().await;
    assert_eq!(snapshot.folder("a"), Some(&names(&["1.txt"])));
    assert_eq!(snapshot.folder("b"), Some(&names(&["2.txt"])));
    assert_eq!(snapshot.folder(""), Some(&names(&["a", "b"])));
}

#[tokio::test]
async fn test_state_save_failure_does_not_abort_pass() {
    let h = Harness::new();
    h.store.set_fail_saves(true);
    h.write("a.txt", b"a");

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.uploads, 1);
    assert_eq!(h.remote_root_names().await, vec!["a.txt"]);
}

#[tokio::test]
async fn test_unchanged_timestamps_do_not_matter_at_folder_level() {
    let h = Harness::new();
    let root = h.remote.root_id();
    let path = h.write("same.txt", b"local");
    h.remote.insert_file(&root, "same.txt", b"remote", T0).await.unwrap();
    set_mtime(&path, T0 + 100_000).await;

    let report = h.engine.reconcile_root().await;

    assert_eq!(report.total_changes(), 0);
    assert_eq!(h.baseline(""), vec!["same.txt"]);
}

// ============================================================================
// Folders recreated under a previously synced name
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_folder_recreated_locally_after_remote_deletion_is_uploaded() {
    let h = Harness::new();
    h.write("docs/a.txt", b"first");
    h.engine.reconcile_root().await;
    let docs = h.remote.child_id(&h.remote.root_id(), "docs").await.unwrap();

    // Past the upload suppression window of docs/a.txt
    tokio::time::advance(Duration::from_secs(11)).await;
    h.remote.delete(&docs).await.unwrap();
    let report = h.engine.reconcile_root().await;
    assert_eq!(report.local_deletions, 1);
    assert!(!h.path("docs").exists());
    assert!(h.baseline("docs").is_empty());

    h.write("docs/a.txt", b"second");
    let report = h.engine.reconcile_root().await;

    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(report.local_deletions, 0);
    assert_eq!(report.folders_created, 1);
    assert_eq!(report.uploads, 1);
    assert_eq!(h.local_names("docs"), vec!["a.txt"]);
    let docs = h.remote.child_id(&h.remote.root_id(), "docs").await.unwrap();
    assert_eq!(h.remote.names_in(&docs).await, vec!["a.txt"]);
    assert_eq!(h.baseline("docs"), vec!["a.txt"]);
}

#[tokio::test]
async fn test_folder_recreated_remotely_after_local_deletion_is_downloaded() {
    let h = Harness::new();
    h.write("docs/a.txt", b"first");
    h.engine.reconcile_root().await;

    std::fs::remove_dir_all(h.path("docs")).unwrap();
    let report = h.engine.reconcile_root().await;
    assert_eq!(report.remote_deletions, 1);
    assert!(h.remote_root_names().await.is_empty());
    assert!(h.baseline("docs").is_empty());

    let root = h.remote.root_id();
    let docs = h.remote.insert_folder(&root, "docs").await.unwrap();
    h.remote.insert_file(&docs, "a.txt", b"second", T0).await.unwrap();
    let report = h.engine.reconcile_root().await;

    assert!(report.is_clean(), "errors: {:?}", report.errors);
    assert_eq!(report.remote_deletions, 0);
    assert_eq!(report.folders_created, 1);
    assert_eq!(report.downloads, 1);
    assert_eq!(h.remote.names_in(&docs).await, vec!["a.txt"]);
    assert_eq!(std::fs::read(h.path("docs/a.txt")).unwrap(), b"second");
    assert_eq!(h.baseline("docs"), vec!["a.txt"]);
}

#[tokio::test]
async fn test_folder_gone_on_both_sides_leaves_no_baseline_behind() {
    let h = Harness::new();
    h.write("docs/inner/a.txt", b"a");
    h.engine.reconcile_root().await;
    assert_eq!(h.baseline("docs/inner"), vec!["a.txt"]);

    let docs = h.remote.child_id(&h.remote.root_id(), "docs").await.unwrap();
    h.remote.delete(&docs).await.unwrap();
    std::fs::remove_dir_all(h.path("docs")).unwrap();
    let report = h.engine.reconcile_root().await;

    assert_eq!(report.total_changes(), 0);
    assert!(h.baseline("").is_empty());
    let snapshot = h.store.snapshot().await;
    assert_eq!(snapshot.folder("docs"), None);
    assert_eq!(snapshot.folder("docs/inner"), None);
}

//! Integration tests for foldsync-sync
//!
//! Drives a real `SyncEngine` against an in-memory remote, an in-memory
//! state store and a temporary local directory, covering folder
//! reconciliation, per-file checks, deletion handling, the debounce
//! dispatcher and the polling loops.


mod test_deletion;
mod test_file_sync;
mod test_reconcile;

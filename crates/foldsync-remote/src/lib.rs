//! Foldsync Remote - Remote storage adapters
//!
//! Implementations of the `IRemoteStorage` port:
//!
//! - [`DirectoryRemote`] - A directory (for example a network mount) acting
//!   as the remote store; ids are root-relative paths
//! - [`MemoryRemote`] - In-process store with call counters, failure
//!   injection and a settable clock, for tests
//!
//! Concrete cloud transports plug in behind the same port.

pub mod directory;
pub mod memory;

pub use directory::DirectoryRemote;
pub use memory::{CallCounts, MemoryRemote};

use thiserror::Error;

/// Errors raised by remote storage adapters
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The id does not name a valid location in this store
    #[error("Invalid remote id: {0}")]
    InvalidId(String),

    /// The referenced entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation needs a folder but got a file (or the reverse)
    #[error("Wrong entry kind: {0}")]
    WrongKind(String),

    /// Failure injected by a test double
    #[error("Injected failure: {0}")]
    Injected(String),

    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

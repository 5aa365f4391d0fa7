//! Storage backends and handles.
//!
//! A [`StorageHandle`] is a cheap, cloneable reference to one filesystem
//! backend. Handles are supplied by the caller and are never closed by the
//! transfer engine; the engine only locks them for the duration of a call.
//! Backend-specific protocols stay behind [`StorageBackend`].

use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

mod lock;
pub mod local;
pub mod memory;

pub use local::LocalFs;
pub use lock::HandleLock;
pub use memory::MemFs;

use crate::errors::TransferError;

/// Read-only snapshot of one file's metadata.
///
/// Snapshots are fetched fresh for every evaluation and never cached across
/// calls; a stale snapshot would invalidate the condition decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    /// File size in bytes.
    pub len: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Fast-path capability: the backend can resolve relative paths to real
/// OS-level paths, making it a candidate for native-rename optimization.
///
/// Backends without a real on-disk root (in-memory, archive views) simply
/// don't implement this, and the optimizer's capability check fails at the
/// type level instead of probing runtime attributes.
pub trait SystemPath {
    /// Absolute OS path for `rel` inside this backend. The path is rooted at
    /// the backend's (already canonicalized) root; the leaf itself is not
    /// required to exist.
    fn resolve(&self, rel: &Path) -> io::Result<PathBuf>;
}

/// One filesystem backend: a local directory, an in-memory tree, a mount.
///
/// All paths are relative to the backend root. Implementations must be safe
/// to share across threads; the engine serializes mutations per handle via
/// the lock table.
pub trait StorageBackend: Send + Sync {
    /// Stable identity of the underlying root. Equal identities mean the two
    /// handles are views over the same backend; the identity's ordering also
    /// fixes the lock-acquisition order.
    fn identity(&self) -> &str;

    /// Metadata snapshot for `rel`, `None` if the path does not exist.
    fn metadata(&self, rel: &Path) -> io::Result<Option<FileMetadata>>;

    /// Open `rel` for streaming reads.
    fn reader(&self, rel: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Open `rel` for writing, creating or truncating it.
    fn writer(&self, rel: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Create `rel` and any missing parent segments as directories.
    fn make_dirs(&self, rel: &Path) -> io::Result<()>;

    /// Remove the file at `rel`.
    fn remove(&self, rel: &Path) -> io::Result<()>;

    /// Native rename within this backend.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Set the modification time of `rel`.
    fn set_modified(&self, rel: &Path, when: SystemTime) -> io::Result<()>;

    /// Fast-path capability, if the backend exposes a real OS root.
    fn system_path(&self) -> Option<&dyn SystemPath> {
        None
    }
}

/// Capability-bearing reference to a [`StorageBackend`].
#[derive(Clone)]
pub struct StorageHandle {
    backend: Arc<dyn StorageBackend>,
}

impl StorageHandle {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn identity(&self) -> &str {
        self.backend.identity()
    }

    /// Whether `self` and `other` are views over the same underlying root.
    pub fn same_backend(&self, other: &StorageHandle) -> bool {
        self.identity() == other.identity()
    }

    /// Acquire this handle's exclusive scoped lock, waiting at most `timeout`.
    /// The lock is released when the returned guard drops.
    pub fn lock(&self, timeout: Duration) -> Result<HandleLock, TransferError> {
        lock::acquire(self.identity(), timeout)
    }

    pub fn metadata(&self, rel: &Path) -> io::Result<Option<FileMetadata>> {
        self.backend.metadata(rel)
    }

    pub fn reader(&self, rel: &Path) -> io::Result<Box<dyn Read + Send>> {
        self.backend.reader(rel)
    }

    pub fn writer(&self, rel: &Path) -> io::Result<Box<dyn Write + Send>> {
        self.backend.writer(rel)
    }

    pub fn make_dirs(&self, rel: &Path) -> io::Result<()> {
        self.backend.make_dirs(rel)
    }

    pub fn remove(&self, rel: &Path) -> io::Result<()> {
        self.backend.remove(rel)
    }

    pub fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.backend.rename(from, to)
    }

    pub fn set_modified(&self, rel: &Path, when: SystemTime) -> io::Result<()> {
        self.backend.set_modified(rel, when)
    }

    pub fn system_path(&self) -> Option<&dyn SystemPath> {
        self.backend.system_path()
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("identity", &self.identity())
            .finish()
    }
}

/// Lock the distinct handles of a transfer in ascending identity order.
///
/// Deduplication gives the reentrancy rule (one acquisition per handle per
/// call); the deterministic order rules out deadlock between two concurrent
/// calls referencing the same pair of handles in opposite roles. On timeout
/// the guards acquired so far drop, so no locks are held when the error
/// surfaces.
pub fn lock_ordered(
    handles: &[&StorageHandle],
    timeout: Duration,
) -> Result<Vec<HandleLock>, TransferError> {
    let mut identities: Vec<&str> = handles.iter().map(|h| h.identity()).collect();
    identities.sort_unstable();
    identities.dedup();

    let mut guards = Vec::with_capacity(identities.len());
    for identity in identities {
        guards.push(lock::acquire(identity, timeout)?);
    }
    Ok(guards)
}

//! Typed error definitions for shunt transfers.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Unrecognized policy name. Surfaced before any I/O is attempted.
    #[error("Unknown transfer condition '{0}' (expected one of: always, not_exists, exists, newer, older)")]
    Condition(String),

    #[error("Source path not found: {0}")]
    SourceNotFound(PathBuf),

    /// Write or rename on the destination failed. Any partial artifact has
    /// already been removed when this surfaces.
    #[error("Destination write failed for '{path}': {source}")]
    DestinationWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Timed out waiting for a handle lock. No locks are held when this
    /// surfaces and no I/O has been attempted.
    #[error("Timed out acquiring lock on storage '{identity}' after {waited_ms} ms")]
    LockAcquisition { identity: String, waited_ms: u64 },

    /// Copy succeeded but the source could not be removed. `rolled_back`
    /// reports whether the destination copy was deleted per the cleanup
    /// policy; `false` means a duplicate was retained at the destination.
    #[error("Copy succeeded but removing source '{path}' failed (rolled_back={rolled_back}): {source}")]
    SourceDeletion {
        path: PathBuf,
        rolled_back: bool,
        #[source]
        source: io::Error,
    },

    /// Backend I/O failure outside the named cases (e.g. a stat error that is
    /// not "missing").
    #[error("Storage I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// Stable machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::Condition(_) => "condition",
            TransferError::SourceNotFound(_) => "source_not_found",
            TransferError::DestinationWrite { .. } => "destination_write",
            TransferError::LockAcquisition { .. } => "lock_acquisition",
            TransferError::SourceDeletion { .. } => "source_deletion",
            TransferError::Io { .. } => "io",
        }
    }
}

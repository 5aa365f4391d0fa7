//! The move state machine.
//!
//! `Init -> LockAcquired -> ConditionChecked -> {Skipped | Optimized |
//! CopiedAndDeleted | RolledBack} -> Done`, one-directional, no internal
//! retries. Locks are scoped guards, so every exit path (including errors)
//! releases them. At the end of any call exactly one of these holds: the
//! source still has the original content, the destination has it, or both do
//! (only when rollback was disabled and deletion failed after the copy).
//! "Neither" is impossible by construction: the source is deleted only after
//! the copy has completed.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::condition::Condition;
use super::{copy, optimize};
use crate::errors::TransferError;
use crate::storage::{self, StorageHandle};

/// One transfer, created per invocation and consumed once.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub src: StorageHandle,
    pub src_path: PathBuf,
    pub dst: StorageHandle,
    pub dst_path: PathBuf,
    pub condition: Condition,
    pub preserve_time: bool,
    pub cleanup_destination_on_error: bool,
}

impl TransferRequest {
    /// The condition is a required parameter on purpose: there is no default
    /// policy, and callers that don't care must still say `Always`.
    pub fn new(
        src: StorageHandle,
        src_path: impl Into<PathBuf>,
        dst: StorageHandle,
        dst_path: impl Into<PathBuf>,
        condition: Condition,
    ) -> Self {
        Self {
            src,
            src_path: src_path.into(),
            dst,
            dst_path: dst_path.into(),
            condition,
            preserve_time: false,
            cleanup_destination_on_error: true,
        }
    }

    pub fn preserve_time(mut self, yes: bool) -> Self {
        self.preserve_time = yes;
        self
    }

    pub fn cleanup_destination_on_error(mut self, yes: bool) -> Self {
        self.cleanup_destination_on_error = yes;
        self
    }
}

/// How a `move_file` call ended, when it ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The condition said no; nothing was touched.
    Skipped,
    /// Renamed inside a single backend.
    MovedDirect,
    /// Renamed through a common real-filesystem ancestor of both handles.
    MovedOptimized,
    /// Streamed copy followed by source deletion.
    MovedViaCopy { bytes: u64 },
}

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives single-file moves between storage handles.
///
/// Safe to share across threads; concurrent calls serialize only on the
/// handles they share.
#[derive(Debug, Clone)]
pub struct Mover {
    lock_timeout: Duration,
}

impl Default for Mover {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Mover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the wait for handle locks. Past the bound the call fails with
    /// `LockAcquisition` instead of blocking forever.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Move one file per the request. See the module docs for the state
    /// machine and the no-total-loss invariant.
    pub fn move_file(&self, req: &TransferRequest) -> Result<TransferOutcome, TransferError> {
        // Init -> LockAcquired. Ordered by identity, deduplicated, bounded wait.
        let _locks = storage::lock_ordered(&[&req.src, &req.dst], self.lock_timeout)?;

        // LockAcquired -> ConditionChecked. Metadata is fetched fresh under
        // the locks; nothing can change it out from under the decision.
        let src_meta = req
            .src
            .metadata(&req.src_path)
            .map_err(|e| TransferError::Io {
                path: req.src_path.clone(),
                source: e,
            })?
            .ok_or_else(|| TransferError::SourceNotFound(req.src_path.clone()))?;
        let dst_meta = req
            .dst
            .metadata(&req.dst_path)
            .map_err(|e| TransferError::Io {
                path: req.dst_path.clone(),
                source: e,
            })?;

        if !req.condition.decide(&src_meta, dst_meta.as_ref()) {
            debug!(
                condition = %req.condition,
                src = %req.src_path.display(),
                dest = %req.dst_path.display(),
                "transfer skipped"
            );
            return Ok(TransferOutcome::Skipped);
        }

        // ConditionChecked -> Optimized.
        // A native rename preserves metadata by construction, so preserve_time
        // needs no extra work on this path.
        if let Some(outcome) =
            optimize::try_optimized_move(&req.src, &req.src_path, &req.dst, &req.dst_path)
        {
            info!(
                src = %req.src_path.display(),
                dest = %req.dst_path.display(),
                outcome = ?outcome,
                "moved via rename"
            );
            return Ok(outcome);
        }

        // ConditionChecked -> CopiedAndDeleted. A copy failure needs no
        // rollback: the engine already removed its partial artifact and the
        // source was never touched.
        let bytes = copy::copy_file(
            &req.src,
            &req.src_path,
            &req.dst,
            &req.dst_path,
            req.preserve_time,
        )?;

        if let Err(e) = req.src.remove(&req.src_path) {
            // The one true partial-failure state: both copies exist.
            if req.cleanup_destination_on_error {
                match req.dst.remove(&req.dst_path) {
                    Ok(()) => {
                        warn!(
                            src = %req.src_path.display(),
                            dest = %req.dst_path.display(),
                            "source removal failed; destination copy rolled back"
                        );
                        return Err(TransferError::SourceDeletion {
                            path: req.src_path.clone(),
                            rolled_back: true,
                            source: e,
                        });
                    }
                    Err(second) => {
                        // Secondary failure must not mask the primary error.
                        warn!(
                            dest = %req.dst_path.display(),
                            error = %second,
                            "rollback of destination copy failed; duplicate retained"
                        );
                        return Err(TransferError::SourceDeletion {
                            path: req.src_path.clone(),
                            rolled_back: false,
                            source: e,
                        });
                    }
                }
            }
            warn!(
                src = %req.src_path.display(),
                dest = %req.dst_path.display(),
                "source removal failed; duplicate intentionally retained at destination"
            );
            return Err(TransferError::SourceDeletion {
                path: req.src_path.clone(),
                rolled_back: false,
                source: e,
            });
        }

        info!(
            src = %req.src_path.display(),
            dest = %req.dst_path.display(),
            bytes,
            "moved via copy+delete"
        );
        Ok(TransferOutcome::MovedViaCopy { bytes })
    }
}

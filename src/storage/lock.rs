//! Per-handle lock table.
//!
//! One mutex+condvar cell per backend identity, held in a process-wide table.
//! This is the only global mutable state the engine keeps. Acquisition waits
//! with a bounded deadline; a timeout surfaces `LockAcquisition` with nothing
//! held. The lock is exclusive across calls and released when the guard
//! drops.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::errors::TransferError;

#[derive(Default)]
struct LockCell {
    busy: Mutex<bool>,
    cv: Condvar,
}

static LOCK_TABLE: LazyLock<Mutex<HashMap<String, Arc<LockCell>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// RAII guard for one handle's lock. Dropping it wakes the next waiter.
pub struct HandleLock {
    cell: Arc<LockCell>,
    identity: String,
}

impl HandleLock {
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl std::fmt::Debug for HandleLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleLock")
            .field("identity", &self.identity)
            .finish()
    }
}

impl Drop for HandleLock {
    fn drop(&mut self) {
        let mut busy = lock_unpoisoned(&self.cell.busy);
        *busy = false;
        // notify_all: waiters re-check the flag, so spurious wakeups are harmless.
        self.cell.cv.notify_all();
    }
}

// A poisoned cell mutex only means another thread panicked while touching the
// flag; the flag itself stays valid, so recover the guard instead of
// propagating the panic.
fn lock_unpoisoned<'a>(m: &'a Mutex<bool>) -> MutexGuard<'a, bool> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn cell_for(identity: &str) -> Arc<LockCell> {
    let mut table = LOCK_TABLE.lock().unwrap_or_else(|e| e.into_inner());
    Arc::clone(
        table
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(LockCell::default())),
    )
}

/// Acquire the exclusive lock for `identity`, waiting at most `timeout`.
pub(super) fn acquire(identity: &str, timeout: Duration) -> Result<HandleLock, TransferError> {
    let cell = cell_for(identity);
    let start = Instant::now();

    let mut busy = lock_unpoisoned(&cell.busy);
    while *busy {
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(TransferError::LockAcquisition {
                identity: identity.to_string(),
                waited_ms: waited.as_millis() as u64,
            });
        }
        let (guard, _timed_out) = cell
            .cv
            .wait_timeout(busy, timeout - waited)
            .unwrap_or_else(|e| e.into_inner());
        busy = guard;
    }
    *busy = true;
    drop(busy);

    let waited = start.elapsed();
    if waited.is_zero() {
        trace!(identity, "handle lock acquired immediately");
    } else {
        trace!(
            identity,
            waited_ms = waited.as_millis() as u64,
            "handle lock acquired after wait"
        );
    }
    Ok(HandleLock {
        cell,
        identity: identity.to_string(),
    })
}

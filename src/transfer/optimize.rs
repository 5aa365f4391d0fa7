//! Same-root fast path.
//!
//! A native rename is atomic and cannot produce a half-moved file, which
//! copy+delete momentarily can. When both ends are provably views over the
//! same real tree, the rename is used instead. This stage is a best-effort
//! accelerator: every failure here is swallowed and the orchestrator falls
//! back to the streaming copy. Cross-device rejection by the OS is the
//! authoritative fallback signal; no attempt is made to predict it.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::orchestrate::TransferOutcome;
use crate::storage::{LocalFs, StorageHandle};

/// Attempt to satisfy the move with a native rename.
///
/// Returns the outcome when the move was fully handled, `None` when the
/// caller must fall back to copy+delete.
pub fn try_optimized_move(
    src: &StorageHandle,
    src_path: &Path,
    dst: &StorageHandle,
    dst_path: &Path,
) -> Option<TransferOutcome> {
    // Same backend: let it rename internally.
    if src.same_backend(dst) {
        if let Some(parent) = dst_path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = dst.make_dirs(parent)
        {
            debug!(error = %e, "direct move declined: cannot create destination parents");
            return None;
        }
        return match src.rename(src_path, dst_path) {
            Ok(()) => Some(TransferOutcome::MovedDirect),
            Err(e) => {
                debug!(error = %e, hint = rename_hint(&e), "direct rename declined");
                None
            }
        };
    }

    // Distinct backends: only worth trying when both expose real OS paths.
    let from = src.system_path()?.resolve(src_path).ok()?;
    let to = dst.system_path()?.resolve(dst_path).ok()?;
    let ancestor = common_ancestor(&from, &to)?;

    let rel_from = from.strip_prefix(&ancestor).ok()?.to_path_buf();
    let rel_to = to.strip_prefix(&ancestor).ok()?.to_path_buf();
    if rel_from.as_os_str().is_empty() || rel_to.as_os_str().is_empty() {
        return None;
    }

    // Transient handle rooted at the shared ancestor performs the rename.
    let via = match LocalFs::open(&ancestor) {
        Ok(h) => h,
        Err(e) => {
            debug!(ancestor = %ancestor.display(), error = %e, "optimized move declined: cannot open common ancestor");
            return None;
        }
    };
    if let Some(parent) = rel_to.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = via.make_dirs(parent)
    {
        debug!(error = %e, "optimized move declined: cannot create destination parents");
        return None;
    }
    match via.rename(&rel_from, &rel_to) {
        Ok(()) => Some(TransferOutcome::MovedOptimized),
        Err(e) => {
            debug!(
                ancestor = %ancestor.display(),
                error = %e,
                hint = rename_hint(&e),
                "optimized rename declined"
            );
            None
        }
    }
}

/// Longest common ancestor directory of two absolute paths, `None` when the
/// paths share nothing (e.g. different drives).
fn common_ancestor(a: &Path, b: &Path) -> Option<PathBuf> {
    let mut ancestor = PathBuf::new();
    for (x, y) in a.components().zip(b.components()) {
        if x == y {
            ancestor.push(x);
        } else {
            break;
        }
    }
    if ancestor.as_os_str().is_empty() {
        None
    } else {
        Some(ancestor)
    }
}

#[cfg(unix)]
fn rename_hint(e: &std::io::Error) -> &'static str {
    match e.raw_os_error() {
        Some(code) if code == libc::EXDEV => "cross-device; copy will be used",
        Some(code) if code == libc::EACCES || code == libc::EPERM => {
            "permission denied; check destination perms"
        }
        _ => "falling back to copy",
    }
}

#[cfg(not(unix))]
fn rename_hint(e: &std::io::Error) -> &'static str {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => "permission denied; check destination perms",
        _ => "falling back to copy",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_ancestor_of_siblings() {
        let a = Path::new("/data/incoming/report.txt");
        let b = Path::new("/data/archive/report.txt");
        assert_eq!(common_ancestor(a, b), Some(PathBuf::from("/data")));
    }

    #[test]
    fn common_ancestor_root_only() {
        let a = Path::new("/mnt/a/x");
        let b = Path::new("/srv/b/x");
        assert_eq!(common_ancestor(a, b), Some(PathBuf::from("/")));
    }

    #[cfg(windows)]
    #[test]
    fn no_common_ancestor_across_drives() {
        let a = Path::new("C:\\data\\x");
        let b = Path::new("D:\\data\\x");
        assert_eq!(common_ancestor(a, b), None);
    }
}

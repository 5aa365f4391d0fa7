//! Byte-faithful single-file copy between two handles.
//!
//! The copy streams through bounded buffers (no whole-file buffering, so
//! arbitrarily large files work), lands in a uniquely named temporary sibling
//! of the destination, and is renamed into place once complete. A failed
//! write or rename removes the temporary before the error surfaces, so a
//! failed copy never leaves a truncated artifact.

use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::errors::TransferError;
use crate::storage::StorageHandle;

// 1 MiB buffers keep the syscall count down on large files.
const COPY_BUF: usize = 1024 * 1024;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique temporary sibling of `dest` on the destination handle.
fn temp_sibling(dest: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = format!(".shunt.{}-{}.tmp", std::process::id(), seq);
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// Copy `src_path` on `src` to `dst_path` on `dst`, returning bytes copied.
///
/// Missing destination parent directories are created. With `preserve_time`
/// the destination's mtime is set to the source's mtime as recorded before
/// the copy started.
pub fn copy_file(
    src: &StorageHandle,
    src_path: &Path,
    dst: &StorageHandle,
    dst_path: &Path,
    preserve_time: bool,
) -> Result<u64, TransferError> {
    let src_meta = src
        .metadata(src_path)
        .map_err(|e| TransferError::Io {
            path: src_path.to_path_buf(),
            source: e,
        })?
        .ok_or_else(|| TransferError::SourceNotFound(src_path.to_path_buf()))?;

    if let Some(parent) = dst_path.parent()
        && !parent.as_os_str().is_empty()
    {
        dst.make_dirs(parent).map_err(|e| TransferError::DestinationWrite {
            path: dst_path.to_path_buf(),
            source: e,
        })?;
    }

    let reader = src.reader(src_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            TransferError::SourceNotFound(src_path.to_path_buf())
        } else {
            TransferError::Io {
                path: src_path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let tmp = temp_sibling(dst_path);
    debug!(tmp = %tmp.display(), dest = %dst_path.display(), "streaming copy to temporary");

    let streamed: io::Result<u64> = (|| {
        let mut reader = BufReader::with_capacity(COPY_BUF, reader);
        let mut writer = BufWriter::with_capacity(COPY_BUF, dst.writer(&tmp)?);
        let bytes = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
        Ok(bytes)
    })();

    let bytes = match streamed {
        Ok(n) => n,
        Err(e) => {
            // Best-effort cleanup of the temporary on failure.
            let _ = dst.remove(&tmp);
            return Err(TransferError::DestinationWrite {
                path: dst_path.to_path_buf(),
                source: e,
            });
        }
    };

    if let Err(e) = dst.rename(&tmp, dst_path) {
        let _ = dst.remove(&tmp);
        return Err(TransferError::DestinationWrite {
            path: dst_path.to_path_buf(),
            source: e,
        });
    }

    if preserve_time {
        // The rename already landed; a failed mtime touch-up is logged, not fatal.
        if let Err(e) = dst.set_modified(dst_path, src_meta.modified) {
            warn!(dest = %dst_path.display(), error = %e, "failed to preserve modification time");
        }
    }

    Ok(bytes)
}

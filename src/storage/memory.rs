//! In-memory backend.
//!
//! Backs a handle with a plain map of path -> bytes. No system path is
//! exposed, so transfers involving a `MemFs` always take the streaming copy
//! path. Useful for tests and for staging pipelines that should not touch
//! disk.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use super::{FileMetadata, StorageBackend, StorageHandle};

static NEXT_MEM_ID: AtomicU64 = AtomicU64::new(1);

struct MemFile {
    data: Vec<u8>,
    modified: SystemTime,
}

type FileMap = Arc<Mutex<HashMap<PathBuf, MemFile>>>;

pub struct MemFs {
    identity: String,
    files: FileMap,
}

impl MemFs {
    /// A fresh, empty in-memory backend with a unique identity.
    pub fn new() -> StorageHandle {
        let id = NEXT_MEM_ID.fetch_add(1, Ordering::Relaxed);
        StorageHandle::new(Arc::new(MemFs {
            identity: format!("mem:{id}"),
            files: Arc::new(Mutex::new(HashMap::new())),
        }))
    }

    fn map(&self) -> MutexGuard<'_, HashMap<PathBuf, MemFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize(rel: &Path) -> io::Result<PathBuf> {
    if rel.is_absolute() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("absolute path not allowed inside a handle: {}", rel.display()),
        ));
    }
    let mut out = PathBuf::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(c) => out.push(c),
            Component::CurDir => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes the storage root: {}", rel.display()),
                ));
            }
        }
    }
    Ok(out)
}

fn not_found(rel: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", rel.display()),
    )
}

impl StorageBackend for MemFs {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn metadata(&self, rel: &Path) -> io::Result<Option<FileMetadata>> {
        let key = normalize(rel)?;
        Ok(self.map().get(&key).map(|f| FileMetadata {
            len: f.data.len() as u64,
            modified: f.modified,
        }))
    }

    fn reader(&self, rel: &Path) -> io::Result<Box<dyn Read + Send>> {
        let key = normalize(rel)?;
        let map = self.map();
        let file = map.get(&key).ok_or_else(|| not_found(rel))?;
        Ok(Box::new(Cursor::new(file.data.clone())))
    }

    fn writer(&self, rel: &Path) -> io::Result<Box<dyn Write + Send>> {
        let key = normalize(rel)?;
        Ok(Box::new(MemWriter {
            files: Arc::clone(&self.files),
            key,
            buf: Vec::new(),
        }))
    }

    fn make_dirs(&self, _rel: &Path) -> io::Result<()> {
        // Flat keyed namespace; directories exist implicitly.
        Ok(())
    }

    fn remove(&self, rel: &Path) -> io::Result<()> {
        let key = normalize(rel)?;
        self.map()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| not_found(rel))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from_key = normalize(from)?;
        let to_key = normalize(to)?;
        let mut map = self.map();
        let file = map.remove(&from_key).ok_or_else(|| not_found(from))?;
        map.insert(to_key, file);
        Ok(())
    }

    fn set_modified(&self, rel: &Path, when: SystemTime) -> io::Result<()> {
        let key = normalize(rel)?;
        let mut map = self.map();
        let file = map.get_mut(&key).ok_or_else(|| not_found(rel))?;
        file.modified = when;
        Ok(())
    }
}

/// Buffers writes and commits the full contents on flush (and on drop, so a
/// forgotten flush still lands).
struct MemWriter {
    files: FileMap,
    key: PathBuf,
    buf: Vec<u8>,
}

impl MemWriter {
    fn commit(&mut self) {
        let mut map = self.files.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(
            self.key.clone(),
            MemFile {
                data: self.buf.clone(),
                modified: SystemTime::now(),
            },
        );
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_roundtrip() {
        let fs = MemFs::new();
        let mut w = fs.writer(Path::new("dir/a.txt")).unwrap();
        w.write_all(b"hello").unwrap();
        w.flush().unwrap();
        drop(w);

        let mut buf = String::new();
        fs.reader(Path::new("dir/a.txt"))
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn identities_are_distinct() {
        let a = MemFs::new();
        let b = MemFs::new();
        assert!(!a.same_backend(&b));
        assert!(a.system_path().is_none());
    }

    #[test]
    fn rename_and_remove() {
        let fs = MemFs::new();
        let mut w = fs.writer(Path::new("a")).unwrap();
        w.write_all(b"x").unwrap();
        w.flush().unwrap();
        drop(w);

        fs.rename(Path::new("a"), Path::new("b")).unwrap();
        assert!(fs.metadata(Path::new("a")).unwrap().is_none());
        assert!(fs.metadata(Path::new("b")).unwrap().is_some());

        fs.remove(Path::new("b")).unwrap();
        let err = fs.remove(Path::new("b")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn set_modified_updates_snapshot() {
        let fs = MemFs::new();
        let mut w = fs.writer(Path::new("a")).unwrap();
        w.write_all(b"x").unwrap();
        w.flush().unwrap();
        drop(w);

        let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000);
        fs.set_modified(Path::new("a"), when).unwrap();
        assert_eq!(fs.metadata(Path::new("a")).unwrap().unwrap().modified, when);
    }
}

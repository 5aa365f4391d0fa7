//! Local-directory backend.
//!
//! A `LocalFs` is a sandboxed view rooted at a real directory. The root is
//! canonicalized at open time and doubles as the handle identity, so two
//! handles opened on the same directory compare as the same backend. Relative
//! paths may not be absolute and may not contain `..`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use filetime::FileTime;

use super::{FileMetadata, StorageBackend, StorageHandle, SystemPath};

pub struct LocalFs {
    root: PathBuf,
    identity: String,
}

impl LocalFs {
    /// Open a handle rooted at an existing directory.
    pub fn open(root: impl AsRef<Path>) -> io::Result<StorageHandle> {
        let root = dunce::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {}", root.display()),
            ));
        }
        let identity = format!("local:{}", root.display());
        Ok(StorageHandle::new(Arc::new(LocalFs { root, identity })))
    }

    /// Create the root directory if missing, then open it.
    pub fn create(root: impl AsRef<Path>) -> io::Result<StorageHandle> {
        fs::create_dir_all(root.as_ref())?;
        Self::open(root)
    }

    /// Test/embedder helper: a handle rooted at a fresh temp directory.
    /// The directory lives as long as the returned `TempDir`.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn scratch() -> io::Result<(tempfile::TempDir, StorageHandle)> {
        let dir = tempfile::tempdir()?;
        let handle = Self::open(dir.path())?;
        Ok((dir, handle))
    }

    /// Join `rel` onto the root, refusing absolute paths and `..` segments so
    /// a handle cannot reach outside the tree it was opened on.
    fn abs(&self, rel: &Path) -> io::Result<PathBuf> {
        if rel.is_absolute() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("absolute path not allowed inside a handle: {}", rel.display()),
            ));
        }
        let mut out = self.root.clone();
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
}

impl StorageBackend for LocalFs {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn metadata(&self, rel: &Path) -> io::Result<Option<FileMetadata>> {
        match fs::metadata(self.abs(rel)?) {
            Ok(meta) => Ok(Some(FileMetadata {
                len: meta.len(),
                modified: meta.modified()?,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn reader(&self, rel: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.abs(rel)?)?))
    }

    fn writer(&self, rel: &Path) -> io::Result<Box<dyn Write + Send>> {
        let abs = self.abs(rel)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(abs)?;
        Ok(Box::new(file))
    }

    fn make_dirs(&self, rel: &Path) -> io::Result<()> {
        fs::create_dir_all(self.abs(rel)?)
    }

    fn remove(&self, rel: &Path) -> io::Result<()> {
        fs::remove_file(self.abs(rel)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = self.abs(from)?;
        let to = self.abs(to)?;

        // Windows: rename does not overwrite; clear the destination first.
        #[cfg(windows)]
        if to.exists() {
            if let Err(e) = fs::remove_file(&to) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(e);
                }
            }
        }

        fs::rename(&from, &to)?;

        // Unix: best-effort fsync of the destination directory so the rename
        // survives a crash. Never turn a successful rename into a failure.
        #[cfg(unix)]
        if let Some(parent) = to.parent() {
            let _ = fsync_dir(parent);
        }

        Ok(())
    }

    fn set_modified(&self, rel: &Path, when: SystemTime) -> io::Result<()> {
        filetime::set_file_mtime(self.abs(rel)?, FileTime::from_system_time(when))
    }

    fn system_path(&self) -> Option<&dyn SystemPath> {
        Some(self)
    }
}

impl SystemPath for LocalFs {
    fn resolve(&self, rel: &Path) -> io::Result<PathBuf> {
        self.abs(rel)
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_none_for_missing() {
        let (_tmp, fs) = LocalFs::scratch().unwrap();
        assert!(fs.metadata(Path::new("nope.txt")).unwrap().is_none());
    }

    #[test]
    fn write_read_roundtrip() {
        let (_tmp, fs) = LocalFs::scratch().unwrap();
        let mut w = fs.writer(Path::new("a.txt")).unwrap();
        w.write_all(b"payload").unwrap();
        w.flush().unwrap();
        drop(w);

        let mut buf = String::new();
        fs.reader(Path::new("a.txt"))
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "payload");
        assert_eq!(fs.metadata(Path::new("a.txt")).unwrap().unwrap().len, 7);
    }

    #[test]
    fn rejects_escaping_paths() {
        let (_tmp, fs) = LocalFs::scratch().unwrap();
        let err = fs.metadata(Path::new("../outside")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        let err = fs.metadata(Path::new("/etc/hosts")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn same_root_means_same_backend() {
        let (tmp, a) = LocalFs::scratch().unwrap();
        let b = LocalFs::open(tmp.path()).unwrap();
        assert!(a.same_backend(&b));
    }

    #[test]
    fn rename_moves_within_root() {
        let (_tmp, fs) = LocalFs::scratch().unwrap();
        fs.make_dirs(Path::new("sub")).unwrap();
        let mut w = fs.writer(Path::new("x.bin")).unwrap();
        w.write_all(b"x").unwrap();
        w.flush().unwrap();
        drop(w);

        fs.rename(Path::new("x.bin"), Path::new("sub/y.bin")).unwrap();
        assert!(fs.metadata(Path::new("x.bin")).unwrap().is_none());
        assert!(fs.metadata(Path::new("sub/y.bin")).unwrap().is_some());
    }
}

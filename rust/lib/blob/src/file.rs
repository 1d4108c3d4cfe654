use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::BlobError;
use crate::traits::BlobStore;

/// FileStore is a BlobStore backed by the local filesystem.
///
/// Keys map to paths under `base_dir`: key `tweets/ab12.png` →
/// `{base_dir}/tweets/ab12.png`. Parent directories are created on `put`.
pub struct FileStore {
    base_dir: PathBuf,
}

fn io(e: std::io::Error) -> BlobError {
    BlobError::Io(e.to_string())
}

impl FileStore {
    /// Create a FileStore rooted at `base_dir`, creating the directory if needed.
    pub fn open(base_dir: &Path) -> Result<Self, BlobError> {
        fs::create_dir_all(base_dir).map_err(io)?;
        debug!("blob store at {}", base_dir.display());
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    /// Resolve a key to a path. Only plain relative components are accepted,
    /// so a key can never point outside `base_dir`.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(key);
        let plain = !key.is_empty()
            && !key.contains('\\')
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(rel))
    }
}

impl BlobStore for FileStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(&path, data).map_err(io)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(_) if path.is_dir() => Ok(None),
            Err(e) => Err(io(e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("blobs")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_get_delete() {
        let (_dir, store) = store();
        store.put("tweets/a.png", b"png-bytes").unwrap();
        assert_eq!(store.get("tweets/a.png").unwrap().as_deref(), Some(&b"png-bytes"[..]));

        store.delete("tweets/a.png").unwrap();
        assert_eq!(store.get("tweets/a.png").unwrap(), None);
        // Deleting again is a no-op.
        store.delete("tweets/a.png").unwrap();
    }

    #[test]
    fn missing_and_directory_keys_read_as_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("nope.png").unwrap(), None);
        store.put("tweets/a.png", b"x").unwrap();
        assert_eq!(store.get("tweets").unwrap(), None);
    }

    #[test]
    fn traversal_is_rejected() {
        let (_dir, store) = store();
        for key in ["../x", "/etc/passwd", "a/../../x", "", "a\\b", "./a"] {
            assert!(
                matches!(store.put(key, b"x"), Err(BlobError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }
}

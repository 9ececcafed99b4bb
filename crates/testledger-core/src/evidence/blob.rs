use std::path::{Path, PathBuf};

/// Opaque artifact storage. The ledger only ever sees the path strings it
/// gets back; swapping local disk for an object store is a drop-in change.
pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8], path: &str) -> anyhow::Result<String>;
    /// Idempotent: deleting a missing blob is not an error.
    fn delete(&self, path: &str) -> anyhow::Result<()>;
    fn signed_url(&self, path: &str, ttl_secs: u64) -> anyhow::Result<String>;
}

/// Local-disk blob store rooted at one directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, bytes: &[u8], path: &str) -> anyhow::Result<String> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;
        Ok(path.to_string())
    }

    fn delete(&self, path: &str) -> anyhow::Result<()> {
        match std::fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn signed_url(&self, path: &str, _ttl_secs: u64) -> anyhow::Result<String> {
        // Local files need no signature; the path is served as-is.
        Ok(format!("file://{}", self.resolve(path).display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let path = store.put(b"shot", "g1/TID-1/1_1_1_0.png").unwrap();
        assert!(dir.path().join(&path).exists());
        store.delete(&path).unwrap();
        // second delete: missing blob is not an error
        store.delete(&path).unwrap();
    }

    #[test]
    fn signed_url_points_at_the_stored_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert_eq!(store.root(), dir.path());

        let path = store.put(b"shot", "g1/TID-1/1_1_1_0.png").unwrap();
        let url = store.signed_url(&path, 60).unwrap();
        assert_eq!(
            url,
            format!("file://{}", dir.path().join(&path).display())
        );
    }
}

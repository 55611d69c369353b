//! Artifact storage behind block memory fragments.
//!
//! The chain only ever sees the returned URL; the production uploader is an
//! off-node service sitting behind the same trait. The in-tree
//! implementation is a content-addressed copy into the node's working
//! directory, which keeps single-node deployments self-contained.

use crate::error::{ChainError, Result};
use crate::utils::sha256_hex;
use std::fs;
use std::path::PathBuf;

/// Seam between block construction and wherever artifacts actually live.
pub trait ArtifactStore: Send + Sync {
    /// Upload the file at `local_path` and return its stable URL.
    fn upload(&self, local_path: &str) -> Result<String>;
}

/// Content-addressed store under a local directory (usually `memories/`).
pub struct ContentAddressedStore {
    root: PathBuf,
}

impl ContentAddressedStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<ContentAddressedStore> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| ChainError::Io(format!("Failed to create artifact dir: {e}")))?;
        Ok(ContentAddressedStore { root })
    }
}

impl ArtifactStore for ContentAddressedStore {
    fn upload(&self, local_path: &str) -> Result<String> {
        let bytes = fs::read(local_path)
            .map_err(|e| ChainError::Io(format!("Failed to read artifact {local_path}: {e}")))?;
        let digest = sha256_hex(&bytes);

        let target = self.root.join(&digest);
        if !target.exists() {
            fs::write(&target, &bytes)
                .map_err(|e| ChainError::Io(format!("Failed to store artifact: {e}")))?;
        }
        Ok(format!("cas://{digest}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_upload_is_content_addressed() {
        let dir = tempdir().unwrap();
        let store = ContentAddressedStore::new(dir.path().join("memories")).unwrap();

        let file = dir.path().join("fragment.txt");
        fs::write(&file, b"snapshot").unwrap();

        let first = store.upload(file.to_str().unwrap()).unwrap();
        let second = store.upload(file.to_str().unwrap()).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("cas://"));

        fs::write(&file, b"different").unwrap();
        let third = store.upload(file.to_str().unwrap()).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_missing_file_surfaces_io_error() {
        let dir = tempdir().unwrap();
        let store = ContentAddressedStore::new(dir.path().join("memories")).unwrap();
        assert!(store.upload("no/such/file").is_err());
    }
}

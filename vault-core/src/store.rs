//! Hash-addressed chunk store. Chunks live under `chunks/<hh>/<hash>.chunk`
//! on the repository, where `hh` is the first two hex digits of the
//! content address; writes are dedup'd by an exists-check and are never
//! rewritten once present.

use std::path::Path;

use crate::error::{Result, VaultError};
use crate::repo::Repository;

pub struct ChunkStore<'a> {
    repo: &'a dyn Repository,
    staging_dir: std::path::PathBuf,
}

fn prefix_dir(hash: &str) -> Result<&str> {
    if hash.len() < 2 {
        return Err(VaultError::InvalidInput(format!("malformed chunk hash: {hash}")));
    }
    Ok(&hash[..2])
}

impl<'a> ChunkStore<'a> {
    pub fn new(repo: &'a dyn Repository, staging_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            repo,
            staging_dir: staging_dir.into(),
        }
    }

    /// Uploads `encoded` (the already-compressed, size-prefixed buffer)
    /// under its content address `hash` unless a chunk of that address
    /// already exists on the repository (a dedup hit).
    pub fn put(&self, hash: &str, encoded: &[u8]) -> Result<bool> {
        let hh = prefix_dir(hash)?;
        let remote_dir = format!("chunks/{hh}");
        let remote_path = format!("{remote_dir}/{hash}.chunk");

        if self.repo.file_exists(&remote_path)? {
            tracing::debug!(hash, "chunk store dedup hit");
            return Ok(false);
        }

        std::fs::create_dir_all(&self.staging_dir)?;
        let staged = self.staging_dir.join(format!("{hash}.chunk"));
        std::fs::write(&staged, encoded)?;
        self.repo.upload_file(&staged, &remote_dir)?;
        let _ = std::fs::remove_file(&staged);
        Ok(true)
    }

    /// Downloads the encoded bytes for `hash`.
    pub fn get(&self, hash: &str) -> Result<Vec<u8>> {
        let hh = prefix_dir(hash)?;
        let remote_path = format!("chunks/{hh}/{hash}.chunk");
        if !self.repo.file_exists(&remote_path)? {
            return Err(VaultError::ChunkMissing(hash.to_string()));
        }
        let local = self.staging_dir.join(format!("{hash}.get"));
        std::fs::create_dir_all(&self.staging_dir)?;
        self.repo.download_file(&remote_path, &local)?;
        let bytes = std::fs::read(&local)?;
        let _ = std::fs::remove_file(&local);
        Ok(bytes)
    }

    pub fn exists(&self, hash: &str) -> Result<bool> {
        let hh = prefix_dir(hash)?;
        self.repo.file_exists(&format!("chunks/{hh}/{hash}.chunk"))
    }
}

/// Convenience: stage + encode + hash + put, used by the backup engine's
/// per-file chunk loop.
pub fn store_chunk(store: &ChunkStore<'_>, payload: &[u8]) -> Result<(String, bool)> {
    let encoded = crate::codec::encode_chunk(payload)?;
    let hash = crate::hash::sha256_hex(&encoded);
    let created = store.put(&hash, &encoded)?;
    Ok((hash, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::local::LocalRepository;
    use tempfile::tempdir;

    fn new_local_store(dir: &Path) -> (LocalRepository, std::path::PathBuf) {
        let repo_root = dir.join("repo");
        std::fs::create_dir_all(repo_root.join("chunks")).unwrap();
        (LocalRepository::new(repo_root), dir.join("stage"))
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let (repo, stage) = new_local_store(dir.path());
        let store = ChunkStore::new(&repo, stage);

        let (hash, created) = store_chunk(&store, b"hello world").unwrap();
        assert!(created);
        let fetched = store.get(&hash).unwrap();
        let decoded = crate::codec::decode_chunk(&fetched).unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn duplicate_put_is_a_dedup_hit() {
        let dir = tempdir().unwrap();
        let (repo, stage) = new_local_store(dir.path());
        let store = ChunkStore::new(&repo, stage);

        let (hash1, created1) = store_chunk(&store, b"same bytes").unwrap();
        let (hash2, created2) = store_chunk(&store, b"same bytes").unwrap();
        assert_eq!(hash1, hash2);
        assert!(created1);
        assert!(!created2);
    }

    #[test]
    fn missing_chunk_errors() {
        let dir = tempdir().unwrap();
        let (repo, stage) = new_local_store(dir.path());
        let store = ChunkStore::new(&repo, stage);
        let err = store.get(&"0".repeat(64)).unwrap_err();
        assert!(matches!(err, VaultError::ChunkMissing(_)));
    }
}

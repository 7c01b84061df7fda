//! Restore/verify engine: loads a snapshot, reads its file list, pulls
//! chunks via the store, decompresses, writes the output (or discards it
//! while checking integrity), and restores timestamps and permissions.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::codec::decode_chunk;
use crate::error::{Result, VaultError};
use crate::metadata::{FileEntry, Snapshot};
use crate::repo::Repository;
use crate::store::ChunkStore;
use crate::util::sanitize::safe_join;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Success,
    Corrupt,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RestoreFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompareSummary {
    pub added: u64,
    pub unchanged: u64,
    pub changed: u64,
    pub deleted: u64,
}

pub struct RestoreEngine<'a> {
    repo: &'a dyn Repository,
    password: String,
    temp: TempDir,
}

fn output_path(path_key: &str, entry: &FileEntry, output_root: &Path) -> Result<PathBuf> {
    let parent = Path::new(path_key).parent().unwrap_or(Path::new(""));
    let parent_str = parent.to_string_lossy();
    let stripped = parent_str.strip_prefix('/').unwrap_or(&parent_str);
    let dir = safe_join(output_root, stripped)?;
    Ok(dir.join(&entry.original_filename))
}

fn apply_mtime(path: &Path, entry: &FileEntry) {
    let ft = filetime::FileTime::from_unix_time(entry.mtime, 0);
    if entry.is_symlink {
        let _ = filetime::set_symlink_file_times(path, ft, ft);
    } else {
        let _ = filetime::set_file_times(path, ft, ft);
    }
}

#[cfg(unix)]
fn apply_permissions(path: &Path, entry: &FileEntry) {
    if entry.is_symlink {
        return;
    }
    if let Ok(mode) = u32::from_str_radix(&entry.permissions, 8) {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    }
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _entry: &FileEntry) {}

impl<'a> RestoreEngine<'a> {
    pub fn new(repo: &'a dyn Repository, password: String) -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("vault-restore-").tempdir()?;
        Ok(Self { repo, password, temp })
    }

    fn store(&self) -> ChunkStore<'_> {
        ChunkStore::new(self.repo, self.temp.path().join("chunks"))
    }

    /// Downloads `backup/<snapshot_name>`, detects the encryption envelope,
    /// decrypts if required, and parses the JSON document.
    pub fn load(&self, snapshot_name: &str) -> Result<Snapshot> {
        let local = self.temp.path().join(format!("{snapshot_name}.meta"));
        self.repo
            .download_file(&format!("backup/{snapshot_name}"), &local)?;
        let bytes = fs::read(&local)?;
        let _ = fs::remove_file(&local);
        Snapshot::decode(&bytes, &self.password)
    }

    fn reassemble(&self, entry: &FileEntry, mut sink: impl Write) -> Result<u64> {
        let store = self.store();
        let mut written = 0u64;
        for hash in &entry.chunk_hashes {
            if written >= entry.total_size {
                break;
            }
            let raw = store.get(hash)?;
            let payload = decode_chunk(&raw)?;
            let remaining = entry.total_size - written;
            let take = (payload.len() as u64).min(remaining) as usize;
            sink.write_all(&payload[..take])?;
            written += take as u64;
        }
        Ok(written)
    }

    /// Restores one file (or recreates one symlink) from `snapshot` under
    /// `output_root`.
    pub fn restore_file(&self, snapshot: &Snapshot, path_key: &str, output_root: &Path) -> Result<()> {
        let entry = snapshot
            .files
            .get(path_key)
            .ok_or_else(|| VaultError::InvalidInput(format!("unknown path in snapshot: {path_key}")))?;
        let out_path = output_path(path_key, entry, output_root)?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        if entry.is_symlink {
            let target = entry.symlink_target.clone().unwrap_or_default();
            let _ = fs::remove_file(&out_path);
            #[cfg(unix)]
            std::os::unix::fs::symlink(&target, &out_path)?;
            #[cfg(not(unix))]
            {
                return Err(VaultError::InvalidInput(
                    "symlinks are not supported on this platform".into(),
                ));
            }
            apply_mtime(&out_path, entry);
            return Ok(());
        }

        let mut out = fs::File::create(&out_path)?;
        let written = self.reassemble(entry, &mut out)?;
        out.flush()?;
        if written != entry.total_size {
            return Err(VaultError::SizeMismatch {
                expected: entry.total_size,
                got: written,
            });
        }

        apply_mtime(&out_path, entry);
        apply_permissions(&out_path, entry);
        Ok(())
    }

    /// Restores every file in `snapshot`. Per-file failures are collected
    /// and the loop continues; it never aborts partway through.
    pub fn restore_all(&self, snapshot: &Snapshot, output_root: &Path) -> Vec<RestoreFailure> {
        let mut failures = Vec::new();
        for path_key in snapshot.files.keys() {
            if let Err(e) = self.restore_file(snapshot, path_key, output_root) {
                failures.push(RestoreFailure {
                    path: path_key.clone(),
                    error: e.to_string(),
                });
            }
        }
        failures
    }

    /// Restores a file into a scratch location, recomputing its whole-file
    /// SHA-256 and classifying the outcome.
    pub fn verify_file(&self, snapshot: &Snapshot, path_key: &str) -> VerifyOutcome {
        let Some(entry) = snapshot.files.get(path_key) else {
            return VerifyOutcome::Failed;
        };
        if entry.is_symlink {
            return VerifyOutcome::Success;
        }

        let mut hasher = Sha256::new();
        let store = self.store();
        let mut written = 0u64;
        for hash in &entry.chunk_hashes {
            if written >= entry.total_size {
                break;
            }
            let raw = match store.get(hash) {
                Ok(r) => r,
                Err(_) => return VerifyOutcome::Failed,
            };
            let payload = match decode_chunk(&raw) {
                Ok(p) => p,
                Err(_) => return VerifyOutcome::Corrupt,
            };
            let remaining = entry.total_size - written;
            let take = (payload.len() as u64).min(remaining) as usize;
            hasher.update(&payload[..take]);
            written += take as u64;
        }

        if written != entry.total_size {
            return VerifyOutcome::Corrupt;
        }
        let digest = hex::encode(hasher.finalize());
        if digest == entry.sha256_checksum {
            VerifyOutcome::Success
        } else {
            VerifyOutcome::Corrupt
        }
    }

    pub fn verify_all(&self, snapshot: &Snapshot) -> Vec<(String, VerifyOutcome)> {
        snapshot
            .files
            .keys()
            .map(|path_key| (path_key.clone(), self.verify_file(snapshot, path_key)))
            .collect()
    }

    /// Classifies every path in `b` against `a` as added/unchanged/changed,
    /// and every path in `a` absent from `b` as deleted.
    pub fn compare(&self, a: &Snapshot, b: &Snapshot) -> CompareSummary {
        let mut summary = CompareSummary::default();
        for (path_key, b_entry) in &b.files {
            match a.files.get(path_key) {
                None => summary.added += 1,
                Some(a_entry) => {
                    if a_entry.has_changed(b_entry) {
                        summary.changed += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                }
            }
        }
        for path_key in a.files.keys() {
            if !b.files.contains_key(path_key) {
                summary.deleted += 1;
            }
        }
        summary
    }
}

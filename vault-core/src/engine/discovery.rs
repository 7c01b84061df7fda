//! Snapshot discovery: enumerating and classifying what's already in
//! `backup/` on a repository.

use crate::error::Result;
use crate::metadata::{Snapshot, SnapshotType};
use crate::repo::Repository;

/// Snapshot names under `backup/`, sorted lexicographically descending —
/// the `YYYYMMDD_HHMMSS` format means this is also most-recent-first.
pub fn list_snapshots(repo: &dyn Repository) -> Result<Vec<String>> {
    let mut names = repo.list_dir("backup")?;
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

/// The most recent snapshot whose decoded metadata has `type == FULL`.
/// Snapshots that fail to decode (e.g. wrong password) are skipped rather
/// than aborting the search.
pub fn get_latest_full(repo: &dyn Repository, password: &str) -> Result<Option<String>> {
    for name in list_snapshots(repo)? {
        let bytes = match repo.file_exists(&format!("backup/{name}")) {
            Ok(true) => {
                let tmp = std::env::temp_dir().join(format!("vault-discover-{name}"));
                if repo.download_file(&format!("backup/{name}"), &tmp).is_err() {
                    continue;
                }
                let bytes = std::fs::read(&tmp);
                let _ = std::fs::remove_file(&tmp);
                match bytes {
                    Ok(b) => b,
                    Err(_) => continue,
                }
            }
            _ => continue,
        };
        match Snapshot::decode(&bytes, password) {
            Ok(snap) if snap.kind == SnapshotType::Full => return Ok(Some(name)),
            _ => continue,
        }
    }
    Ok(None)
}

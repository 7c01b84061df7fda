//! Snapshot metadata: the self-describing JSON document (optionally wrapped
//! in the [`crate::crypto`] envelope) that enumerates every file in a
//! snapshot and the ordered chunk hashes that reconstitute it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::error::{Result, VaultError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SnapshotType {
    Full = 0,
    Incremental = 1,
    Differential = 2,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileEntry {
    pub original_filename: String,
    #[serde(default)]
    pub chunk_hashes: Vec<String>,
    pub total_size: u64,
    pub mtime: i64,
    pub is_symlink: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub symlink_target: Option<String>,
    pub permissions: String,
    pub sha256_checksum: String,
}

impl FileEntry {
    pub fn has_changed(&self, on_disk: &FileEntry) -> bool {
        if self.is_symlink || on_disk.is_symlink {
            self.symlink_target != on_disk.symlink_target || self.mtime != on_disk.mtime
        } else {
            self.total_size != on_disk.total_size || self.mtime != on_disk.mtime
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: SnapshotType,
    pub timestamp: i64,
    pub previous_backup: String,
    pub remarks: String,
    pub files: BTreeMap<String, FileEntry>,
}

impl Snapshot {
    pub fn new(kind: SnapshotType, timestamp: i64, remarks: String, previous_backup: String) -> Self {
        Self {
            kind,
            timestamp,
            previous_backup,
            remarks,
            files: BTreeMap::new(),
        }
    }

    /// `YYYYMMDD_HHMMSS` local-time name; also the filename under `backup/`.
    pub fn name_for(timestamp: i64) -> String {
        let utc = time::OffsetDateTime::from_unix_timestamp(timestamp)
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
        let dt = time::UtcOffset::local_offset_at(utc)
            .map(|offset| utc.to_offset(offset))
            .unwrap_or(utc);
        format!(
            "{:04}{:02}{:02}_{:02}{:02}{:02}",
            dt.year(),
            u8::from(dt.month()),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second()
        )
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| VaultError::MetadataCorrupt(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| VaultError::MetadataCorrupt(format!("JSON parse failure: {e}")))
    }

    /// Serialises and, for a non-empty password, wraps in the encryption
    /// envelope. An empty password writes plaintext JSON.
    pub fn encode(&self, password: &str) -> Result<Vec<u8>> {
        let plain = self.to_json()?;
        if password.is_empty() {
            Ok(plain)
        } else {
            crypto::encrypt(&plain, password)
        }
    }

    /// Detects the envelope magic; decrypts if present, else parses as
    /// plaintext JSON (backward compatibility with password-free
    /// snapshots).
    pub fn decode(bytes: &[u8], password: &str) -> Result<Self> {
        if crypto::is_encrypted(bytes) {
            let plain = crypto::decrypt(bytes, password)?;
            Self::from_json(&plain)
        } else {
            Self::from_json(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> Snapshot {
        let mut s = Snapshot::new(SnapshotType::Full, 1_700_000_000, "initial".into(), String::new());
        s.files.insert(
            "/src/a.txt".into(),
            FileEntry {
                original_filename: "a.txt".into(),
                chunk_hashes: vec!["abc123".into()],
                total_size: 6,
                mtime: 1_700_000_000,
                is_symlink: false,
                symlink_target: None,
                permissions: "0644".into(),
                sha256_checksum: "deadbeef".into(),
            },
        );
        s
    }

    #[test]
    fn snapshot_round_trip_unencrypted() {
        let s = sample_snapshot();
        let bytes = s.encode("").unwrap();
        assert!(!crypto::is_encrypted(&bytes));
        let back = Snapshot::decode(&bytes, "").unwrap();
        assert_eq!(back.files.len(), s.files.len());
        assert_eq!(back.remarks, s.remarks);
    }

    #[test]
    fn snapshot_round_trip_encrypted() {
        let s = sample_snapshot();
        let bytes = s.encode("hunter2").unwrap();
        assert!(crypto::is_encrypted(&bytes));
        let back = Snapshot::decode(&bytes, "hunter2").unwrap();
        assert_eq!(back.files.len(), s.files.len());
    }

    #[test]
    fn wrong_password_is_metadata_corrupt() {
        let s = sample_snapshot();
        let bytes = s.encode("hunter2").unwrap();
        let err = Snapshot::decode(&bytes, "wrong").unwrap_err();
        assert!(matches!(err, VaultError::MetadataCorrupt(_)));
    }

    #[test]
    fn snapshot_name_formatting() {
        // 2024-01-02 03:04:05 UTC
        let name = Snapshot::name_for(1_704_164_645);
        assert_eq!(name.len(), "YYYYMMDD_HHMMSS".len());
        assert!(name.contains('_'));
    }

    #[test]
    fn has_changed_detects_size_and_mtime() {
        let base = FileEntry {
            original_filename: "b.bin".into(),
            chunk_hashes: vec![],
            total_size: 10,
            mtime: 100,
            is_symlink: false,
            symlink_target: None,
            permissions: "0644".into(),
            sha256_checksum: String::new(),
        };
        let mut changed_size = base.clone();
        changed_size.total_size = 11;
        assert!(base.has_changed(&changed_size));

        let mut changed_mtime = base.clone();
        changed_mtime.mtime = 101;
        assert!(base.has_changed(&changed_mtime));

        let identical = base.clone();
        assert!(!base.has_changed(&identical));
    }
}

//! Repository backend abstraction. The engine talks to a repository purely
//! through this trait — it never downcasts to a concrete backend, mirroring
//! the tagged-variant-over-one-interface shape used throughout this crate's
//! predecessor for its own backend/codec abstractions.

pub mod local;
pub mod nfs;
pub mod remote;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::sha256_hex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Local,
    Nfs,
    Remote,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Local => "local",
            RepositoryType::Nfs => "nfs",
            RepositoryType::Remote => "remote",
        }
    }
}

/// Persisted once per repository as `config.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RepositoryType,
    pub path: String,
    pub created_at: String,
    pub password_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_backup_path: Option<String>,
}

/// The data-model sense of "repository": name, path, type and the password
/// held only for the duration of one operation. Distinct from the
/// [`Repository`] trait below, which is the backend's capability interface.
#[derive(Clone)]
pub struct RepositoryInfo {
    pub name: String,
    pub path: String,
    pub kind: RepositoryType,
    pub password: String,
}

impl RepositoryInfo {
    pub fn hashed_password(&self) -> String {
        sha256_hex(self.password.as_bytes())
    }
}

pub fn iso8601_now() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let dt = time::OffsetDateTime::from_unix_timestamp(secs as i64).unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    dt.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Capability set consumed by the snapshot/restore engines. `upload_file`
/// overwrites; directory variants recurse. Backends are responsible for
/// their own atomic-rename semantics where the underlying transport isn't
/// already atomic (see `Repository::upload_file` docs on each impl).
pub trait Repository: Send + Sync {
    fn exists(&self) -> Result<bool>;

    /// Creates the repository root, `backup/`, `chunks/`, and writes
    /// `config.json`.
    fn initialize(&self, info: &RepositoryInfo) -> Result<()>;

    /// Removes every file under the repository root, including
    /// `config.json`.
    fn delete(&self) -> Result<()>;

    fn write_config(&self, config: &RepositoryConfig) -> Result<()>;

    fn read_config(&self) -> Result<RepositoryConfig>;

    fn upload_file(&self, local_path: &Path, remote_dir: &str) -> Result<()>;

    fn upload_directory(&self, local_dir: &Path, remote_dir: &str) -> Result<()>;

    fn download_file(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    fn download_directory(&self, remote_dir: &str, local_path: &Path) -> Result<()>;

    /// `true` iff `remote_path` (relative to the repository root) exists.
    fn file_exists(&self, remote_path: &str) -> Result<bool>;

    /// Lists entry names directly under `remote_dir` (non-recursive).
    fn list_dir(&self, remote_dir: &str) -> Result<Vec<String>>;
}

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};
use crate::repo::{Repository, RepositoryConfig, RepositoryInfo};

const BUFFER_SIZE: usize = 1024 * 1024;

/// Repository rooted under an NFS export. This port, like the engine it was
/// ported from, assumes the export is already mounted at `mount_point` (e.g.
/// via an administrator running `mount -t nfs host:/export /mnt/...` ahead
/// of time) — mounting itself, like free-space scanning and mount-point
/// discovery, is an external collaborator this crate only calls through a
/// path, never manages.
pub struct NfsRepository {
    mount_point: PathBuf,
    name: String,
    pub server_ip: String,
    pub server_backup_path: String,
}

impl NfsRepository {
    pub fn new(
        mount_point: impl Into<PathBuf>,
        name: impl Into<String>,
        server_ip: impl Into<String>,
        server_backup_path: impl Into<String>,
    ) -> Self {
        Self {
            mount_point: mount_point.into(),
            name: name.into(),
            server_ip: server_ip.into(),
            server_backup_path: server_backup_path.into(),
        }
    }

    fn root(&self) -> PathBuf {
        self.mount_point.join(&self.name)
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        self.root().join(rel.trim_start_matches('/'))
    }

    fn mkdir_p(dir: &Path) -> Result<()> {
        match fs::create_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// 1 MiB buffered copy, as specified for the NFS backend's upload path.
    fn buffered_copy(src: &Path, dst: &Path) -> Result<()> {
        let mut reader = File::open(src)?;
        let mut writer = File::create(dst)?;
        let mut buf = vec![0u8; BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
        }
        writer.flush()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dst, fs::Permissions::from_mode(0o644))?;
        }
        Ok(())
    }
}

impl Repository for NfsRepository {
    fn exists(&self) -> Result<bool> {
        Ok(self.root().exists())
    }

    fn initialize(&self, _info: &RepositoryInfo) -> Result<()> {
        Self::mkdir_p(&self.root().join("backup"))?;
        Self::mkdir_p(&self.root().join("chunks"))?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.root().exists() {
            fs::remove_dir_all(self.root())?;
        }
        Ok(())
    }

    fn write_config(&self, config: &RepositoryConfig) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(config)
            .map_err(|e| VaultError::Config(e.to_string()))?;
        fs::write(self.root().join("config.json"), bytes)?;
        Ok(())
    }

    fn read_config(&self) -> Result<RepositoryConfig> {
        let bytes = fs::read(self.root().join("config.json"))?;
        serde_json::from_slice(&bytes).map_err(|e| VaultError::Config(e.to_string()))
    }

    fn upload_file(&self, local_path: &Path, remote_dir: &str) -> Result<()> {
        let dir = self.resolve(remote_dir);
        Self::mkdir_p(&dir)?;
        let file_name = local_path
            .file_name()
            .ok_or_else(|| VaultError::InvalidInput("no file name".into()))?;
        Self::buffered_copy(local_path, &dir.join(file_name))
    }

    fn upload_directory(&self, local_dir: &Path, remote_dir: &str) -> Result<()> {
        let dest_root = self.resolve(remote_dir);
        for entry in walkdir::WalkDir::new(local_dir).follow_links(false) {
            let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
            let rel = entry.path().strip_prefix(local_dir).unwrap_or(entry.path());
            let dest = dest_root.join(rel);
            if entry.file_type().is_dir() {
                Self::mkdir_p(&dest)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = dest.parent() {
                    Self::mkdir_p(parent)?;
                }
                Self::buffered_copy(entry.path(), &dest)?;
            }
        }
        Ok(())
    }

    fn download_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        if let Some(parent) = local_path.parent() {
            Self::mkdir_p(parent)?;
        }
        Self::buffered_copy(&self.resolve(remote_path), local_path)
    }

    fn download_directory(&self, remote_dir: &str, local_path: &Path) -> Result<()> {
        let src_root = self.resolve(remote_dir);
        if !src_root.exists() {
            return Ok(());
        }
        for entry in walkdir::WalkDir::new(&src_root).follow_links(false) {
            let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
            let rel = entry.path().strip_prefix(&src_root).unwrap_or(entry.path());
            let dest = local_path.join(rel);
            if entry.file_type().is_dir() {
                Self::mkdir_p(&dest)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = dest.parent() {
                    Self::mkdir_p(parent)?;
                }
                Self::buffered_copy(entry.path(), &dest)?;
            }
        }
        Ok(())
    }

    fn file_exists(&self, remote_path: &str) -> Result<bool> {
        Ok(self.resolve(remote_path).exists())
    }

    fn list_dir(&self, remote_dir: &str) -> Result<Vec<String>> {
        let dir = self.resolve(remote_dir);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

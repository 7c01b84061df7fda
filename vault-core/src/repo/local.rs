use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::repo::{Repository, RepositoryConfig, RepositoryInfo};

/// Ordinary filesystem copy; the repository root is just a directory on
/// the machine running the engine.
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }
}

impl Repository for LocalRepository {
    fn exists(&self) -> Result<bool> {
        Ok(self.root.exists())
    }

    fn initialize(&self, _info: &RepositoryInfo) -> Result<()> {
        fs::create_dir_all(self.root.join("backup"))?;
        fs::create_dir_all(self.root.join("chunks"))?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    fn write_config(&self, config: &RepositoryConfig) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(config)
            .map_err(|e| crate::error::VaultError::Config(e.to_string()))?;
        fs::write(self.root.join("config.json"), bytes)?;
        Ok(())
    }

    fn read_config(&self) -> Result<RepositoryConfig> {
        let bytes = fs::read(self.root.join("config.json"))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| crate::error::VaultError::Config(e.to_string()))
    }

    fn upload_file(&self, local_path: &Path, remote_dir: &str) -> Result<()> {
        let dir = self.resolve(remote_dir);
        fs::create_dir_all(&dir)?;
        let file_name = local_path
            .file_name()
            .ok_or_else(|| crate::error::VaultError::InvalidInput("no file name".into()))?;
        fs::copy(local_path, dir.join(file_name))?;
        Ok(())
    }

    fn upload_directory(&self, local_dir: &Path, remote_dir: &str) -> Result<()> {
        let dest_root = self.resolve(remote_dir);
        for entry in walkdir::WalkDir::new(local_dir).follow_links(false) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let rel = entry.path().strip_prefix(local_dir).unwrap_or(entry.path());
            let dest = dest_root.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &dest)?;
            }
        }
        Ok(())
    }

    fn download_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.resolve(remote_path), local_path)?;
        Ok(())
    }

    fn download_directory(&self, remote_dir: &str, local_path: &Path) -> Result<()> {
        let src_root = self.resolve(remote_dir);
        if !src_root.exists() {
            return Ok(());
        }
        for entry in walkdir::WalkDir::new(&src_root).follow_links(false) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let rel = entry.path().strip_prefix(&src_root).unwrap_or(entry.path());
            let dest = local_path.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &dest)?;
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

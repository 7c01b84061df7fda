use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

use ssh2::Session;

use crate::error::{Result, VaultError};
use crate::repo::{Repository, RepositoryConfig, RepositoryInfo};

/// Credentials for the SSH session backing a [`RemoteRepository`]. Not part
/// of the repository password (§4.5's metadata encryption key) — this is
/// transport-level auth, deliberately kept separate since a metadata
/// password and an SSH login have no reason to be the same secret.
pub enum SshAuth {
    Password(String),
    KeyFile { private_key: std::path::PathBuf, passphrase: Option<String> },
}

/// `user@host:/path` repository backed by SFTP. Semantics mirror
/// [`crate::repo::local::LocalRepository`] one-for-one; only the transport
/// differs.
pub struct RemoteRepository {
    user: String,
    host: String,
    port: u16,
    remote_dir: String,
    name: String,
    auth: SshAuth,
}

impl RemoteRepository {
    pub fn new(
        user: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        remote_dir: impl Into<String>,
        name: impl Into<String>,
        auth: SshAuth,
    ) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port,
            remote_dir: remote_dir.into(),
            name: name.into(),
            auth,
        }
    }

    /// Parses `user@host:/path`, the wire form named in the spec's
    /// repository config for remote backends.
    pub fn parse_target(target: &str) -> Result<(String, String, String)> {
        let (user, rest) = target
            .split_once('@')
            .ok_or_else(|| VaultError::InvalidInput(format!("not user@host:/path: {target}")))?;
        let (host, path) = rest
            .split_once(':')
            .ok_or_else(|| VaultError::InvalidInput(format!("not user@host:/path: {target}")))?;
        Ok((user.to_string(), host.to_string(), path.to_string()))
    }

    fn root(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), self.name)
    }

    fn resolve(&self, rel: &str) -> String {
        format!("{}/{}", self.root(), rel.trim_start_matches('/'))
    }

    fn session(&self) -> Result<Session> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| VaultError::Io(e))?;
        let mut sess = Session::new().map_err(|e| VaultError::Config(e.to_string()))?;
        sess.set_tcp_stream(tcp);
        sess.handshake()
            .map_err(|e| VaultError::Config(format!("ssh handshake failed: {e}")))?;
        match &self.auth {
            SshAuth::Password(pw) => sess
                .userauth_password(&self.user, pw)
                .map_err(|e| VaultError::Config(format!("ssh auth failed: {e}")))?,
            SshAuth::KeyFile { private_key, passphrase } => sess
                .userauth_pubkey_file(
                    &self.user,
                    None,
                    private_key,
                    passphrase.as_deref(),
                )
                .map_err(|e| VaultError::Config(format!("ssh auth failed: {e}")))?,
        }
        Ok(sess)
    }

    fn mkdir_p(sftp: &ssh2::Sftp, path: &str) -> Result<()> {
        let mut built = String::new();
        for segment in path.trim_start_matches('/').split('/') {
            if segment.is_empty() {
                continue;
            }
            built.push('/');
            built.push_str(segment);
            match sftp.mkdir(Path::new(&built), 0o755) {
                Ok(()) => {}
                Err(e) if e.code() == ssh2::ErrorCode::SFTP(4) => {} // SSH_FX_FAILURE: already exists
                Err(e) => return Err(VaultError::Io(std::io::Error::other(e.to_string()))),
            }
        }
        Ok(())
    }

    fn buffered_copy_up(sftp: &ssh2::Sftp, local: &Path, remote: &str) -> Result<()> {
        let mut reader = std::fs::File::open(local)?;
        let mut writer = sftp
            .create(Path::new(remote))
            .map_err(|e| VaultError::Io(std::io::Error::other(e.to_string())))?;
        let mut buf = vec![0u8; 1024 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .map_err(|e| VaultError::Io(std::io::Error::other(e.to_string())))?;
        }
        Ok(())
    }

    fn buffered_copy_down(sftp: &ssh2::Sftp, remote: &str, local: &Path) -> Result<()> {
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut reader = sftp
            .open(Path::new(remote))
            .map_err(|e| VaultError::Io(std::io::Error::other(e.to_string())))?;
        let mut writer = std::fs::File::create(local)?;
        let mut buf = vec![0u8; 1024 * 1024];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| VaultError::Io(std::io::Error::other(e.to_string())))?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
        }
        Ok(())
    }
}

impl Repository for RemoteRepository {
    fn exists(&self) -> Result<bool> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        Ok(sftp.stat(Path::new(&self.root())).is_ok())
    }

    fn initialize(&self, _info: &RepositoryInfo) -> Result<()> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        Self::mkdir_p(&sftp, &format!("{}/backup", self.root()))?;
        Self::mkdir_p(&sftp, &format!("{}/chunks", self.root()))?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let root = self.root();
        delete_recursive(&sftp, &root)
    }

    fn write_config(&self, config: &RepositoryConfig) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(config)
            .map_err(|e| VaultError::Config(e.to_string()))?;
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let mut w = sftp
            .create(Path::new(&format!("{}/config.json", self.root())))
            .map_err(|e| VaultError::Io(std::io::Error::other(e.to_string())))?;
        w.write_all(&bytes)?;
        Ok(())
    }

    fn read_config(&self) -> Result<RepositoryConfig> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let mut r = sftp
            .open(Path::new(&format!("{}/config.json", self.root())))
            .map_err(|e| VaultError::Io(std::io::Error::other(e.to_string())))?;
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        serde_json::from_slice(&bytes).map_err(|e| VaultError::Config(e.to_string()))
    }

    fn upload_file(&self, local_path: &Path, remote_dir: &str) -> Result<()> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let dir = self.resolve(remote_dir);
        Self::mkdir_p(&sftp, &dir)?;
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultError::InvalidInput("no file name".into()))?;
        Self::buffered_copy_up(&sftp, local_path, &format!("{dir}/{file_name}"))
    }

    fn upload_directory(&self, local_dir: &Path, remote_dir: &str) -> Result<()> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let dest_root = self.resolve(remote_dir);
        for entry in walkdir::WalkDir::new(local_dir).follow_links(false) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let rel = entry
                .path()
                .strip_prefix(local_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let dest = format!("{dest_root}/{rel}");
            if entry.file_type().is_dir() {
                Self::mkdir_p(&sftp, &dest)?;
            } else if entry.file_type().is_file() {
                if let Some((parent, _)) = dest.rsplit_once('/') {
                    Self::mkdir_p(&sftp, parent)?;
                }
                Self::buffered_copy_up(&sftp, entry.path(), &dest)?;
            }
        }
        Ok(())
    }

    fn download_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        Self::buffered_copy_down(&sftp, &self.resolve(remote_path), local_path)
    }

    fn download_directory(&self, remote_dir: &str, local_path: &Path) -> Result<()> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let src_root = self.resolve(remote_dir);
        let Ok(listing) = sftp.readdir(Path::new(&src_root)) else {
            return Ok(());
        };
        for (path, stat) in listing {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let dest = local_path.join(name);
            if stat.is_dir() {
                std::fs::create_dir_all(&dest)?;
            } else {
                Self::buffered_copy_down(&sftp, &format!("{src_root}/{name}"), &dest)?;
            }
        }
        Ok(())
    }

    fn file_exists(&self, remote_path: &str) -> Result<bool> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        Ok(sftp.stat(Path::new(&self.resolve(remote_path))).is_ok())
    }

    fn list_dir(&self, remote_dir: &str) -> Result<Vec<String>> {
        let sess = self.session()?;
        let sftp = sess.sftp().map_err(|e| VaultError::Config(e.to_string()))?;
        let dir = self.resolve(remote_dir);
        let Ok(listing) = sftp.readdir(Path::new(&dir)) else {
            return Ok(Vec::new());
        };
        Ok(listing
            .into_iter()
            .filter_map(|(p, _)| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect())
    }
}

fn delete_recursive(sftp: &ssh2::Sftp, path: &str) -> Result<()> {
    let Ok(listing) = sftp.readdir(Path::new(path)) else {
        return Ok(());
    };
    for (entry_path, stat) in listing {
        let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let full = format!("{path}/{name}");
        if stat.is_dir() {
            delete_recursive(sftp, &full)?;
            let _ = sftp.rmdir(Path::new(&full));
        } else {
            let _ = sftp.unlink(Path::new(&full));
        }
    }
    let _ = sftp.rmdir(Path::new(path));
    Ok(())
}

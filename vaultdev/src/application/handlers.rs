use std::path::{Path, PathBuf};

use vault_core::engine::{BackupEngine, BackupOptions, BackupSummary, RestoreEngine, VerifyOutcome};
use vault_core::error::{Result, VaultError};
use vault_core::metadata::SnapshotType;
use vault_core::repo::local::LocalRepository;
use vault_core::repo::nfs::NfsRepository;
use vault_core::repo::remote::{RemoteRepository, SshAuth};
use vault_core::repo::{Repository, RepositoryConfig, RepositoryInfo, RepositoryType, iso8601_now};

use crate::presentation::cli::{RepoTypeArg, SnapshotKindArg};

/// Resolves a `--input-path`/`--output-path` argument to a concrete backend.
/// `user@host:/path` is treated as remote (SSH password from
/// `VAULT_SSH_PASSWORD`, falling back to an empty password for key-based
/// agents); everything else is a local filesystem path. For an existing
/// repository, `config.json` at that path settles whether it's really a
/// plain local directory or an NFS mount the spec's NFS backend owns.
fn open_existing(path: &Path) -> Result<Box<dyn Repository>> {
    let as_str = path.to_string_lossy();
    if let Ok((user, host, remote_dir)) = RemoteRepository::parse_target(&as_str) {
        let auth = SshAuth::Password(std::env::var("VAULT_SSH_PASSWORD").unwrap_or_default());
        let repo = RemoteRepository::new(user, host, 22, remote_dir, String::new(), auth);
        return Ok(Box::new(repo));
    }

    let local = LocalRepository::new(path.to_path_buf());
    match local.read_config() {
        Ok(cfg) if cfg.kind == RepositoryType::Nfs => Ok(Box::new(NfsRepository::new(
            path.to_path_buf(),
            String::new(),
            cfg.server_ip.unwrap_or_default(),
            cfg.server_backup_path.unwrap_or_default(),
        ))),
        _ => Ok(Box::new(local)),
    }
}

fn repo_info(repo: &dyn Repository, path: &Path, password: Option<String>) -> Result<RepositoryInfo> {
    let cfg = repo.read_config()?;
    Ok(RepositoryInfo {
        name: cfg.name,
        path: path.to_string_lossy().to_string(),
        kind: cfg.kind,
        password: password.unwrap_or_default(),
    })
}

pub fn handle_init(
    output_path: PathBuf,
    kind: RepoTypeArg,
    password: Option<String>,
    server_ip: Option<String>,
    server_backup_path: Option<String>,
) -> Result<()> {
    let repo_kind = match kind {
        RepoTypeArg::Local => RepositoryType::Local,
        RepoTypeArg::Nfs => RepositoryType::Nfs,
        RepoTypeArg::Remote => RepositoryType::Remote,
    };

    let repo: Box<dyn Repository> = match repo_kind {
        RepositoryType::Local => Box::new(LocalRepository::new(output_path.clone())),
        RepositoryType::Nfs => Box::new(NfsRepository::new(
            output_path.clone(),
            String::new(),
            server_ip.clone().unwrap_or_default(),
            server_backup_path.clone().unwrap_or_default(),
        )),
        RepositoryType::Remote => {
            let as_str = output_path.to_string_lossy();
            let (user, host, remote_dir) = RemoteRepository::parse_target(&as_str)?;
            let auth = SshAuth::Password(std::env::var("VAULT_SSH_PASSWORD").unwrap_or_default());
            Box::new(RemoteRepository::new(user, host, 22, remote_dir, String::new(), auth))
        }
    };

    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let info = RepositoryInfo {
        name: name.clone(),
        path: output_path.to_string_lossy().to_string(),
        kind: repo_kind,
        password: password.clone().unwrap_or_default(),
    };

    repo.initialize(&info)?;
    repo.write_config(&RepositoryConfig {
        name,
        kind: repo_kind,
        path: info.path.clone(),
        created_at: iso8601_now(),
        password_hash: info.hashed_password(),
        server_ip,
        server_backup_path,
    })?;

    eprintln!("init: created {} repository at {}", repo_kind.as_str(), output_path.display());
    Ok(())
}

pub fn handle_backup(
    input_path: PathBuf,
    output_path: PathBuf,
    kind: SnapshotKindArg,
    remarks: String,
    average_size: usize,
    password: Option<String>,
) -> Result<()> {
    let repo = open_existing(&output_path)?;
    let info = repo_info(repo.as_ref(), &output_path, password)?;
    let engine = BackupEngine::new(repo.as_ref(), info)?;

    let snapshot_kind = match kind {
        SnapshotKindArg::Full => SnapshotType::Full,
        SnapshotKindArg::Incremental => SnapshotType::Incremental,
        SnapshotKindArg::Differential => SnapshotType::Differential,
    };

    let opts = BackupOptions {
        source: input_path,
        kind: snapshot_kind,
        remarks,
        average_chunk_size: average_size,
    };

    let BackupSummary { snapshot_name, changed, unchanged, added, deleted } = engine.run(&opts)?;
    eprintln!(
        "backup: {snapshot_name} (added={added} changed={changed} unchanged={unchanged} deleted={deleted})"
    );
    Ok(())
}

pub fn handle_restore(
    input_path: PathBuf,
    output_path: PathBuf,
    backup_name: String,
    password: Option<String>,
) -> Result<()> {
    let repo = open_existing(&input_path)?;
    let engine = RestoreEngine::new(repo.as_ref(), password.unwrap_or_default())?;
    let snapshot = engine.load(&backup_name)?;
    std::fs::create_dir_all(&output_path)?;
    let failures = engine.restore_all(&snapshot, &output_path);

    for failure in &failures {
        eprintln!("restore: failed {} ({})", failure.path, failure.error);
    }
    eprintln!(
        "restore: {} of {} files restored into {}",
        snapshot.files.len() - failures.len(),
        snapshot.files.len(),
        output_path.display()
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(VaultError::InvalidInput(format!("{} file(s) failed to restore", failures.len())))
    }
}

pub fn handle_list(input_path: PathBuf, _password: Option<String>) -> Result<()> {
    let repo = open_existing(&input_path)?;
    for name in vault_core::engine::list_snapshots(repo.as_ref())? {
        println!("{name}");
    }
    Ok(())
}

pub fn handle_compare(
    input_path: PathBuf,
    snap1: String,
    snap2: String,
    password: Option<String>,
) -> Result<()> {
    let repo = open_existing(&input_path)?;
    let engine = RestoreEngine::new(repo.as_ref(), password.unwrap_or_default())?;
    let a = engine.load(&snap1)?;
    let b = engine.load(&snap2)?;
    let summary = engine.compare(&a, &b);
    println!(
        "added={} unchanged={} changed={} deleted={}",
        summary.added, summary.unchanged, summary.changed, summary.deleted
    );
    Ok(())
}

pub fn handle_verify(
    input_path: PathBuf,
    backup_name: String,
    password: Option<String>,
) -> Result<()> {
    let repo = open_existing(&input_path)?;
    let engine = RestoreEngine::new(repo.as_ref(), password.unwrap_or_default())?;
    let snapshot = engine.load(&backup_name)?;

    let mut success = 0u64;
    let mut corrupt = 0u64;
    let mut failed = 0u64;
    for (path, outcome) in engine.verify_all(&snapshot) {
        match outcome {
            VerifyOutcome::Success => success += 1,
            VerifyOutcome::Corrupt => {
                corrupt += 1;
                eprintln!("verify: CORRUPT {path}");
            }
            VerifyOutcome::Failed => {
                failed += 1;
                eprintln!("verify: FAILED {path}");
            }
        }
    }
    eprintln!("verify: {success} ok, {corrupt} corrupt, {failed} failed");

    if corrupt == 0 && failed == 0 {
        Ok(())
    } else {
        Err(VaultError::IntegrityMismatch { path: backup_name })
    }
}

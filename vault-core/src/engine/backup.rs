//! Snapshot engine: walks a source tree, diffs it against a baseline, drives
//! the chunker/codec/store for anything changed, and writes a snapshot
//! metadata document last so a crash mid-backup never corrupts an existing
//! snapshot (only ever leaves orphan chunks, which garbage collection is
//! explicitly out of scope for).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::chunking::{FastCdcParams, StreamingChunker};
use crate::error::{Result, VaultError};
use crate::hash::sha256_stream;
use crate::metadata::{FileEntry, Snapshot, SnapshotType};
use crate::repo::{Repository, RepositoryInfo};
use crate::store::{store_chunk, ChunkStore};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub struct BackupOptions {
    pub source: PathBuf,
    pub kind: SnapshotType,
    pub remarks: String,
    pub average_chunk_size: usize,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            kind: SnapshotType::Full,
            remarks: String::new(),
            average_chunk_size: 1024 * 1024,
        }
    }
}

/// How often `run` emits a `tracing::info!` progress line while backing up
/// changed/new files, mirroring the periodic reporting in
/// `original_source/include/backup/progress.hpp`.
const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub snapshot_name: String,
    pub changed: u64,
    pub unchanged: u64,
    pub added: u64,
    pub deleted: u64,
}

/// Owns the engine's scoped temp directory for the lifetime of one backup
/// operation; dropped (and thus removed) unconditionally on success or
/// failure.
pub struct BackupEngine<'a> {
    repo: &'a dyn Repository,
    info: RepositoryInfo,
    temp: TempDir,
}

fn octal_permissions(meta: &fs::Metadata) -> String {
    #[cfg(unix)]
    {
        format!("{:04o}", meta.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        "0644".to_string()
    }
}

/// Snapshot keys are portable: the source-relative path with a leading `/`,
/// e.g. backing up `/home/alice/proj` yields `/src/a.txt` for
/// `/home/alice/proj/src/a.txt` — never the absolute on-disk path, so a
/// later incremental against a differently-located copy of the same tree
/// still diffs against the right baseline entries.
fn path_key_for(source: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(source).unwrap_or(path);
    format!("/{}", rel.to_string_lossy().replace('\\', "/"))
}

fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A cheap description of what's on disk right now, used only to feed
/// `FileEntry::has_changed` — chunk hashes and the whole-file checksum are
/// filled in only when a file is actually (re)backed up.
fn describe_on_disk(path: &Path) -> Result<FileEntry> {
    let meta = fs::symlink_metadata(path)?;
    let is_symlink = meta.file_type().is_symlink();
    let symlink_target = if is_symlink {
        Some(fs::read_link(path)?.to_string_lossy().to_string())
    } else {
        None
    };
    let total_size = if is_symlink { 0 } else { meta.len() };
    Ok(FileEntry {
        original_filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        chunk_hashes: Vec::new(),
        total_size,
        mtime: mtime_secs(&meta),
        is_symlink,
        symlink_target,
        permissions: octal_permissions(&meta),
        sha256_checksum: String::new(),
    })
}

impl<'a> BackupEngine<'a> {
    pub fn new(repo: &'a dyn Repository, info: RepositoryInfo) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("vault-backup-")
            .tempdir()?;
        fs::create_dir_all(temp.path().join("backup"))?;
        fs::create_dir_all(temp.path().join("chunks"))?;
        repo.download_directory("backup", &temp.path().join("backup"))?;
        Ok(Self { repo, info, temp })
    }

    fn local_snapshot_path(&self, name: &str) -> PathBuf {
        self.temp.path().join("backup").join(name)
    }

    fn load_local_snapshot(&self, name: &str) -> Result<Snapshot> {
        let bytes = fs::read(self.local_snapshot_path(name))
            .map_err(|_| VaultError::NoBaseline)?;
        Snapshot::decode(&bytes, &self.info.password)
    }

    fn select_baseline(&self, kind: SnapshotType) -> Result<String> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.temp.path().join("backup"))? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));

        match kind {
            SnapshotType::Incremental => names.into_iter().next().ok_or(VaultError::NoBaseline),
            SnapshotType::Differential => {
                for name in names {
                    if let Ok(snap) = self.load_local_snapshot(&name) {
                        if snap.kind == SnapshotType::Full {
                            return Ok(name);
                        }
                    }
                }
                Err(VaultError::NoBaseline)
            }
            SnapshotType::Full => unreachable!("FULL backups have no baseline"),
        }
    }

    /// Chunks, compresses, stores and hashes one regular file, or records a
    /// symlink entry directly (symlinks are never chunked).
    fn backup_one(&self, path: &Path, store: &ChunkStore<'_>, avg_chunk: usize) -> Result<FileEntry> {
        let meta = fs::symlink_metadata(path)?;
        let is_symlink = meta.file_type().is_symlink();
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let permissions = octal_permissions(&meta);
        let mtime = mtime_secs(&meta);

        if is_symlink {
            let target = fs::read_link(path)?.to_string_lossy().to_string();
            return Ok(FileEntry {
                original_filename,
                chunk_hashes: Vec::new(),
                total_size: 0,
                mtime,
                is_symlink: true,
                symlink_target: Some(target),
                permissions,
                sha256_checksum: String::new(),
            });
        }

        let sha256_checksum = sha256_stream(fs::File::open(path)?)?;

        let params = FastCdcParams::with_average(avg_chunk);
        let mut chunker = StreamingChunker::new(params);
        let mut f = fs::File::open(path)?;
        let mut buf = Vec::with_capacity(params.normal);
        let mut chunk_hashes = Vec::new();
        loop {
            let n = chunker.next_chunk(&mut f, &mut buf)?;
            if n == 0 {
                break;
            }
            let (hash, _created) = store_chunk(store, &buf[..n])?;
            chunk_hashes.push(hash);
        }

        Ok(FileEntry {
            original_filename,
            chunk_hashes,
            total_size: meta.len(),
            mtime,
            is_symlink: false,
            symlink_target: None,
            permissions,
            sha256_checksum,
        })
    }

    pub fn run(&self, opts: &BackupOptions) -> Result<BackupSummary> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| VaultError::Config(e.to_string()))?
            .as_secs() as i64;

        let mut snapshot = Snapshot::new(opts.kind, now, opts.remarks.clone(), String::new());

        if opts.kind != SnapshotType::Full {
            let baseline_name = self.select_baseline(opts.kind)?;
            let baseline = self.load_local_snapshot(&baseline_name)?;
            snapshot.previous_backup = baseline_name;
            snapshot.files = baseline.files;
        }

        let store = ChunkStore::new(self.repo, self.temp.path().join("chunks"));

        let mut changed = 0u64;
        let mut unchanged = 0u64;
        let mut added = 0u64;
        let mut to_backup: Vec<(String, PathBuf)> = Vec::new();

        for entry in WalkDir::new(&opts.source).follow_links(false) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            let ft = entry.file_type();
            if !(ft.is_file() || ft.is_symlink()) {
                continue;
            }
            let path_key = path_key_for(&opts.source, entry.path());
            match snapshot.files.get(&path_key) {
                None => to_backup.push((path_key, entry.path().to_path_buf())),
                Some(prev) => {
                    let on_disk = describe_on_disk(entry.path())?;
                    if prev.has_changed(&on_disk) {
                        to_backup.push((path_key, entry.path().to_path_buf()));
                    } else {
                        unchanged += 1;
                    }
                }
            }
        }

        let total_to_backup = to_backup.len();
        for (processed, (path_key, path)) in to_backup.into_iter().enumerate() {
            let was_present = snapshot.files.contains_key(&path_key);
            match self.backup_one(&path, &store, opts.average_chunk_size) {
                Ok(fe) => {
                    snapshot.files.insert(path_key, fe);
                    if was_present {
                        changed += 1;
                    } else {
                        added += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping file during backup");
                }
            }

            if (processed + 1) % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    processed = processed + 1,
                    total = total_to_backup,
                    "backup in progress"
                );
            }
        }

        let mut deleted = 0u64;
        let stale: Vec<String> = snapshot
            .files
            .keys()
            .filter(|key| {
                let stripped = key.strip_prefix('/').unwrap_or(key);
                fs::symlink_metadata(opts.source.join(stripped)).is_err()
            })
            .cloned()
            .collect();
        for key in stale {
            snapshot.files.remove(&key);
            deleted += 1;
        }

        let name = Snapshot::name_for(now);
        self.save_metadata(&name, &snapshot)?;

        tracing::info!(
            snapshot = %name,
            changed,
            unchanged,
            added,
            deleted,
            "backup complete"
        );

        Ok(BackupSummary {
            snapshot_name: name,
            changed,
            unchanged,
            added,
            deleted,
        })
    }

    /// Serialises and (if a password is set) encrypts the snapshot, writes
    /// it into the local temp tree, then uploads that single file last —
    /// every chunk it references is already on the repository by this
    /// point.
    fn save_metadata(&self, name: &str, snapshot: &Snapshot) -> Result<()> {
        let encoded = snapshot.encode(&self.info.password)?;
        let local_path = self.local_snapshot_path(name);
        fs::write(&local_path, &encoded)?;
        self.repo.upload_file(&local_path, "backup")
    }
}

use std::fs;
use std::os::unix::fs::symlink;

use tempfile::tempdir;

use vault_core::engine::{BackupEngine, BackupOptions, RestoreEngine, VerifyOutcome};
use vault_core::metadata::SnapshotType;
use vault_core::repo::local::LocalRepository;
use vault_core::repo::{Repository, RepositoryInfo, RepositoryType};

fn new_repo(root: &std::path::Path) -> (LocalRepository, RepositoryInfo) {
    let repo = LocalRepository::new(root.to_path_buf());
    let info = RepositoryInfo {
        name: "repo".into(),
        path: root.to_string_lossy().to_string(),
        kind: RepositoryType::Local,
        password: String::new(),
    };
    repo.initialize(&info).unwrap();
    (repo, info)
}

fn write_tree_a(source: &std::path::Path) {
    fs::create_dir_all(source.join("src/sub")).unwrap();
    fs::write(source.join("src/a.txt"), b"hello\n").unwrap();
    fs::write(source.join("src/sub/b.bin"), vec![0u8; 4096]).unwrap();
    symlink("a.txt", source.join("src/link")).unwrap();
}

#[test]
fn scenario_a_full_backup_and_restore() {
    let source_dir = tempdir().unwrap();
    let repo_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    write_tree_a(source_dir.path());

    let (repo, info) = new_repo(repo_dir.path());
    let engine = BackupEngine::new(&repo, info.clone()).unwrap();
    let summary = engine
        .run(&BackupOptions {
            source: source_dir.path().to_path_buf(),
            kind: SnapshotType::Full,
            remarks: "initial".into(),
            average_chunk_size: 1024 * 1024,
        })
        .unwrap();
    assert_eq!(summary.added, 3);
    assert_eq!(summary.deleted, 0);

    let restore = RestoreEngine::new(&repo, info.password.clone()).unwrap();
    let snapshot = restore.load(&summary.snapshot_name).unwrap();
    assert_eq!(snapshot.files.len(), 3);

    let a = snapshot.files.get("/src/a.txt").unwrap();
    assert_eq!(a.total_size, 6);
    assert_eq!(
        a.sha256_checksum,
        "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
    );
    assert_eq!(a.chunk_hashes.len(), 1);

    let b = snapshot.files.get("/src/sub/b.bin").unwrap();
    assert_eq!(b.total_size, 4096);
    assert_eq!(b.chunk_hashes.len(), 1);

    let link = snapshot.files.get("/src/link").unwrap();
    assert!(link.is_symlink);
    assert_eq!(link.symlink_target.as_deref(), Some("a.txt"));
    assert_eq!(link.total_size, 0);
    assert!(link.chunk_hashes.is_empty());

    let failures = restore.restore_all(&snapshot, out_dir.path());
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    assert_eq!(fs::read(out_dir.path().join("src/a.txt")).unwrap(), b"hello\n");
    assert_eq!(
        fs::read(out_dir.path().join("src/sub/b.bin")).unwrap(),
        vec![0u8; 4096]
    );
    let restored_link = out_dir.path().join("src/link");
    assert!(fs::symlink_metadata(&restored_link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&restored_link).unwrap(), std::path::Path::new("a.txt"));

    for outcome in restore.verify_all(&snapshot).into_iter().map(|(_, o)| o) {
        assert_eq!(outcome, VerifyOutcome::Success);
    }
}

#[test]
fn scenario_b_dedup() {
    let source_dir = tempdir().unwrap();
    let repo_dir = tempdir().unwrap();
    fs::create_dir_all(source_dir.path().join("src")).unwrap();
    let pattern = vec![0xABu8; 1024 * 1024];
    fs::write(source_dir.path().join("src/one.bin"), &pattern).unwrap();
    fs::write(source_dir.path().join("src/two.bin"), &pattern).unwrap();

    let (repo, info) = new_repo(repo_dir.path());
    let engine = BackupEngine::new(&repo, info).unwrap();
    let summary = engine
        .run(&BackupOptions {
            source: source_dir.path().to_path_buf(),
            kind: SnapshotType::Full,
            remarks: String::new(),
            average_chunk_size: 1024 * 1024,
        })
        .unwrap();
    assert_eq!(summary.added, 2);

    let mut chunk_files = Vec::new();
    for hh in fs::read_dir(repo_dir.path().join("chunks")).unwrap() {
        let hh = hh.unwrap();
        for f in fs::read_dir(hh.path()).unwrap() {
            chunk_files.push(f.unwrap().path());
        }
    }
    assert_eq!(chunk_files.len(), 1, "expected a single deduplicated chunk, got {chunk_files:?}");
}

#[test]
fn scenario_c_and_d_incremental_and_compare() {
    let source_dir = tempdir().unwrap();
    let repo_dir = tempdir().unwrap();
    write_tree_a(source_dir.path());

    let (repo, info) = new_repo(repo_dir.path());
    let engine = BackupEngine::new(&repo, info.clone()).unwrap();
    let full = engine
        .run(&BackupOptions {
            source: source_dir.path().to_path_buf(),
            kind: SnapshotType::Full,
            remarks: String::new(),
            average_chunk_size: 1024 * 1024,
        })
        .unwrap();

    std::thread::sleep(std::time::Duration::from_secs(1));
    let mut a_contents = fs::read(source_dir.path().join("src/a.txt")).unwrap();
    a_contents.extend_from_slice(b"!\n");
    fs::write(source_dir.path().join("src/a.txt"), &a_contents).unwrap();
    fs::remove_file(source_dir.path().join("src/sub/b.bin")).unwrap();
    fs::write(source_dir.path().join("src/c.txt"), b"new\n").unwrap();

    let engine2 = BackupEngine::new(&repo, info.clone()).unwrap();
    let incremental = engine2
        .run(&BackupOptions {
            source: source_dir.path().to_path_buf(),
            kind: SnapshotType::Incremental,
            remarks: String::new(),
            average_chunk_size: 1024 * 1024,
        })
        .unwrap();

    assert_eq!(incremental.changed, 1);
    assert_eq!(incremental.unchanged, 1);
    assert_eq!(incremental.added, 1);
    assert_eq!(incremental.deleted, 1);

    let restore = RestoreEngine::new(&repo, info.password.clone()).unwrap();
    let snap_full = restore.load(&full.snapshot_name).unwrap();
    let snap_incr = restore.load(&incremental.snapshot_name).unwrap();
    assert_eq!(snap_incr.previous_backup, full.snapshot_name);
    assert!(!snap_incr.files.contains_key("/src/sub/b.bin"));
    assert!(snap_incr.files.contains_key("/src/c.txt"));
    assert_eq!(
        snap_incr.files.get("/src/link").unwrap().symlink_target,
        snap_full.files.get("/src/link").unwrap().symlink_target
    );

    let summary = restore.compare(&snap_full, &snap_incr);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.deleted, 1);
}

#[test]
fn scenario_e_wrong_password_is_rejected() {
    let source_dir = tempdir().unwrap();
    let repo_dir = tempdir().unwrap();
    write_tree_a(source_dir.path());

    let repo = LocalRepository::new(repo_dir.path().to_path_buf());
    let info = RepositoryInfo {
        name: "repo".into(),
        path: repo_dir.path().to_string_lossy().to_string(),
        kind: RepositoryType::Local,
        password: "p1".into(),
    };
    repo.initialize(&info).unwrap();

    let engine = BackupEngine::new(&repo, info.clone()).unwrap();
    let summary = engine
        .run(&BackupOptions {
            source: source_dir.path().to_path_buf(),
            kind: SnapshotType::Full,
            remarks: String::new(),
            average_chunk_size: 1024 * 1024,
        })
        .unwrap();

    let restore = RestoreEngine::new(&repo, "p2".into()).unwrap();
    let err = restore.load(&summary.snapshot_name).unwrap_err();
    assert!(matches!(err, vault_core::error::VaultError::MetadataCorrupt(_)));

    let restore_ok = RestoreEngine::new(&repo, "p1".into()).unwrap();
    assert!(restore_ok.load(&summary.snapshot_name).is_ok());
}

#[test]
fn scenario_f_missing_chunk_is_failed_not_fatal() {
    let source_dir = tempdir().unwrap();
    let repo_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    write_tree_a(source_dir.path());
    fs::write(source_dir.path().join("src/untouched.txt"), b"still here\n").unwrap();

    let (repo, info) = new_repo(repo_dir.path());
    let engine = BackupEngine::new(&repo, info.clone()).unwrap();
    let summary = engine
        .run(&BackupOptions {
            source: source_dir.path().to_path_buf(),
            kind: SnapshotType::Full,
            remarks: String::new(),
            average_chunk_size: 1024 * 1024,
        })
        .unwrap();

    let restore = RestoreEngine::new(&repo, info.password.clone()).unwrap();
    let snapshot = restore.load(&summary.snapshot_name).unwrap();
    let a_hash = snapshot.files.get("/src/a.txt").unwrap().chunk_hashes[0].clone();
    let hh = &a_hash[..2];
    fs::remove_file(repo_dir.path().join("chunks").join(hh).join(format!("{a_hash}.chunk"))).unwrap();

    let failures = restore.restore_all(&snapshot, out_dir.path());
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, "/src/a.txt");
    assert!(fs::read(out_dir.path().join("src/untouched.txt")).is_ok());

    let outcomes: std::collections::HashMap<_, _> = restore.verify_all(&snapshot).into_iter().collect();
    assert_eq!(outcomes["/src/a.txt"], VerifyOutcome::Failed);
    assert_eq!(outcomes["/src/untouched.txt"], VerifyOutcome::Success);
}

#![forbid(unsafe_code)]

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod hash;

pub mod chunking;
pub mod codec;
pub mod crypto;
pub mod metadata;
pub mod repo;
pub mod store;

pub mod engine;

pub mod util;

pub use crate::error::{Result, VaultError};

pub mod prelude {
    pub use crate::engine::{
        BackupEngine, BackupOptions, BackupSummary, CompareSummary, RestoreEngine,
        RestoreFailure, VerifyOutcome, get_latest_full, list_snapshots,
    };
    pub use crate::error::{Result, VaultError};
    pub use crate::metadata::{FileEntry, Snapshot, SnapshotType};
    pub use crate::repo::{Repository, RepositoryConfig, RepositoryInfo, RepositoryType};
}

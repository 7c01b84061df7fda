pub mod backup;
pub mod discovery;
pub mod restore;

pub use backup::{BackupEngine, BackupOptions, BackupSummary};
pub use discovery::{get_latest_full, list_snapshots};
pub use restore::{CompareSummary, RestoreEngine, RestoreFailure, VerifyOutcome};

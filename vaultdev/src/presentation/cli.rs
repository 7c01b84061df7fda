use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "vaultdev CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SnapshotKindArg {
    Full,
    Incremental,
    Differential,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RepoTypeArg {
    Local,
    Nfs,
    Remote,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Back up a source tree into a repository
    Backup {
        #[arg(long = "input-path")]
        input_path: PathBuf,
        #[arg(long = "output-path")]
        output_path: PathBuf,
        #[arg(long = "type", value_enum, default_value_t = SnapshotKindArg::Full)]
        kind: SnapshotKindArg,
        #[arg(long, default_value = "")]
        remarks: String,
        #[arg(long = "average-size", default_value_t = 1024 * 1024)]
        average_size: usize,
        #[arg(long)]
        password: Option<String>,
    },

    /// Restore a snapshot from a repository
    Restore {
        #[arg(long = "input-path")]
        input_path: PathBuf,
        #[arg(long = "output-path")]
        output_path: PathBuf,
        #[arg(long = "backup-name")]
        backup_name: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// List snapshots in a repository
    List {
        #[arg(long = "input-path")]
        input_path: PathBuf,
        #[arg(long)]
        password: Option<String>,
    },

    /// Compare two snapshots
    Compare {
        #[arg(long = "input-path")]
        input_path: PathBuf,
        snap1: String,
        snap2: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Verify the integrity of a snapshot
    Verify {
        #[arg(long = "input-path")]
        input_path: PathBuf,
        #[arg(long = "backup-name")]
        backup_name: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Create a new, empty repository
    Init {
        #[arg(long = "output-path")]
        output_path: PathBuf,
        #[arg(long = "type", value_enum)]
        kind: RepoTypeArg,
        #[arg(long)]
        password: Option<String>,
        /// remote/nfs server address (required for --type remote, e.g. user@host)
        #[arg(long = "server-ip")]
        server_ip: Option<String>,
        /// remote/nfs backup path on the server
        #[arg(long = "server-backup-path")]
        server_backup_path: Option<String>,
    },
}

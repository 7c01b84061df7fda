pub mod handlers;

use clap::Parser;
use vault_core::error::Result;

use crate::presentation::cli::{Cli, Commands};

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Backup {
            input_path,
            output_path,
            kind,
            remarks,
            average_size,
            password,
        } => handlers::handle_backup(input_path, output_path, kind, remarks, average_size, password),

        Commands::Restore {
            input_path,
            output_path,
            backup_name,
            password,
        } => handlers::handle_restore(input_path, output_path, backup_name, password),

        Commands::List { input_path, password } => handlers::handle_list(input_path, password),

        Commands::Compare {
            input_path,
            snap1,
            snap2,
            password,
        } => handlers::handle_compare(input_path, snap1, snap2, password),

        Commands::Verify {
            input_path,
            backup_name,
            password,
        } => handlers::handle_verify(input_path, backup_name, password),

        Commands::Init {
            output_path,
            kind,
            password,
            server_ip,
            server_backup_path,
        } => handlers::handle_init(output_path, kind, password, server_ip, server_backup_path),
    }
}

//! # portstock CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Port consumables inventory: operator tools.
///
/// Applies database migrations, recovers accounts, and reads the stock
/// position without going through the web application.
#[derive(Parser, Debug)]
#[command(name = "portstock", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate(portstock_cli::db::MigrateArgs),
    /// Create accounts and reset passwords.
    User(portstock_cli::user::UserArgs),
    /// Print the stored form of a password.
    HashPassword(portstock_cli::password::HashPasswordArgs),
    /// Stock on hand per terminal.
    Stock(portstock_cli::stock::StockArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate(args) => portstock_cli::db::run_migrate(args).await,
        Commands::User(args) => portstock_cli::user::run(args).await,
        Commands::HashPassword(args) => portstock_cli::password::run(args),
        Commands::Stock(args) => portstock_cli::stock::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use portstock_core::Role;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn user_add_parses_role() {
        let cli = Cli::try_parse_from([
            "portstock",
            "user",
            "add",
            "--database-url",
            "postgres://localhost/portstock",
            "--username",
            "store1",
            "--full-name",
            "Store Keeper",
            "--role",
            "storekeeper",
        ])
        .unwrap();
        match cli.command {
            Commands::User(portstock_cli::user::UserArgs {
                command: portstock_cli::user::UserCommand::Add(args),
            }) => {
                assert_eq!(args.role, Role::Storekeeper);
                assert_eq!(args.iterations, 100_000);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = Cli::try_parse_from([
            "portstock",
            "user",
            "add",
            "--database-url",
            "postgres://localhost/portstock",
            "--username",
            "store1",
            "--full-name",
            "Store Keeper",
            "--role",
            "owner",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn low_iteration_counts_are_rejected() {
        assert!(Cli::try_parse_from([
            "portstock",
            "hash-password",
            "secret-pass",
            "--iterations",
            "10",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["portstock", "hash-password", "secret-pass"]).is_ok());
    }

    #[test]
    fn stock_flags() {
        let cli = Cli::try_parse_from([
            "portstock",
            "stock",
            "--database-url",
            "postgres://localhost/portstock",
            "--low",
            "--category",
            "toner",
        ])
        .unwrap();
        let Commands::Stock(args) = cli.command else {
            panic!("expected stock");
        };
        let filter = args.filter();
        assert!(filter.low_only);
        assert_eq!(filter.category, Some(portstock_core::Category::Toner));
        assert!(!filter.include_inactive);
    }
}

//! # Database Connection and `migrate`

use anyhow::Context;
use clap::Args;
use sqlx::PgPool;

/// Connection settings shared by every subcommand that touches Postgres.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,
}

impl DatabaseArgs {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        portstock_api::db::connect(&self.database_url)
            .await
            .context("failed to connect to the database")
    }
}

/// Arguments for the migrate subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,
}

pub async fn run_migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let pool = args.db.connect().await?;
    portstock_api::db::migrate(&pool)
        .await
        .context("migration failed")?;
    println!("migrations applied");
    Ok(())
}

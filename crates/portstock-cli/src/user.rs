//! # user Subcommand
//!
//! Account creation and password recovery without a signed-in administrator.
//! The running server keeps users in memory; restart it to pick up changes.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Subcommand};
use portstock_core::{Role, UserId, UserRecord, Username};

use crate::db::DatabaseArgs;
use crate::password::given_or_generated;

/// Arguments for the user subcommand.
#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create an account.
    Add(AddUserArgs),
    /// Set a new password on an existing account.
    ResetPassword(ResetPasswordArgs),
}

#[derive(Args, Debug)]
pub struct AddUserArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Login name (3-32 characters of a-z, 0-9, `.`, `_`, `-`).
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub full_name: String,

    /// viewer, storekeeper or admin.
    #[arg(long, default_value = "viewer", value_parser = parse_role)]
    pub role: Role,

    /// Generated and printed when omitted.
    #[arg(long, env = "PORTSTOCK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// PBKDF2 rounds.
    #[arg(long, default_value_t = 100_000, value_parser = clap::value_parser!(u32).range(1_000..))]
    pub iterations: u32,
}

#[derive(Args, Debug)]
pub struct ResetPasswordArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,

    #[arg(long)]
    pub username: String,

    /// Generated and printed when omitted.
    #[arg(long, env = "PORTSTOCK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Also reactivate a deactivated account.
    #[arg(long)]
    pub activate: bool,

    #[arg(long, default_value_t = 100_000, value_parser = clap::value_parser!(u32).range(1_000..))]
    pub iterations: u32,
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

pub async fn run(args: UserArgs) -> anyhow::Result<()> {
    match args.command {
        UserCommand::Add(args) => add(args).await,
        UserCommand::ResetPassword(args) => reset_password(args).await,
    }
}

async fn add(args: AddUserArgs) -> anyhow::Result<()> {
    let username = Username::new(&args.username).context("invalid username")?;
    let full_name = portstock_core::sanitize::clean_text("full name", &args.full_name, 120)
        .context("invalid full name")?;
    let (password, generated) = given_or_generated(args.password)?;

    let pool = args.db.connect().await?;
    if portstock_api::db::users::find_by_username(&pool, &username)
        .await?
        .is_some()
    {
        bail!("user {username} already exists");
    }

    let now = Utc::now();
    let user = UserRecord {
        id: UserId::new(),
        username,
        full_name,
        role: args.role,
        password_hash: portstock_api::auth::hash_password(&password, args.iterations),
        active: true,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };
    portstock_api::db::users::insert(&pool, &user)
        .await
        .context("failed to insert user")?;
    tracing::info!(username = %user.username, role = user.role.as_str(), "user created from CLI");

    println!("created {} ({})", user.username, user.role.label());
    if generated {
        println!("password: {password}");
    }
    Ok(())
}

async fn reset_password(args: ResetPasswordArgs) -> anyhow::Result<()> {
    let username = Username::new(&args.username).context("invalid username")?;
    let (password, generated) = given_or_generated(args.password)?;

    let pool = args.db.connect().await?;
    let Some(mut user) = portstock_api::db::users::find_by_username(&pool, &username).await? else {
        bail!("no user named {username}");
    };

    let now = Utc::now();
    let hash = portstock_api::auth::hash_password(&password, args.iterations);
    portstock_api::db::users::update_password(&pool, user.id, &hash, now).await?;
    if args.activate && !user.active {
        user.active = true;
        user.updated_at = now;
        portstock_api::db::users::update_profile(&pool, &user).await?;
    }
    tracing::info!(username = %user.username, "password reset from CLI");

    println!("password reset for {}", user.username);
    if !user.active {
        println!("note: the account is deactivated; pass --activate to enable it");
    }
    if generated {
        println!("password: {password}");
    }
    Ok(())
}

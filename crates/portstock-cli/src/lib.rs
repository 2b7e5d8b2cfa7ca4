//! # portstock-cli — Operator Command-Line Interface
//!
//! Maintenance tasks that must work when the web application cannot be
//! signed into: applying migrations, creating or recovering accounts, and
//! reading the stock position directly from the database.
//!
//! ## Subcommands
//!
//! - `migrate` — Apply the embedded schema migrations
//! - `user add` / `user reset-password` — Account recovery
//! - `hash-password` — Print a password hash for manual seeding
//! - `stock` — Stock on hand per terminal
//!
//! Argument parsing lives in each module next to its handler; persistence
//! goes through `portstock_api::db` so the CLI and the server write the
//! same rows.

pub mod db;
pub mod password;
pub mod stock;
pub mod user;

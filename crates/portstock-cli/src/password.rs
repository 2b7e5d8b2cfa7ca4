//! # hash-password Subcommand
//!
//! Prints a stored-format password hash, for seeding an account by hand.

use anyhow::Context;
use clap::Args;
use portstock_core::validate_password;

/// Arguments for the hash-password subcommand.
#[derive(Args, Debug)]
pub struct HashPasswordArgs {
    /// Password to hash.
    #[arg(env = "PORTSTOCK_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// PBKDF2 rounds.
    #[arg(long, default_value_t = 100_000, value_parser = clap::value_parser!(u32).range(1_000..))]
    pub iterations: u32,
}

pub fn run(args: HashPasswordArgs) -> anyhow::Result<()> {
    validate_password(&args.password).context("password rejected")?;
    println!(
        "{}",
        portstock_api::auth::hash_password(&args.password, args.iterations)
    );
    Ok(())
}

/// Use the given password or generate one. The flag says whether it was generated.
pub(crate) fn given_or_generated(password: Option<String>) -> anyhow::Result<(String, bool)> {
    match password {
        Some(p) => {
            validate_password(&p).context("password rejected")?;
            Ok((p, false))
        }
        None => Ok((portstock_api::auth::random_token()[..20].to_string(), true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_are_long_enough() {
        let (password, generated) = given_or_generated(None).unwrap();
        assert!(generated);
        assert_eq!(password.len(), 20);
        assert!(validate_password(&password).is_ok());
    }

    #[test]
    fn given_password_must_be_strong() {
        assert!(given_or_generated(Some("short".into())).is_err());
        let (password, generated) = given_or_generated(Some("long enough pass".into())).unwrap();
        assert!(!generated);
        assert_eq!(password, "long enough pass");
    }
}

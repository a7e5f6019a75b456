//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `TRUSTLAYER_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `TRUSTLAYER_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database_url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `TRUSTLAYER_RATE_LIMIT__LIMIT=20` sets the `rate_limit.limit` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - config file plus the operator subcommand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TRUSTLAYER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without running anything.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operator jobs run out-of-band from request handling.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Collapse duplicate payment-log rows sharing an external payment id
    ReconcilePayments,
    /// Backfill explicit salts onto legacy identity rows
    MigrateSalts,
    /// Delete expired, unconsumed verification tokens
    PurgeTokens,
}

/// Main application configuration.
///
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// PostgreSQL connection string. Can be set via DATABASE_URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Password hashing parameters
    pub password: PasswordConfig,
    /// Verification token lifetimes
    pub tokens: TokenConfig,
    /// Per-client, per-route rate limiting
    pub rate_limit: RateLimitSettings,
}

/// Argon2id cost parameters for credential hashing.
///
/// These are floor values: lowering them below the defaults is a config
/// error, so a bad deploy cannot silently downgrade hashing cost.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            argon2_memory_kib: 19456, // 19 MB
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    /// How long an email-verification link stays valid
    #[serde(with = "humantime_serde")]
    pub email_verification_ttl: Duration,
    /// How long a password-reset link stays valid
    #[serde(with = "humantime_serde")]
    pub password_reset_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            email_verification_ttl: Duration::from_secs(24 * 60 * 60),
            password_reset_ttl: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Maximum requests allowed per key within the window
    pub limit: u32,
    /// Window duration
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            password: PasswordConfig::default(),
            tokens: TokenConfig::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file and environment variables
    pub fn load(args: &Args) -> Result<Self, Error> {
        let mut config: Config = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("TRUSTLAYER_").split("__"))
            .extract()
            .map_err(|e| Error::Validation {
                message: format!("Invalid configuration: {e}"),
            })?;

        // DATABASE_URL is the conventional override used by deploy tooling
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would weaken the subsystem's guarantees.
    pub fn validate(&self) -> Result<(), Error> {
        let defaults = PasswordConfig::default();
        if self.password.argon2_memory_kib < defaults.argon2_memory_kib
            || self.password.argon2_iterations < defaults.argon2_iterations
        {
            return Err(Error::Validation {
                message: "password hashing cost below the configured floor".to_string(),
            });
        }
        if self.password.argon2_parallelism == 0 {
            return Err(Error::Validation {
                message: "argon2_parallelism must be at least 1".to_string(),
            });
        }
        if self.rate_limit.limit == 0 {
            return Err(Error::Validation {
                message: "rate_limit.limit must be at least 1".to_string(),
            });
        }
        if self.rate_limit.window.is_zero() {
            return Err(Error::Validation {
                message: "rate_limit.window must be non-zero".to_string(),
            });
        }
        if self.tokens.email_verification_ttl.is_zero() || self.tokens.password_reset_ttl.is_zero() {
            return Err(Error::Validation {
                message: "token lifetimes must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert_eq!(config.tokens.password_reset_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn test_rejects_downgraded_hash_cost() {
        let mut config = Config::default();
        config.password.argon2_memory_kib = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_and_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
rate_limit:
  limit: 25
  window: 1min
tokens:
  password_reset_ttl: 10min
"#,
            )?;
            jail.set_env("TRUSTLAYER_RATE_LIMIT__LIMIT", "50");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
                command: None,
            };
            let config = Config::load(&args).expect("config should load");
            assert_eq!(config.rate_limit.limit, 50); // env wins over yaml
            assert_eq!(config.rate_limit.window, Duration::from_secs(60));
            assert_eq!(config.tokens.password_reset_ttl, Duration::from_secs(600));
            Ok(())
        });
    }
}

//! CLI module - command-line interface
//!
//! - `proxyadmin auth` - log in/out, inspect and refresh sessions
//! - `proxyadmin subs` - manage subscriptions (admin)
//! - `proxyadmin features` - per-feature LLM overrides (admin)
//! - `proxyadmin analytics` - usage and cost analytics (admin)
//! - `proxyadmin me` - the caller's own subscription (user)
//! - `proxyadmin tiers` - tier templates
//! - `proxyadmin config` - validate and inspect configuration

#![allow(dead_code)]

pub mod analytics;
pub mod auth;
pub mod config;
pub mod context;
pub mod features;
pub mod me;
pub mod render;
pub mod subscriptions;

use clap::{Parser, Subcommand};

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const AUTH_REQUIRED: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
    pub const NETWORK_FAILURE: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PROXYADMIN_GIT_COMMIT"),
    ", built ",
    env!("PROXYADMIN_BUILD_DATE"),
    ")"
);

/// ProxyAdmin - manage LLM proxy subscriptions
///
/// Admins create and manage customer subscriptions; customers inspect
/// their own usage and feature configuration with `me`.
#[derive(Parser, Debug)]
#[command(name = "proxyadmin")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    // === Global flags ===

    /// Base URL of the proxy API (overrides settings.json)
    #[arg(long = "api-url", env = "PROXYADMIN_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable logs (JSON) to stderr
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", global = true, value_parser = ["trace", "verbose", "debug", "info", "warning", "warn", "error", "critical"])]
    pub log_level: Option<String>,

    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in, log out and inspect the stored session
    Auth(auth::AuthArgs),

    /// Manage subscriptions
    Subs(subscriptions::SubsArgs),

    /// Per-feature LLM configuration of a subscription
    Features(features::FeaturesArgs),

    /// Usage and cost analytics of a subscription
    Analytics(analytics::AnalyticsArgs),

    /// Your own subscription (log in with `auth login --user`)
    Me(me::MeArgs),

    /// List tier templates used to prefill new subscriptions
    Tiers(subscriptions::TiersArgs),

    /// Validate and inspect configuration
    Config(config::ConfigArgs),
}

/// Dispatch a parsed command
pub async fn run(ctx: &context::AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Auth(args) => auth::run(ctx, args).await,
        Commands::Subs(args) => subscriptions::run(ctx, args).await,
        Commands::Features(args) => features::run(ctx, args).await,
        Commands::Analytics(args) => analytics::run(ctx, args).await,
        Commands::Me(args) => me::run(ctx, args).await,
        Commands::Tiers(args) => subscriptions::run_tiers(args).await,
        Commands::Config(args) => config::run(ctx, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "proxyadmin",
            "subs",
            "list",
            "--page",
            "2",
            "--api-url",
            "https://proxy.example.com",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("https://proxy.example.com"));
        match cli.command {
            Commands::Subs(subscriptions::SubsArgs {
                command: subscriptions::SubsCommand::List(list),
            }) => {
                assert_eq!(list.page, 2);
                assert!(list.output.is_json());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_create_parses_tier_and_dates() {
        let cli = Cli::try_parse_from([
            "proxyadmin",
            "subs",
            "create",
            "--email",
            "ops@acme.io",
            "--subdomain",
            "acme",
            "--tier",
            "pro",
            "--start",
            "2026-01-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Subs(subscriptions::SubsArgs {
                command: subscriptions::SubsCommand::Create(create),
            }) => {
                assert_eq!(create.tier, Some(crate::core::TierTemplate::Professional));
                assert_eq!(create.start, chrono::NaiveDate::from_ymd_opt(2026, 1, 1));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_date_and_conflicting_flags() {
        assert!(Cli::try_parse_from(["proxyadmin", "subs", "reactivate", "k1", "--end", "31/12/2026"]).is_err());
        assert!(Cli::try_parse_from(["proxyadmin", "features", "set", "k1", "chat", "--enable", "--disable"]).is_err());
    }
}

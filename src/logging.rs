//! Logging setup
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` overrides the level picked from the flags.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map a `--log-level` value (including the aliases the CLI accepts) to a filter directive
fn level_directive(verbose: bool, level: Option<&str>) -> &'static str {
    match level.map(|l| l.to_ascii_lowercase()) {
        Some(l) if l == "trace" || l == "verbose" => "trace",
        Some(l) if l == "debug" => "debug",
        Some(l) if l == "info" => "info",
        Some(l) if l == "warn" || l == "warning" => "warn",
        Some(l) if l == "error" || l == "critical" => "error",
        _ if verbose => "debug",
        _ => "warn",
    }
}

pub fn init(verbose: bool, json: bool, level: Option<&str>, no_color: bool) -> anyhow::Result<()> {
    let directive = level_directive(verbose, level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxyadmin={},warn", directive)));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(!no_color),
            )
            .try_init()?;
    }

    Ok(())
}

//! Config command implementation
//!
//! Utilities for validating and inspecting configuration.

use clap::{Args, Subcommand};

use super::context::AppContext;
use crate::core::{FileSessionStorage, SessionScope};
use crate::settings::Settings;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configuration files
    Validate,
    /// Dump the effective settings to stdout
    Dump {
        /// Output format: json or toml
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

/// Run the config command
pub async fn run(ctx: &AppContext, args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(),
        ConfigCommand::Dump { format } => {
            println!("{}", dump_settings(&effective_settings(ctx), &format)?);
            Ok(())
        }
        ConfigCommand::Path => show_paths(),
    }
}

/// Settings with the command-line API URL applied
fn effective_settings(ctx: &AppContext) -> Settings {
    Settings {
        api_base_url: ctx.api_url.clone(),
        ..ctx.settings.clone()
    }
}

/// Validate configuration files
fn validate_config() -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // Check settings
    print!("Checking settings.json... ");
    if let Some(path) = Settings::settings_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Settings>(&content) {
                    Ok(settings) => {
                        let issues = settings.validate();
                        if issues.is_empty() {
                            println!("OK");
                        } else {
                            println!("INVALID");
                            errors.extend(issues.into_iter().map(|i| format!("settings.json: {}", i)));
                        }
                    }
                    Err(e) => {
                        println!("INVALID");
                        errors.push(format!("settings.json: {}", e));
                    }
                },
                Err(e) => {
                    println!("ERROR");
                    errors.push(format!("settings.json: Could not read file: {}", e));
                }
            }
        } else {
            println!("NOT FOUND (using defaults)");
            warnings.push("settings.json: File does not exist, using defaults".to_string());
        }
    } else {
        println!("ERROR");
        errors.push("settings.json: Could not determine config path".to_string());
    }

    // Check stored sessions
    print!("Checking session.json... ");
    let path = FileSessionStorage::default_path();
    if path.exists() {
        match FileSessionStorage::new(SessionScope::Admin).validate() {
            Ok(()) => println!("OK"),
            Err(e) => {
                println!("INVALID");
                errors.push(format!("session.json: {}", e));
            }
        }
    } else {
        println!("NOT FOUND (not logged in)");
    }

    // Print summary
    println!();
    if errors.is_empty() && warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        if !warnings.is_empty() {
            println!("Warnings:");
            for w in &warnings {
                println!("  - {}", w);
            }
        }
        if !errors.is_empty() {
            println!("Errors:");
            for e in &errors {
                println!("  - {}", e);
            }
            anyhow::bail!("Configuration validation failed with {} error(s).", errors.len());
        }
    }

    Ok(())
}

fn dump_settings(settings: &Settings, format: &str) -> anyhow::Result<String> {
    match format.to_lowercase().as_str() {
        "json" => Ok(serde_json::to_string_pretty(settings)?),
        "toml" => Ok(toml::to_string_pretty(settings)?),
        _ => anyhow::bail!("Unknown format '{}'. Supported formats: json, toml", format),
    }
}

/// Show configuration file paths
fn show_paths() -> anyhow::Result<()> {
    println!("Configuration paths:");

    if let Some(path) = Settings::settings_path() {
        let exists = if path.exists() { "" } else { " (not found)" };
        println!("  Settings: {}{}", path.display(), exists);
    } else {
        println!("  Settings: (could not determine path)");
    }

    let session_path = FileSessionStorage::default_path();
    let exists = if session_path.exists() { "" } else { " (not found)" };
    println!("  Sessions: {}{}", session_path.display(), exists);

    // Show config directory
    if let Some(config_dir) = dirs::config_dir() {
        println!();
        println!("Config directory: {}", config_dir.join("ProxyAdmin").display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_formats() {
        let settings = Settings::default();

        let json = dump_settings(&settings, "JSON").unwrap();
        assert!(json.contains("\"page_size\": 20"));

        let toml = dump_settings(&settings, "toml").unwrap();
        assert!(toml.contains("inactivity_timeout_mins = 30"));

        assert!(dump_settings(&settings, "yaml").is_err());
    }

    #[test]
    fn test_effective_settings_use_cli_url() {
        let ctx = AppContext::new(Settings::default(), Some("https://proxy.example.com".into()), true);
        assert_eq!(effective_settings(&ctx).api_base_url, "https://proxy.example.com");
    }
}

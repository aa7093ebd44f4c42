//! ProxyAdmin - admin and customer console for an LLM proxy's subscriptions
//!
//! Provides:
//! - A typed API client with bearer auth and one-shot token refresh
//! - Subscription, feature and analytics commands for admins
//! - A customer view of their own subscription (`proxyadmin me`)

mod api;
mod cli;
mod core;
mod logging;
mod settings;

use clap::Parser;
use cli::context::{AppContext, CliError};
use cli::{exit_codes, Cli};

use crate::api::{ApiError, SubmitError};
use crate::core::FormError;
use crate::settings::Settings;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose, cli.json_output, cli.log_level.as_deref(), cli.no_color) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let ctx = AppContext::new(Settings::load(), cli.api_url, cli.no_color);
    tracing::debug!("Using API at {}", ctx.api_url);

    rt.block_on(async {
        match cli::run(&ctx, cli.command).await {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                categorize_error(&e)
            }
        }
    })
}

/// Categorize an error into the appropriate exit code
fn categorize_error(e: &anyhow::Error) -> i32 {
    if let Some(api) = e.downcast_ref::<ApiError>() {
        return api_exit_code(api);
    }
    if let Some(submit) = e.downcast_ref::<SubmitError>() {
        return match submit {
            SubmitError::Invalid(_) => exit_codes::INVALID_INPUT,
            SubmitError::Api(api) => api_exit_code(api),
        };
    }
    if e.downcast_ref::<FormError>().is_some() {
        return exit_codes::INVALID_INPUT;
    }
    match e.downcast_ref::<CliError>() {
        Some(CliError::NotLoggedIn(_)) | Some(CliError::SessionExpired(_)) => exit_codes::AUTH_REQUIRED,
        Some(CliError::ConfirmationRequired(_)) | Some(CliError::InvalidArgument(_)) => {
            exit_codes::INVALID_INPUT
        }
        None => exit_codes::UNEXPECTED_FAILURE,
    }
}

fn api_exit_code(error: &ApiError) -> i32 {
    if error.is_network() {
        exit_codes::NETWORK_FAILURE
    } else if error.is_auth_error() {
        exit_codes::AUTH_REQUIRED
    } else if error.is_not_found() {
        exit_codes::NOT_FOUND
    } else if error.is_validation() {
        exit_codes::INVALID_INPUT
    } else {
        exit_codes::UNEXPECTED_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionScope;

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let code = |e: anyhow::Error| categorize_error(&e);

        assert_eq!(code(ApiError::network("refused").into()), exit_codes::NETWORK_FAILURE);
        assert_eq!(code(ApiError::new(401, "expired").into()), exit_codes::AUTH_REQUIRED);
        assert_eq!(code(ApiError::new(404, "missing").into()), exit_codes::NOT_FOUND);
        assert_eq!(code(ApiError::new(422, "bad").into()), exit_codes::INVALID_INPUT);
        assert_eq!(code(ApiError::new(500, "boom").into()), exit_codes::UNEXPECTED_FAILURE);
        assert_eq!(
            code(SubmitError::Invalid(FormError::EmptyUpdate).into()),
            exit_codes::INVALID_INPUT
        );
        assert_eq!(
            code(SubmitError::Api(ApiError::new(403, "forbidden")).into()),
            exit_codes::AUTH_REQUIRED
        );
        assert_eq!(code(FormError::Missing("end_date").into()), exit_codes::INVALID_INPUT);
        assert_eq!(
            code(CliError::NotLoggedIn(SessionScope::Admin).into()),
            exit_codes::AUTH_REQUIRED
        );
        assert_eq!(code(anyhow::anyhow!("other")), exit_codes::UNEXPECTED_FAILURE);
    }
}

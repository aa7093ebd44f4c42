//! Per-invocation state: settings, API clients and session checks

use chrono::Utc;
use std::sync::Arc;

use super::render::is_terminal;
use crate::api::admin::ADMIN_AUTH;
use crate::api::user::USER_AUTH;
use crate::api::{AdminApi, ApiClient, AuthEndpoints, ClearReason, ReqwestTransport, SessionEvent, UserApi};
use crate::core::{FileSessionStorage, SessionScope};
use crate::settings::Settings;

/// Failures detected by the CLI itself
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Not logged in as {0}. Run 'proxyadmin auth login{flag}' first.", flag = login_flag(.0))]
    NotLoggedIn(SessionScope),
    #[error("The {0} session expired due to inactivity. Log in again.")]
    SessionExpired(SessionScope),
    #[error("Refusing to delete '{0}' without --yes")]
    ConfirmationRequired(String),
    #[error("{0}")]
    InvalidArgument(String),
}

fn login_flag(scope: &SessionScope) -> &'static str {
    match scope {
        SessionScope::Admin => "",
        SessionScope::User => " --user",
    }
}

pub struct AppContext {
    pub settings: Settings,
    pub api_url: String,
    pub use_color: bool,
}

impl AppContext {
    pub fn new(settings: Settings, api_url: Option<String>, no_color: bool) -> Self {
        let api_url = api_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| settings.api_base_url.clone());
        Self {
            settings,
            api_url,
            use_color: !no_color && is_terminal(),
        }
    }

    pub fn client(&self, scope: SessionScope) -> anyhow::Result<ApiClient> {
        let endpoints: AuthEndpoints = match scope {
            SessionScope::Admin => ADMIN_AUTH,
            SessionScope::User => USER_AUTH,
        };
        let transport = Arc::new(ReqwestTransport::new(self.settings.request_timeout()));
        let storage = Arc::new(FileSessionStorage::new(scope));
        let client = ApiClient::new(&self.api_url, transport, storage, endpoints)?;
        client.on_session_change(move |event| log_session_event(scope, event));
        Ok(client)
    }

    pub fn admin(&self) -> anyhow::Result<AdminApi> {
        Ok(AdminApi::new(self.client(SessionScope::Admin)?))
    }

    pub fn user(&self) -> anyhow::Result<UserApi> {
        Ok(UserApi::new(self.client(SessionScope::User)?))
    }

    /// Fail unless a usable session exists; idle sessions are cleared
    pub async fn require_session(&self, client: &ApiClient, scope: SessionScope) -> anyhow::Result<()> {
        let Some(credentials) = client.credentials().await else {
            return Err(CliError::NotLoggedIn(scope).into());
        };

        if let Some(timeout) = self.settings.inactivity_timeout() {
            if credentials.is_idle(Utc::now(), timeout) {
                client.clear_session(ClearReason::Inactivity).await;
                return Err(CliError::SessionExpired(scope).into());
            }
        }
        Ok(())
    }
}

/// Record activity when an authenticated command succeeded
pub async fn finish<T>(client: &ApiClient, result: anyhow::Result<T>) -> anyhow::Result<T> {
    if result.is_ok() {
        client.mark_session_used().await;
    }
    result
}

fn log_session_event(scope: SessionScope, event: &SessionEvent) {
    match event {
        SessionEvent::LoggedIn { expires_in } => {
            tracing::info!(scope = %scope, expires_in, "Session started")
        }
        SessionEvent::Refreshed { expires_in } => {
            tracing::debug!(scope = %scope, expires_in, "Session refreshed")
        }
        SessionEvent::Cleared { reason } => {
            tracing::info!(scope = %scope, reason = ?reason, "Session cleared")
        }
    }
}

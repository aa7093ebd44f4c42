//! Auth command implementation
//!
//! Logs in, out and inspects the stored admin or user session.

use base64::Engine;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};

use super::context::{AppContext, CliError};
use super::render::{bold, OutputArgs};
use crate::core::{mask_token, SessionCredentials, SessionScope};

/// Arguments for the auth command
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ScopeArg {
    /// Use the customer (user) session instead of the admin session
    #[arg(long)]
    pub user: bool,
}

impl ScopeArg {
    pub fn scope(&self) -> SessionScope {
        if self.user {
            SessionScope::User
        } else {
            SessionScope::Admin
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Log in and store the session
    Login {
        #[command(flatten)]
        scope: ScopeArg,
        /// Admin username
        #[arg(short, long)]
        username: Option<String>,
        /// Admin password (prompted when omitted)
        #[arg(long, env = "PROXYADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Subscription token for --user (prompted when omitted)
        #[arg(long, env = "PROXYADMIN_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Drop the stored session
    Logout {
        #[command(flatten)]
        scope: ScopeArg,
    },
    /// Show the stored session
    Status {
        #[command(flatten)]
        scope: ScopeArg,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Rotate the access/refresh token pair now
    Refresh {
        #[command(flatten)]
        scope: ScopeArg,
    },
}

/// Run the auth command
pub async fn run(ctx: &AppContext, args: AuthArgs) -> anyhow::Result<()> {
    match args.command {
        AuthCommand::Login {
            scope,
            username,
            password,
            token,
        } => match scope.scope() {
            SessionScope::Admin => login_admin(ctx, username, password).await,
            SessionScope::User => login_user(ctx, token).await,
        },
        AuthCommand::Logout { scope } => logout(ctx, scope.scope()).await,
        AuthCommand::Status { scope, output } => status(ctx, scope.scope(), &output).await,
        AuthCommand::Refresh { scope } => refresh(ctx, scope.scope()).await,
    }
}

async fn login_admin(
    ctx: &AppContext,
    username: Option<String>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt("Username: ")?,
    };
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };
    if username.trim().is_empty() || password.is_empty() {
        return Err(CliError::InvalidArgument("Username and password are required".into()).into());
    }

    let api = ctx.admin()?;
    let credentials = api.login(username.trim(), &password).await?;
    println!(
        "Logged in to {} as admin '{}' (token valid for {}).",
        ctx.api_url,
        username.trim(),
        format_duration(credentials.expires_in)
    );
    Ok(())
}

async fn login_user(ctx: &AppContext, token: Option<String>) -> anyhow::Result<()> {
    let token = match token {
        Some(t) => t,
        None => prompt("Subscription token: ")?,
    };

    let api = ctx.user()?;
    let credentials = api.login(&token).await?;
    println!(
        "Logged in to {} with subscription token {} (valid for {}).",
        ctx.api_url,
        mask_token(&token),
        format_duration(credentials.expires_in)
    );
    Ok(())
}

async fn logout(ctx: &AppContext, scope: SessionScope) -> anyhow::Result<()> {
    let client = ctx.client(scope)?;
    if !client.is_authenticated().await {
        println!("No {} session stored.", scope);
        return Ok(());
    }
    client.logout().await;
    println!("Logged out of the {} session.", scope);
    Ok(())
}

async fn refresh(ctx: &AppContext, scope: SessionScope) -> anyhow::Result<()> {
    let client = ctx.client(scope)?;
    ctx.require_session(&client, scope).await?;
    let credentials = client.refresh().await?;
    println!(
        "Refreshed the {} session (token valid for {}).",
        scope,
        format_duration(credentials.expires_in)
    );
    Ok(())
}

/// Session summary for status output; never carries raw tokens
#[derive(Debug, Serialize)]
struct SessionStatus {
    scope: SessionScope,
    api_url: String,
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_exp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    idle: Option<bool>,
}

impl SessionStatus {
    fn new(ctx: &AppContext, scope: SessionScope, credentials: Option<&SessionCredentials>) -> Self {
        let now = Utc::now();
        Self {
            scope,
            api_url: ctx.api_url.clone(),
            logged_in: credentials.is_some(),
            access_token: credentials.map(|c| mask_token(&c.access_token)),
            issued_at: credentials.map(|c| c.issued_at),
            expires_at: credentials.and_then(|c| c.expires_at()),
            expired: credentials.map(|c| c.is_expired()),
            token_exp: credentials.and_then(|c| jwt_expiry(&c.access_token)),
            last_used: credentials.and_then(|c| c.last_used),
            idle: credentials.and_then(|c| {
                ctx.settings
                    .inactivity_timeout()
                    .map(|timeout| c.is_idle(now, timeout))
            }),
        }
    }
}

async fn status(ctx: &AppContext, scope: SessionScope, output: &OutputArgs) -> anyhow::Result<()> {
    let client = ctx.client(scope)?;
    let credentials = client.credentials().await;
    let status = SessionStatus::new(ctx, scope, credentials.as_ref());

    if output.is_json() {
        return output.print_json(&status);
    }

    println!("{}", bold(&format!("{} session", scope), ctx.use_color));
    println!("  API:        {}", status.api_url);
    if !status.logged_in {
        println!("  Status:     not logged in");
        return Ok(());
    }

    let fmt = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!("  Token:      {}", status.access_token.as_deref().unwrap_or("-"));
    println!("  Issued:     {}", fmt(status.issued_at));
    let expired = if status.expired == Some(true) {
        " (expired, refreshed on next request)"
    } else {
        ""
    };
    println!("  Expires:    {}{}", fmt(status.expires_at), expired);
    if let Some(exp) = status.token_exp {
        println!("  Token exp:  {}", fmt(Some(exp)));
    }
    println!("  Last used:  {}", fmt(status.last_used));
    if status.idle == Some(true) {
        println!("  Status:     idle, will be cleared on next use");
    } else {
        println!("  Status:     active");
    }
    Ok(())
}

/// `exp` claim of a JWT access token, if the token is one
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

fn format_duration(secs: u64) -> String {
    match secs {
        s if s >= 3600 && s % 3600 == 0 => format!("{}h", s / 3600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

/// Read one line from stdin after printing `label` to stderr
fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{}", label)?;
    stderr.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_expiry() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"sub":"admin","exp":1767225600}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", payload);
        let exp = jwt_expiry(&token).unwrap();
        assert_eq!(exp.format("%Y-%m-%d").to_string(), "2026-01-01");

        assert!(jwt_expiry("opaque-token").is_none());
        assert!(jwt_expiry("a.!!!.c").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(900), "15m");
        assert_eq!(format_duration(45), "45s");
    }

    #[test]
    fn test_status_masks_tokens() {
        let ctx = AppContext::new(Default::default(), Some("http://proxy.test".into()), true);
        let creds = SessionCredentials::new("access-token-0123456789", "refresh-token-xyz", 3600);
        let status = SessionStatus::new(&ctx, SessionScope::Admin, Some(&creds));

        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("access-token-0123456789"));
        assert!(!json.contains("refresh-token"));
        assert_eq!(status.access_token.as_deref(), Some("acce...6789"));
        assert_eq!(status.expired, Some(false));

        let empty = SessionStatus::new(&ctx, SessionScope::User, None);
        assert_eq!(serde_json::to_value(&empty).unwrap()["logged_in"], false);
    }
}

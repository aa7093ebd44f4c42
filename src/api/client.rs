//! Authenticated API client
//!
//! Attaches the bearer token to every request. A 401 triggers exactly one
//! refresh of the access/refresh pair followed by one replay of the
//! original request; if the refresh fails the session is cleared and the
//! original 401 is returned.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use url::Url;

use super::error::ApiError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::core::{SessionCredentials, SessionStorage, DEFAULT_EXPIRES_IN};

/// Path segments of the login and refresh endpoints for one scope
#[derive(Debug, Clone, Copy)]
pub struct AuthEndpoints {
    pub login: &'static [&'static str],
    pub refresh: &'static [&'static str],
}

/// Why a session was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    Logout,
    RefreshFailed,
    Inactivity,
}

/// Session change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { expires_in: u64 },
    Refreshed { expires_in: u64 },
    Cleared { reason: ClearReason },
}

type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Token pair returned by login and refresh
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

pub struct ApiClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    storage: Arc<dyn SessionStorage>,
    endpoints: AuthEndpoints,
    credentials: RwLock<Option<SessionCredentials>>,
    /// Serializes 401-triggered refreshes across concurrent requests
    refresh_gate: tokio::sync::Mutex<()>,
    listeners: Mutex<Vec<SessionListener>>,
}

impl ApiClient {
    /// Create a client, resuming any session already in `storage`
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn SessionStorage>,
        endpoints: AuthEndpoints,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiError::new(0, format!("Invalid API base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::new(0, format!("Invalid API base URL '{}'", base_url)));
        }

        let credentials = storage.load();
        if credentials.is_some() {
            tracing::debug!("Resumed stored session");
        }

        Ok(Self {
            base_url,
            transport,
            storage,
            endpoints,
            credentials: RwLock::new(credentials),
            refresh_gate: tokio::sync::Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register a callback invoked on login, refresh and session clear
    pub fn on_session_change<F>(&self, listener: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Arc::new(listener));
        }
    }

    pub async fn credentials(&self) -> Option<SessionCredentials> {
        self.credentials.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    // === Session lifecycle ===

    /// Exchange login credentials for a token pair and persist it
    pub async fn login<B: Serialize + ?Sized>(&self, body: &B) -> Result<SessionCredentials, ApiError> {
        let url = self.build_url(self.endpoints.login, &[])?;
        let body = encode_body(body)?;
        let response = self.dispatch(Method::POST, url, Some(body), None).await?;
        let tokens: TokenResponse = into_result(&response)?;

        let credentials = SessionCredentials::new(
            tokens.access_token,
            tokens.refresh_token.unwrap_or_default(),
            tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        );
        tracing::info!("Logged in, access token valid for {}s", credentials.expires_in);
        self.store_session(credentials.clone(), SessionEvent::LoggedIn {
            expires_in: credentials.expires_in,
        })
        .await;
        Ok(credentials)
    }

    /// Rotate the token pair now. Clears the session if the refresh fails.
    pub async fn refresh(&self) -> Result<SessionCredentials, ApiError> {
        let refresh_token = self
            .refresh_token()
            .await
            .ok_or_else(|| ApiError::new(401, "No refresh token available; log in again"))?;

        match self.refresh_with(&refresh_token).await {
            Ok(credentials) => Ok(credentials),
            Err(e) => {
                self.clear_session(ClearReason::RefreshFailed).await;
                Err(e)
            }
        }
    }

    pub async fn logout(&self) {
        self.clear_session(ClearReason::Logout).await;
        tracing::info!("Logged out");
    }

    /// Drop the session from memory and storage
    pub async fn clear_session(&self, reason: ClearReason) {
        *self.credentials.write().await = None;
        if let Err(e) = self.storage.clear() {
            tracing::warn!("Failed to clear stored session: {}", e);
        }
        self.notify(&SessionEvent::Cleared { reason });
    }

    /// Record activity on the current session and persist it
    pub async fn mark_session_used(&self) {
        let mut guard = self.credentials.write().await;
        if let Some(credentials) = guard.as_mut() {
            credentials.mark_used();
            if let Err(e) = self.storage.save(credentials) {
                tracing::warn!("Failed to persist session activity: {}", e);
            }
        }
    }

    // === Requests ===

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.build_url(path, query)?;
        let response = self.send_authorized(Method::GET, url, None).await?;
        into_result(&response)
    }

    pub async fn post<B, T>(&self, path: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path, &[])?;
        let response = self
            .send_authorized(Method::POST, url, Some(encode_body(body)?))
            .await?;
        into_result(&response)
    }

    pub async fn put<B, T>(&self, path: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path, &[])?;
        let response = self
            .send_authorized(Method::PUT, url, Some(encode_body(body)?))
            .await?;
        into_result(&response)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ApiError> {
        let url = self.build_url(path, &[])?;
        let response = self.send_authorized(Method::DELETE, url, None).await?;
        into_result(&response)
    }

    /// Join path segments (percent-encoded) and query pairs onto the base URL
    pub fn build_url(&self, path: &[&str], query: &[(&str, String)]) -> Result<String, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::new(0, "API base URL cannot carry a path"))?;
            segments.pop_if_empty();
            segments.extend(path);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    async fn send_authorized(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.access_token().await;
        let response = self
            .dispatch(method.clone(), url.clone(), body.clone(), token.clone())
            .await?;

        if response.status != 401 {
            return Ok(response);
        }

        let _gate = self.refresh_gate.lock().await;

        // Another request already rotated the pair while this one was in flight
        let current = self.access_token().await;
        if current.is_some() && current != token {
            return self.dispatch(method, url, body, current).await;
        }

        let Some(refresh_token) = self.refresh_token().await else {
            return Ok(response);
        };

        tracing::debug!("Access token rejected for {}, refreshing session", url);
        match self.refresh_with(&refresh_token).await {
            Ok(credentials) => {
                self.dispatch(method, url, body, Some(credentials.access_token))
                    .await
            }
            Err(e) => {
                tracing::warn!("Session refresh failed: {}", e);
                self.clear_session(ClearReason::RefreshFailed).await;
                Ok(response)
            }
        }
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<SessionCredentials, ApiError> {
        let url = self.build_url(self.endpoints.refresh, &[])?;
        let body = encode_body(&RefreshRequest { refresh_token })?;
        let response = self.dispatch(Method::POST, url, Some(body), None).await?;
        let tokens: TokenResponse = into_result(&response)?;

        let previous_last_used = self
            .credentials
            .read()
            .await
            .as_ref()
            .and_then(|c| c.last_used);

        let mut credentials = SessionCredentials::new(
            tokens.access_token,
            tokens
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| refresh_token.to_string()),
            tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        );
        credentials.last_used = previous_last_used;

        tracing::debug!("Session refreshed, access token valid for {}s", credentials.expires_in);
        self.store_session(credentials.clone(), SessionEvent::Refreshed {
            expires_in: credentials.expires_in,
        })
        .await;
        Ok(credentials)
    }

    async fn dispatch(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        bearer: Option<String>,
    ) -> Result<HttpResponse, ApiError> {
        tracing::trace!("{} {}", method, url);
        let request = HttpRequest {
            method,
            url,
            bearer,
            body,
        };
        self.transport.send(request).await.map_err(ApiError::network)
    }

    async fn store_session(&self, credentials: SessionCredentials, event: SessionEvent) {
        if let Err(e) = self.storage.save(&credentials) {
            tracing::warn!("Failed to persist session: {}", e);
        }
        *self.credentials.write().await = Some(credentials);
        self.notify(&event);
    }

    async fn access_token(&self) -> Option<String> {
        self.credentials
            .read()
            .await
            .as_ref()
            .map(|c| c.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    async fn refresh_token(&self) -> Option<String> {
        self.credentials
            .read()
            .await
            .as_ref()
            .filter(|c| c.has_refresh_token())
            .map(|c| c.refresh_token.clone())
    }

    fn notify(&self, event: &SessionEvent) {
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(event);
        }
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::new(0, format!("Failed to encode request: {}", e)))
}

/// Turn a response into `T`, or into an error for non-2xx statuses
fn into_result<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(ApiError::from_response(response.status, &response.body));
    }
    let body = response.body.trim();
    let body = if body.is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::decode(response.status, e))
}

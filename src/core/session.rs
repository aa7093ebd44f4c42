//! Session credentials and their persistent storage
//!
//! The access/refresh token pair lives in memory inside the API client and
//! is mirrored to a [`SessionStorage`]. On disk this is a single JSON file
//! holding one slot per [`SessionScope`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Default token lifetime when the server omits `expires_in`
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Which endpoint family a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionScope {
    Admin,
    User,
}

impl SessionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionScope::Admin => "admin",
            SessionScope::User => "user",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(SessionScope::Admin),
            "user" => Some(SessionScope::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

/// Access/refresh token pair
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    /// When the access token was obtained
    #[serde(default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
    /// Last successful authenticated command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl SessionCredentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in,
            issued_at: Utc::now(),
            last_used: None,
        }
    }

    /// `None` when the advertised lifetime is past what a timestamp can hold
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = i64::try_from(self.expires_in).ok().and_then(Duration::try_seconds)?;
        self.issued_at.checked_add_signed(lifetime)
    }

    /// Access token past its advertised lifetime
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|at| Utc::now() >= at)
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    pub fn mark_used(&mut self) {
        self.last_used = Some(Utc::now());
    }

    /// True when the session has been idle longer than `timeout`.
    ///
    /// Idle time is measured from `last_used`, or from `issued_at` for a
    /// session that was never used.
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let last = self.last_used.unwrap_or(self.issued_at);
        now - last > timeout
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .field("last_used", &self.last_used)
            .finish()
    }
}

/// Mask a token for display (first 4 and last 4 chars)
pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    let count = trimmed.chars().count();
    if count > 12 {
        let head: String = trimmed.chars().take(4).collect();
        let tail: String = trimmed.chars().skip(count - 4).collect();
        format!("{}...{}", head, tail)
    } else if count > 4 {
        let head: String = trimmed.chars().take(4).collect();
        format!("{}...", head)
    } else {
        "****".to_string()
    }
}

/// Errors that can occur with session storage
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the client mirrors its credentials
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Option<SessionCredentials>;
    fn save(&self, credentials: &SessionCredentials) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// File format holding every scope's session
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    #[serde(default)]
    sessions: HashMap<SessionScope, SessionCredentials>,
}

impl Default for SessionFile {
    fn default() -> Self {
        Self {
            version: 1,
            sessions: HashMap::new(),
        }
    }
}

/// Session storage backed by a JSON file, one slot per scope
pub struct FileSessionStorage {
    file_path: PathBuf,
    scope: SessionScope,
}

impl FileSessionStorage {
    pub fn new(scope: SessionScope) -> Self {
        Self {
            file_path: Self::default_path(),
            scope,
        }
    }

    pub fn with_path(path: PathBuf, scope: SessionScope) -> Self {
        Self {
            file_path: path,
            scope,
        }
    }

    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "ProxyAdmin")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".proxyadmin")
            })
            .join("session.json")
    }

    pub fn path(&self) -> &PathBuf {
        &self.file_path
    }

    pub fn scope(&self) -> SessionScope {
        self.scope
    }

    fn read_file(&self) -> Result<SessionFile, SessionStoreError> {
        if !self.file_path.exists() {
            return Ok(SessionFile::default());
        }
        let data = fs::read_to_string(&self.file_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_file(&self, file: &SessionFile) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(file)?;
        fs::write(&self.file_path, json)?;
        restrict_permissions(&self.file_path);
        Ok(())
    }

    /// Check the file parses, without touching the in-memory state
    pub fn validate(&self) -> Result<(), SessionStoreError> {
        self.read_file().map(|_| ())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::debug!("Could not restrict session file permissions: {}", e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) {}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Option<SessionCredentials> {
        match self.read_file() {
            Ok(mut file) => file.sessions.remove(&self.scope),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {}: {}", self.file_path.display(), e);
                None
            }
        }
    }

    fn save(&self, credentials: &SessionCredentials) -> Result<(), SessionStoreError> {
        // A corrupt file is replaced rather than blocking login
        let mut file = self.read_file().unwrap_or_default();
        file.sessions.insert(self.scope, credentials.clone());
        self.write_file(&file)
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut file = self.read_file().unwrap_or_default();
        if file.sessions.remove(&self.scope).is_none() {
            return Ok(());
        }
        self.write_file(&file)
    }
}

/// In-memory storage; clones share the same slot
#[derive(Clone, Default)]
pub struct MemorySessionStorage {
    slot: Arc<Mutex<Option<SessionCredentials>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Option<SessionCredentials> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, credentials: &SessionCredentials) -> Result<(), SessionStoreError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(credentials.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileSessionStorage::with_path(path.clone(), SessionScope::Admin);

        assert!(storage.load().is_none());

        let creds = SessionCredentials::new("A1", "R1", 3600);
        storage.save(&creds).unwrap();

        let reopened = FileSessionStorage::with_path(path, SessionScope::Admin);
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.access_token, "A1");
        assert_eq!(loaded.refresh_token, "R1");
        assert_eq!(loaded.expires_in, 3600);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let admin = FileSessionStorage::with_path(path.clone(), SessionScope::Admin);
        let user = FileSessionStorage::with_path(path, SessionScope::User);

        admin.save(&SessionCredentials::new("admin-a", "admin-r", 60)).unwrap();
        user.save(&SessionCredentials::new("user-a", "user-r", 60)).unwrap();

        admin.clear().unwrap();
        assert!(admin.load().is_none());
        assert_eq!(user.load().unwrap().access_token, "user-a");
    }

    #[test]
    fn test_corrupt_file_is_ignored_on_load_and_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileSessionStorage::with_path(path, SessionScope::User);
        assert!(storage.validate().is_err());
        assert!(storage.load().is_none());

        storage.save(&SessionCredentials::new("a", "r", 60)).unwrap();
        assert!(storage.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_default() {
        let json = r#"{"access_token":"a","refresh_token":"r"}"#;
        let creds: SessionCredentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.expires_in, DEFAULT_EXPIRES_IN);
        assert!(creds.last_used.is_none());
    }

    #[test]
    fn test_idle_detection() {
        let mut creds = SessionCredentials::new("a", "r", 3600);
        let now = Utc::now();
        assert!(!creds.is_idle(now, Duration::minutes(30)));

        creds.last_used = Some(now - Duration::minutes(45));
        assert!(creds.is_idle(now, Duration::minutes(30)));

        creds.mark_used();
        assert!(!creds.is_idle(Utc::now(), Duration::minutes(30)));
    }

    #[test]
    fn test_huge_lifetime_never_expires() {
        let creds = SessionCredentials::new("A", "R", 10_000_000_000_000_000);
        assert_eq!(creds.expires_at(), None);
        assert!(!creds.is_expired());

        let creds = SessionCredentials::new("A", "R", u64::MAX);
        assert_eq!(creds.expires_at(), None);
        assert!(!creds.is_expired());

        let mut creds = SessionCredentials::new("A", "R", 60);
        assert_eq!(creds.expires_at(), Some(creds.issued_at + Duration::seconds(60)));
        creds.issued_at = Utc::now() - Duration::minutes(5);
        assert!(creds.is_expired());
    }

    #[test]
    fn test_debug_masks_tokens() {
        let creds = SessionCredentials::new("secret-access-token-123", "secret-refresh-token-456", 60);
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret-access-token-123"));
        assert!(debug.contains("secr...-123"));
    }

    #[test]
    fn test_memory_storage_clones_share_slot() {
        let storage = MemorySessionStorage::new();
        let other = storage.clone();
        storage.save(&SessionCredentials::new("a", "r", 60)).unwrap();
        assert_eq!(other.load().unwrap().access_token, "a");
        other.clear().unwrap();
        assert!(storage.load().is_none());
    }
}

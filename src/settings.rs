//! Settings management for ProxyAdmin
//!
//! Handles persistent configuration including:
//! - API base URL
//! - Default list page size
//! - Request timeout
//! - Session inactivity timeout

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::core::MAX_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the proxy backend
    pub api_base_url: String,

    /// Rows per page for list commands
    pub page_size: u32,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Minutes of inactivity before a stored session is dropped (0 = never)
    pub inactivity_timeout_mins: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            page_size: 20,
            request_timeout_secs: 30,
            inactivity_timeout_mins: 30,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ProxyAdmin").join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!("Ignoring malformed settings file {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Failed to read settings file {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine settings path"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// `None` when the inactivity timeout is disabled
    pub fn inactivity_timeout(&self) -> Option<chrono::Duration> {
        if self.inactivity_timeout_mins == 0 {
            return None;
        }
        i64::try_from(self.inactivity_timeout_mins)
            .ok()
            .and_then(chrono::Duration::try_minutes)
    }

    /// Problems that would make the settings unusable
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match Url::parse(&self.api_base_url) {
            Ok(url) if url.scheme() != "http" && url.scheme() != "https" => {
                issues.push(format!("api_base_url: unsupported scheme '{}'", url.scheme()));
            }
            Ok(_) => {}
            Err(e) => issues.push(format!("api_base_url: {}", e)),
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            issues.push(format!("page_size: must be between 1 and {}", MAX_PAGE_SIZE));
        }

        if self.request_timeout_secs == 0 {
            issues.push("request_timeout_secs: must be at least 1".to_string());
        }

        issues
    }
}

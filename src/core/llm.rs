//! LLM provider configuration
//!
//! [`LlmConfig`] is what the server reports back; it never carries the api
//! key. [`LlmConfigInput`] is what forms send; its key is write-only and is
//! redacted from `Debug` output.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lenient;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// LLM configuration as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(deserialize_with = "lenient::or_default")]
    pub provider: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub model: String,
    #[serde(deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(
        alias = "input_price_per_1m",
        alias = "input_price",
        deserialize_with = "lenient::or_default"
    )]
    pub input_price_per_million: f64,
    #[serde(
        alias = "output_price_per_1m",
        alias = "output_price",
        deserialize_with = "lenient::or_default"
    )]
    pub output_price_per_million: f64,
    /// Whether a key is stored server-side. The key itself is never read.
    #[serde(deserialize_with = "lenient::or_default")]
    pub has_api_key: bool,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        !self.provider.is_empty() && !self.model.is_empty()
    }

    /// "provider/model", or "-" when unset
    pub fn label(&self) -> String {
        if self.is_configured() {
            format!("{}/{}", self.provider, self.model)
        } else {
            "-".to_string()
        }
    }

    /// Cost in USD for a token count at this config's prices
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        estimate_cost(
            input_tokens,
            output_tokens,
            self.input_price_per_million,
            self.output_price_per_million,
        )
    }
}

/// LLM configuration sent in create/update forms
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct LlmConfigInput {
    #[validate(length(min = 1, message = "provider is required"))]
    pub provider: String,
    #[validate(length(min = 1, message = "model is required"))]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "endpoint must be a valid URL"))]
    pub endpoint: Option<String>,
    /// Omitted from the payload when `None` so the server keeps the stored key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub input_price_per_million: f64,
    #[validate(range(min = 0.0, message = "price cannot be negative"))]
    pub output_price_per_million: f64,
}

impl LlmConfigInput {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_prices(mut self, input_per_million: f64, output_per_million: f64) -> Self {
        self.input_price_per_million = input_per_million;
        self.output_price_per_million = output_per_million;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Blank keys are treated as "keep existing"
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    /// Start an edit from the server's view; the key stays untouched
    pub fn from_existing(config: &LlmConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            api_key: None,
            input_price_per_million: config.input_price_per_million,
            output_price_per_million: config.output_price_per_million,
        }
    }
}

impl std::fmt::Debug for LlmConfigInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfigInput")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("input_price_per_million", &self.input_price_per_million)
            .field("output_price_per_million", &self.output_price_per_million)
            .finish()
    }
}

/// USD cost for a token count given per-million prices
pub fn estimate_cost(
    input_tokens: u64,
    output_tokens: u64,
    input_price_per_million: f64,
    output_price_per_million: f64,
) -> f64 {
    (input_tokens as f64 / TOKENS_PER_MILLION) * input_price_per_million
        + (output_tokens as f64 / TOKENS_PER_MILLION) * output_price_per_million
}

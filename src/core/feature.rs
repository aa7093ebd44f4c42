//! Per-feature configuration under a subscription

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use super::form::FormError;
use super::lenient;
use super::query::Searchable;
use super::{LlmConfig, LlmConfigInput};

/// Feature configuration as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    #[serde(alias = "name", alias = "feature", deserialize_with = "lenient::or_default")]
    pub feature_name: String,
    #[serde(alias = "is_enabled", deserialize_with = "lenient::or_default")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub use_custom_llm: bool,
    #[serde(
        alias = "main_llm_config",
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub main_llm: Option<LlmConfig>,
    #[serde(
        alias = "fallback_llm_config",
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub fallback_llm: Option<LlmConfig>,
    #[serde(alias = "request_count", deserialize_with = "lenient::or_default")]
    pub requests_used: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub input_tokens: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub output_tokens: u64,
    #[serde(alias = "cost", deserialize_with = "lenient::or_default")]
    pub total_cost: f64,
}

impl FeatureConfig {
    /// The override in effect, if the feature uses a custom LLM
    pub fn effective_override(&self) -> Option<&LlmConfig> {
        if self.use_custom_llm {
            self.main_llm.as_ref().filter(|c| c.is_configured())
        } else {
            None
        }
    }
}

impl Searchable for FeatureConfig {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.feature_name.as_str()];
        if let Some(main) = &self.main_llm {
            fields.push(main.provider.as_str());
            fields.push(main.model.as_str());
        }
        fields
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureCollection {
    Map(BTreeMap<String, FeatureConfig>),
    List(Vec<FeatureConfig>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeaturesPayload {
    Wrapped { features: FeatureCollection },
    Bare(FeatureCollection),
}

/// Features keyed by name, sorted by name.
///
/// Accepts `{"features": {...}}`, `{"features": [...]}` or either
/// collection bare. Map keys fill in missing feature names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "FeaturesPayload")]
pub struct FeatureList(pub Vec<FeatureConfig>);

impl From<FeaturesPayload> for FeatureList {
    fn from(payload: FeaturesPayload) -> Self {
        let collection = match payload {
            FeaturesPayload::Wrapped { features } => features,
            FeaturesPayload::Bare(collection) => collection,
        };
        let mut features: Vec<FeatureConfig> = match collection {
            FeatureCollection::Map(map) => map
                .into_iter()
                .map(|(name, mut config)| {
                    if config.feature_name.is_empty() {
                        config.feature_name = name;
                    }
                    config
                })
                .collect(),
            FeatureCollection::List(list) => list,
        };
        features.sort_by(|a, b| a.feature_name.cmp(&b.feature_name));
        FeatureList(features)
    }
}

impl FeatureList {
    pub fn get(&self, name: &str) -> Option<&FeatureConfig> {
        self.0.iter().find(|f| f.feature_name == name)
    }

    pub fn into_inner(self) -> Vec<FeatureConfig> {
        self.0
    }
}

/// Body of the save-and-test call; unset fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct FeatureUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_custom_llm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_llm: Option<LlmConfigInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_llm: Option<LlmConfigInput>,
}

impl FeatureUpdate {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.use_custom_llm.is_none()
            && self.main_llm.is_none()
            && self.fallback_llm.is_none()
    }

    pub fn check(&self) -> Result<(), FormError> {
        if self.is_empty() {
            return Err(FormError::EmptyUpdate);
        }
        if self.use_custom_llm == Some(true) && self.main_llm.is_none() {
            return Err(FormError::Missing("main_llm"));
        }
        if let Some(main) = &self.main_llm {
            main.validate().map_err(FormError::fields("main LLM"))?;
        }
        if let Some(fallback) = &self.fallback_llm {
            fallback.validate().map_err(FormError::fields("fallback LLM"))?;
        }
        Ok(())
    }
}

/// Connectivity test of one configured LLM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmTestResult {
    #[serde(deserialize_with = "lenient::or_default")]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of save-and-test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveAndTestResult {
    #[serde(deserialize_with = "lenient::or_default")]
    pub success: bool,
    #[serde(deserialize_with = "lenient::or_default")]
    pub message: String,
    #[serde(alias = "main_test", skip_serializing_if = "Option::is_none")]
    pub main_llm_test: Option<LlmTestResult>,
    #[serde(alias = "fallback_test", skip_serializing_if = "Option::is_none")]
    pub fallback_llm_test: Option<LlmTestResult>,
    #[serde(alias = "config", skip_serializing_if = "Option::is_none")]
    pub feature: Option<FeatureConfig>,
}

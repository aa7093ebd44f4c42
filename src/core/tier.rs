//! Tier templates
//!
//! Named presets of request limits and default LLMs applied when a
//! subscription is created.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::LlmConfigInput;

/// Provider, model and per-million prices of a template default
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlmPreset {
    pub provider: &'static str,
    pub model: &'static str,
    pub input_price_per_million: f64,
    pub output_price_per_million: f64,
}

impl LlmPreset {
    pub fn to_input(&self) -> LlmConfigInput {
        LlmConfigInput::new(self.provider, self.model)
            .with_prices(self.input_price_per_million, self.output_price_per_million)
    }
}

const GPT_4O_MINI: LlmPreset = LlmPreset {
    provider: "openai",
    model: "gpt-4o-mini",
    input_price_per_million: 0.15,
    output_price_per_million: 0.60,
};

const GPT_4O: LlmPreset = LlmPreset {
    provider: "openai",
    model: "gpt-4o",
    input_price_per_million: 2.50,
    output_price_per_million: 10.00,
};

const CLAUDE_HAIKU: LlmPreset = LlmPreset {
    provider: "anthropic",
    model: "claude-3-5-haiku-latest",
    input_price_per_million: 0.80,
    output_price_per_million: 4.00,
};

const CLAUDE_SONNET: LlmPreset = LlmPreset {
    provider: "anthropic",
    model: "claude-sonnet-4-0",
    input_price_per_million: 3.00,
    output_price_per_million: 15.00,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierTemplate {
    Starter,
    Professional,
    Enterprise,
}

impl TierTemplate {
    pub fn all() -> &'static [TierTemplate] {
        &[
            TierTemplate::Starter,
            TierTemplate::Professional,
            TierTemplate::Enterprise,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TierTemplate::Starter => "starter",
            TierTemplate::Professional => "professional",
            TierTemplate::Enterprise => "enterprise",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TierTemplate::Starter => "Starter",
            TierTemplate::Professional => "Professional",
            TierTemplate::Enterprise => "Enterprise",
        }
    }

    pub fn request_limit(&self) -> u64 {
        match self {
            TierTemplate::Starter => 1_000,
            TierTemplate::Professional => 10_000,
            TierTemplate::Enterprise => 100_000,
        }
    }

    pub fn duration_days(&self) -> i64 {
        match self {
            TierTemplate::Starter | TierTemplate::Professional => 30,
            TierTemplate::Enterprise => 365,
        }
    }

    pub fn main_llm(&self) -> LlmPreset {
        match self {
            TierTemplate::Starter => GPT_4O_MINI,
            TierTemplate::Professional => GPT_4O,
            TierTemplate::Enterprise => CLAUDE_SONNET,
        }
    }

    pub fn fallback_llm(&self) -> Option<LlmPreset> {
        match self {
            TierTemplate::Starter => None,
            TierTemplate::Professional => Some(CLAUDE_HAIKU),
            TierTemplate::Enterprise => Some(GPT_4O),
        }
    }
}

impl FromStr for TierTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "starter" | "basic" => Ok(TierTemplate::Starter),
            "professional" | "pro" => Ok(TierTemplate::Professional),
            "enterprise" => Ok(TierTemplate::Enterprise),
            _ => Err(format!(
                "Unknown tier '{}'. Available: starter, professional, enterprise",
                s
            )),
        }
    }
}

impl std::fmt::Display for TierTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

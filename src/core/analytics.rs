//! Usage and cost analytics

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::lenient;

/// Optional date window for analytics queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl AnalyticsRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(start) = self.start {
            query.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end {
            query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenCounts {
    #[serde(alias = "request_count", deserialize_with = "lenient::or_default")]
    pub requests: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub input_tokens: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub output_tokens: u64,
}

impl TokenCounts {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyUsage {
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(flatten)]
    pub counts: TokenCounts,
}

/// Response of the usage analytics endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageAnalytics {
    #[serde(deserialize_with = "lenient::or_default")]
    pub subscription_key: String,
    #[serde(alias = "total_requests", deserialize_with = "lenient::or_default")]
    pub requests: u64,
    #[serde(alias = "total_input_tokens", deserialize_with = "lenient::or_default")]
    pub input_tokens: u64,
    #[serde(alias = "total_output_tokens", deserialize_with = "lenient::or_default")]
    pub output_tokens: u64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub request_limit: u64,
    #[serde(alias = "feature_usage", deserialize_with = "lenient::or_default")]
    pub by_feature: BTreeMap<String, TokenCounts>,
    #[serde(alias = "daily_usage", deserialize_with = "lenient::or_default")]
    pub daily: Vec<DailyUsage>,
}

impl UsageAnalytics {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn usage_percent(&self) -> Option<f64> {
        if self.request_limit == 0 {
            return None;
        }
        Some((self.requests as f64 / self.request_limit as f64 * 100.0).min(100.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyCost {
    #[serde(deserialize_with = "lenient::or_default")]
    pub date: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub cost: f64,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Response of the cost analytics endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostAnalytics {
    #[serde(deserialize_with = "lenient::or_default")]
    pub subscription_key: String,
    #[serde(alias = "total", deserialize_with = "lenient::or_default")]
    pub total_cost: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(alias = "feature_costs", deserialize_with = "lenient::or_default")]
    pub by_feature: BTreeMap<String, f64>,
    #[serde(alias = "model_costs", deserialize_with = "lenient::or_default")]
    pub by_model: BTreeMap<String, f64>,
    #[serde(alias = "daily_costs", deserialize_with = "lenient::or_default")]
    pub daily: Vec<DailyCost>,
}

impl Default for CostAnalytics {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            total_cost: 0.0,
            currency: default_currency(),
            by_feature: BTreeMap::new(),
            by_model: BTreeMap::new(),
            daily: Vec::new(),
        }
    }
}

impl CostAnalytics {
    /// Cost entries sorted descending
    pub fn ranked(map: &BTreeMap<String, f64>) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        entries
    }

    pub fn format_total(&self) -> String {
        format_money(self.total_cost, &self.currency)
    }
}

pub fn format_money(amount: f64, currency: &str) -> String {
    if currency.eq_ignore_ascii_case("USD") {
        format!("${:.2}", amount)
    } else {
        format!("{:.2} {}", amount, currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accepts_total_aliases_and_nulls() {
        let json = r#"{"total_requests":120,"total_input_tokens":5000,"total_output_tokens":null,
            "request_limit":1000,"feature_usage":{"chat":{"request_count":100,"input_tokens":4000}}}"#;
        let usage: UsageAnalytics = serde_json::from_str(json).unwrap();
        assert_eq!(usage.requests, 120);
        assert_eq!(usage.output_tokens, 0);
        assert_eq!(usage.by_feature["chat"].requests, 100);
        assert_eq!(usage.usage_percent(), Some(12.0));
    }

    #[test]
    fn test_empty_cost_payload_defaults() {
        let cost: CostAnalytics = serde_json::from_str("{}").unwrap();
        assert_eq!(cost.currency, "USD");
        assert_eq!(cost.format_total(), "$0.00");
        assert!(cost.by_model.is_empty());
    }

    #[test]
    fn test_ranked_costs() {
        let cost: CostAnalytics =
            serde_json::from_str(r#"{"total":3.5,"by_model":{"gpt-4o":1.0,"claude":2.5}}"#).unwrap();
        let ranked = CostAnalytics::ranked(&cost.by_model);
        assert_eq!(ranked[0].0, "claude");
        assert_eq!(cost.format_total(), "$3.50");
    }

    #[test]
    fn test_range_query() {
        let range = AnalyticsRange::new(NaiveDate::from_ymd_opt(2026, 1, 1), None);
        assert_eq!(range.query(), vec![("start_date", "2026-01-01".to_string())]);
        assert!(AnalyticsRange::default().query().is_empty());
    }
}

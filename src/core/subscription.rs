//! Subscription models: the server's view, the create form and partial updates

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::form::{check_date_range, is_valid_subdomain, FormError};
use super::lenient;
use super::query::{Page, Searchable};
use super::{LlmConfig, LlmConfigInput, TierTemplate};

fn default_true() -> bool {
    true
}

/// Subscription as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    #[serde(alias = "key", deserialize_with = "lenient::or_default")]
    pub subscription_key: String,
    #[serde(alias = "email", deserialize_with = "lenient::or_default")]
    pub customer_email: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub subdomain: String,
    #[serde(deserialize_with = "lenient::date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::date")]
    pub end_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub request_limit: u64,
    #[serde(
        alias = "request_usage",
        alias = "requests_count",
        deserialize_with = "lenient::or_default"
    )]
    pub requests_used: u64,
    #[serde(alias = "main_llm_config", deserialize_with = "lenient::or_default")]
    pub main_llm: LlmConfig,
    #[serde(
        alias = "fallback_llm_config",
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub fallback_llm: Option<LlmConfig>,
    #[serde(default = "default_true", deserialize_with = "lenient::or_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(deserialize_with = "lenient::datetime", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Derived state for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Expired,
    Exhausted,
}

impl SubscriptionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Exhausted => "exhausted",
        }
    }
}

impl Subscription {
    pub fn remaining_requests(&self) -> u64 {
        self.request_limit.saturating_sub(self.requests_used)
    }

    /// Percent of the request limit consumed, capped at 100
    pub fn usage_percent(&self) -> f64 {
        if self.request_limit == 0 {
            return 0.0;
        }
        (self.requests_used as f64 / self.request_limit as f64 * 100.0).min(100.0)
    }

    pub fn status(&self, today: NaiveDate) -> SubscriptionStatus {
        if !self.is_active {
            SubscriptionStatus::Inactive
        } else if self.end_date.is_some_and(|end| end < today) {
            SubscriptionStatus::Expired
        } else if self.request_limit > 0 && self.requests_used >= self.request_limit {
            SubscriptionStatus::Exhausted
        } else {
            SubscriptionStatus::Active
        }
    }
}

impl Searchable for Subscription {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.subscription_key.as_str(),
            self.customer_email.as_str(),
            self.subdomain.as_str(),
            self.main_llm.provider.as_str(),
            self.main_llm.model.as_str(),
        ];
        if let Some(tier) = &self.tier {
            fields.push(tier.as_str());
        }
        fields
    }
}

/// Accepted shapes of the list endpoint
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionListPayload {
    Wrapped {
        #[serde(alias = "subscriptions", alias = "data")]
        items: Vec<Subscription>,
        #[serde(default, deserialize_with = "lenient::or_default")]
        total: Option<u64>,
    },
    Bare(Vec<Subscription>),
}

impl SubscriptionListPayload {
    /// Items plus the server-reported total, if the payload carried one
    pub fn into_parts(self) -> (Vec<Subscription>, Option<u64>) {
        match self {
            SubscriptionListPayload::Wrapped { items, total } => (items, total),
            SubscriptionListPayload::Bare(items) => (items, None),
        }
    }

    pub fn into_page(self) -> Page<Subscription> {
        let (items, total) = self.into_parts();
        let total = total.unwrap_or(items.len() as u64);
        Page { items, total }
    }
}

/// Payload of `POST /subscriptions/generate`
#[derive(Debug, Clone, Serialize, Validate)]
pub struct SubscriptionCreate {
    #[validate(email(message = "must be a valid email address"))]
    pub customer_email: String,
    #[validate(length(min = 1, max = 63, message = "subdomain is required"))]
    pub subdomain: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1, message = "request limit must be at least 1"))]
    pub request_limit: u64,
    pub main_llm: LlmConfigInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_llm: Option<LlmConfigInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierTemplate>,
}

impl SubscriptionCreate {
    /// Required-field checks run before submission
    pub fn check(&self) -> Result<(), FormError> {
        self.validate().map_err(FormError::fields("subscription"))?;
        if !is_valid_subdomain(&self.subdomain) {
            return Err(FormError::Subdomain(self.subdomain.clone()));
        }
        check_date_range(self.start_date, self.end_date)?;
        self.main_llm.validate().map_err(FormError::fields("main LLM"))?;
        if let Some(fallback) = &self.fallback_llm {
            fallback.validate().map_err(FormError::fields("fallback LLM"))?;
        }
        Ok(())
    }
}

/// Create form as collected from the user; gaps may be filled by a tier
#[derive(Debug, Clone, Default)]
pub struct SubscriptionDraft {
    pub customer_email: String,
    pub subdomain: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub request_limit: Option<u64>,
    pub main_llm: Option<LlmConfigInput>,
    pub fallback_llm: Option<LlmConfigInput>,
    pub tier: Option<TierTemplate>,
}

impl SubscriptionDraft {
    /// Resolve into a checked create payload.
    ///
    /// Explicit values win; the tier supplies the request limit, the end
    /// date (start + duration) and the LLMs that were left empty. Without
    /// a start date the subscription starts `today`.
    pub fn into_create(self, today: NaiveDate) -> Result<SubscriptionCreate, FormError> {
        let start_date = self.start_date.unwrap_or(today);
        let tier = self.tier;

        let end_date = self
            .end_date
            .or_else(|| tier.map(|t| start_date + Duration::days(t.duration_days())))
            .ok_or(FormError::Missing("end_date"))?;
        let request_limit = self
            .request_limit
            .or_else(|| tier.map(|t| t.request_limit()))
            .ok_or(FormError::Missing("request_limit"))?;
        let main_llm = self
            .main_llm
            .or_else(|| tier.map(|t| t.main_llm().to_input()))
            .ok_or(FormError::Missing("main_llm"))?;
        let fallback_llm = self
            .fallback_llm
            .or_else(|| tier.and_then(|t| t.fallback_llm()).map(|p| p.to_input()));

        let create = SubscriptionCreate {
            customer_email: self.customer_email.trim().to_string(),
            subdomain: self.subdomain.trim().to_lowercase(),
            start_date,
            end_date,
            request_limit,
            main_llm,
            fallback_llm,
            tier,
        };
        create.check()?;
        Ok(create)
    }
}

/// Partial update; only set fields are sent
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct SubscriptionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "must be a valid email address"))]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "request limit must be at least 1"))]
    pub request_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_llm: Option<LlmConfigInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_llm: Option<LlmConfigInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl SubscriptionUpdate {
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Default::default()
        }
    }

    pub fn reactivate(new_end_date: Option<NaiveDate>) -> Self {
        Self {
            is_active: Some(true),
            end_date: new_end_date,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.customer_email.is_none()
            && self.subdomain.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.request_limit.is_none()
            && self.main_llm.is_none()
            && self.fallback_llm.is_none()
            && self.is_active.is_none()
    }

    pub fn check(&self) -> Result<(), FormError> {
        if self.is_empty() {
            return Err(FormError::EmptyUpdate);
        }
        self.validate().map_err(FormError::fields("update"))?;
        if let Some(subdomain) = &self.subdomain {
            if !is_valid_subdomain(subdomain) {
                return Err(FormError::Subdomain(subdomain.clone()));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            check_date_range(start, end)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft() -> SubscriptionDraft {
        SubscriptionDraft {
            customer_email: "ops@acme.io".into(),
            subdomain: "acme".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sparse_payload_falls_back_to_defaults() {
        let json = r#"{"key":"k1","request_limit":null,"start_date":"2026-01-01T00:00:00","end_date":"garbage"}"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.subscription_key, "k1");
        assert_eq!(sub.request_limit, 0);
        assert_eq!(sub.start_date, Some(date(2026, 1, 1)));
        assert_eq!(sub.end_date, None);
        assert!(sub.is_active);
        assert!(!sub.main_llm.is_configured());
    }

    #[test]
    fn test_status_precedence() {
        let today = date(2026, 6, 1);
        let mut sub = Subscription {
            request_limit: 100,
            requests_used: 10,
            end_date: Some(date(2026, 12, 31)),
            is_active: true,
            ..Default::default()
        };
        assert_eq!(sub.status(today), SubscriptionStatus::Active);

        sub.requests_used = 100;
        assert_eq!(sub.status(today), SubscriptionStatus::Exhausted);

        sub.end_date = Some(date(2026, 5, 31));
        assert_eq!(sub.status(today), SubscriptionStatus::Expired);

        sub.is_active = false;
        assert_eq!(sub.status(today), SubscriptionStatus::Inactive);
    }

    #[test]
    fn test_usage_percent_caps_at_100() {
        let sub = Subscription {
            request_limit: 50,
            requests_used: 80,
            ..Default::default()
        };
        assert_eq!(sub.usage_percent(), 100.0);
        assert_eq!(sub.remaining_requests(), 0);
    }

    #[test]
    fn test_list_payload_shapes() {
        let wrapped: SubscriptionListPayload =
            serde_json::from_str(r#"{"subscriptions":[{"key":"a"},{"key":"b"}],"total":12}"#).unwrap();
        let page = wrapped.into_page();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 12);

        let bare: SubscriptionListPayload = serde_json::from_str(r#"[{"key":"a"}]"#).unwrap();
        assert_eq!(bare.into_page().total, 1);

        let untotaled: SubscriptionListPayload = serde_json::from_str(r#"{"items":[{"key":"a"}]}"#).unwrap();
        assert_eq!(untotaled.into_parts().1, None);
    }

    #[test]
    fn test_null_llm_prices_do_not_fail_the_row() {
        let json = r#"{"subscription_key":"k1","main_llm":{"provider":"openai","model":"gpt-4o","input_price_per_million":null},"fallback_llm":"unset"}"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.main_llm.label(), "openai/gpt-4o");
        assert_eq!(sub.main_llm.input_price_per_million, 0.0);
        assert!(sub.fallback_llm.is_none());
    }

    #[test]
    fn test_tier_fills_gaps() {
        let mut d = draft();
        d.start_date = Some(date(2026, 1, 1));
        d.tier = Some(TierTemplate::Professional);

        let create = d.into_create(date(2025, 1, 1)).unwrap();
        assert_eq!(create.request_limit, 10_000);
        assert_eq!(create.end_date, date(2026, 1, 31));
        assert_eq!(create.main_llm.model, "gpt-4o");
        assert!(create.fallback_llm.is_some());
    }

    #[test]
    fn test_explicit_values_win_over_tier() {
        let mut d = draft();
        d.tier = Some(TierTemplate::Starter);
        d.request_limit = Some(42);
        d.main_llm = Some(LlmConfigInput::new("mistral", "mistral-large"));

        let create = d.into_create(date(2026, 1, 1)).unwrap();
        assert_eq!(create.request_limit, 42);
        assert_eq!(create.main_llm.provider, "mistral");
        assert_eq!(create.start_date, date(2026, 1, 1));
        assert_eq!(create.end_date, date(2026, 1, 31));
    }

    #[test]
    fn test_missing_fields_without_tier() {
        let err = draft().into_create(date(2026, 1, 1)).unwrap_err();
        assert!(matches!(err, FormError::Missing("end_date")));
    }

    #[test]
    fn test_rejects_bad_email_and_inverted_dates() {
        let mut d = draft();
        d.customer_email = "not-an-email".into();
        d.tier = Some(TierTemplate::Starter);
        assert!(matches!(
            d.into_create(date(2026, 1, 1)),
            Err(FormError::Fields { .. })
        ));

        let mut d = draft();
        d.tier = Some(TierTemplate::Starter);
        d.start_date = Some(date(2026, 5, 1));
        d.end_date = Some(date(2026, 4, 1));
        assert!(matches!(
            d.into_create(date(2026, 1, 1)),
            Err(FormError::DateRange { .. })
        ));
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = SubscriptionUpdate {
            request_limit: Some(500),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"request_limit":500}"#);

        let json = serde_json::to_value(SubscriptionUpdate::deactivate()).unwrap();
        assert_eq!(json, serde_json::json!({"is_active": false}));
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(matches!(
            SubscriptionUpdate::default().check(),
            Err(FormError::EmptyUpdate)
        ));
        assert!(SubscriptionUpdate::reactivate(None).check().is_ok());
    }

    #[test]
    fn test_search_matches_fields_case_insensitively() {
        let sub = Subscription {
            subscription_key: "sk_123".into(),
            customer_email: "Ops@Acme.io".into(),
            subdomain: "acme".into(),
            ..Default::default()
        };
        assert!(sub.matches("acme.io"));
        assert!(sub.matches("SK_1"));
        assert!(!sub.matches("globex"));
    }
}

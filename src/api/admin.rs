//! Admin API facade (`/api/admin/*`)

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::client::{ApiClient, AuthEndpoints};
use super::error::{ApiError, SubmitError};
use crate::core::{
    AnalyticsRange, CostAnalytics, FeatureList, FeatureUpdate, ListSource, Page,
    SaveAndTestResult, SessionCredentials, Subscription, SubscriptionCreate,
    SubscriptionListPayload, SubscriptionUpdate, UsageAnalytics, MAX_PAGE_SIZE,
};
use chrono::NaiveDate;

pub const ADMIN_AUTH: AuthEndpoints = AuthEndpoints {
    login: &["api", "admin", "auth", "login"],
    refresh: &["api", "admin", "auth", "refresh"],
};

/// Safety cap on pages walked by `list_all_subscriptions`
const MAX_FETCH_ALL_PAGES: u32 = 200;

#[derive(Serialize)]
struct AdminLogin<'a> {
    username: &'a str,
    password: &'a str,
}

pub struct AdminApi {
    client: ApiClient,
}

impl AdminApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionCredentials, ApiError> {
        self.client
            .login(&AdminLogin { username, password })
            .await
    }

    pub async fn logout(&self) {
        self.client.logout().await;
    }

    // === Subscriptions ===

    pub async fn list_subscriptions(&self, page: u32, page_size: u32) -> Result<Page<Subscription>, ApiError> {
        Ok(self
            .list_payload(page, page_size)
            .await?
            .map(SubscriptionListPayload::into_page)
            .unwrap_or_default())
    }

    /// Walk every page at the maximum page size.
    ///
    /// With a server-reported `total`, paging continues until that many rows
    /// arrived or a page comes back empty, so a server that caps the page
    /// size below ours is still read to the end. Without one, a short page
    /// ends the walk.
    pub async fn list_all_subscriptions(&self) -> Result<Vec<Subscription>, ApiError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let (items, total) = self
                .list_payload(page, MAX_PAGE_SIZE)
                .await?
                .map(SubscriptionListPayload::into_parts)
                .unwrap_or_default();
            let received = items.len();
            all.extend(items);

            let done = match total {
                Some(total) => received == 0 || all.len() as u64 >= total,
                None => received < MAX_PAGE_SIZE as usize,
            };
            if done || page >= MAX_FETCH_ALL_PAGES {
                break;
            }
            page += 1;
        }
        tracing::debug!("Fetched {} subscriptions across {} page(s)", all.len(), page);
        Ok(all)
    }

    async fn list_payload(&self, page: u32, page_size: u32) -> Result<Option<SubscriptionListPayload>, ApiError> {
        let query = [
            ("page", page.max(1).to_string()),
            ("page_size", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        self.client
            .get(&["api", "admin", "subscriptions", "list"], &query)
            .await
    }

    pub async fn get_subscription(&self, key: &str) -> Result<Subscription, ApiError> {
        let sub: Option<Subscription> = self
            .client
            .get(&["api", "admin", "subscriptions", key], &[])
            .await?;
        Ok(sub.unwrap_or_default())
    }

    pub async fn generate_subscription(&self, form: &SubscriptionCreate) -> Result<Subscription, SubmitError> {
        form.check()?;
        tracing::info!("Creating subscription for {} ({})", form.customer_email, form.subdomain);
        let created: Option<Subscription> = self
            .client
            .post(&["api", "admin", "subscriptions", "generate"], form)
            .await?;
        Ok(created.unwrap_or_default())
    }

    pub async fn update_subscription(
        &self,
        key: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, SubmitError> {
        update.check()?;
        let updated: Option<Subscription> = self
            .client
            .put(&["api", "admin", "subscriptions", key], update)
            .await?;
        Ok(updated.unwrap_or_default())
    }

    /// Soft delete: keeps the record, sets `is_active = false`
    pub async fn deactivate_subscription(&self, key: &str) -> Result<Subscription, SubmitError> {
        tracing::info!("Deactivating subscription {}", key);
        self.update_subscription(key, &SubscriptionUpdate::deactivate()).await
    }

    pub async fn reactivate_subscription(
        &self,
        key: &str,
        new_end_date: Option<NaiveDate>,
    ) -> Result<Subscription, SubmitError> {
        tracing::info!("Reactivating subscription {}", key);
        self.update_subscription(key, &SubscriptionUpdate::reactivate(new_end_date))
            .await
    }

    /// Hard delete
    pub async fn delete_subscription(&self, key: &str) -> Result<(), ApiError> {
        tracing::info!("Deleting subscription {}", key);
        let _: Option<Value> = self
            .client
            .delete(&["api", "admin", "subscriptions", key])
            .await?;
        Ok(())
    }

    // === Analytics ===

    pub async fn usage_analytics(&self, key: &str, range: AnalyticsRange) -> Result<UsageAnalytics, ApiError> {
        let usage: Option<UsageAnalytics> = self
            .client
            .get(&["api", "admin", "analytics", "usage", key], &range.query())
            .await?;
        Ok(usage.unwrap_or_default())
    }

    pub async fn cost_analytics(&self, key: &str, range: AnalyticsRange) -> Result<CostAnalytics, ApiError> {
        let costs: Option<CostAnalytics> = self
            .client
            .get(&["api", "admin", "analytics", "costs", key], &range.query())
            .await?;
        Ok(costs.unwrap_or_default())
    }

    // === Features ===

    pub async fn subscription_features(&self, key: &str) -> Result<FeatureList, ApiError> {
        let features: Option<FeatureList> = self
            .client
            .get(&["api", "admin", "features", "subscription", key], &[])
            .await?;
        Ok(features.unwrap_or_default())
    }

    pub async fn save_and_test_feature(
        &self,
        key: &str,
        feature: &str,
        update: &FeatureUpdate,
    ) -> Result<SaveAndTestResult, SubmitError> {
        update.check()?;
        let result: Option<SaveAndTestResult> = self
            .client
            .put(
                &["api", "admin", "features", "subscription", key, feature, "save-and-test"],
                update,
            )
            .await?;
        Ok(result.unwrap_or_default())
    }
}

#[async_trait]
impl ListSource<Subscription> for AdminApi {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Page<Subscription>, ApiError> {
        self.list_subscriptions(page, page_size).await
    }

    async fn fetch_all(&self) -> Result<Vec<Subscription>, ApiError> {
        self.list_all_subscriptions().await
    }
}

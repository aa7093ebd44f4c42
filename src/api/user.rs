//! User API facade (`/api/user/*`), scoped to the caller's own subscription

use serde::Serialize;

use super::client::{ApiClient, AuthEndpoints};
use super::error::{ApiError, SubmitError};
use crate::core::{
    AnalyticsRange, CostAnalytics, FeatureList, FeatureUpdate, FormError, SaveAndTestResult,
    SessionCredentials, Subscription, UsageAnalytics,
};

pub const USER_AUTH: AuthEndpoints = AuthEndpoints {
    login: &["api", "user", "auth", "login"],
    refresh: &["api", "user", "auth", "refresh"],
};

#[derive(Serialize)]
struct UserLogin<'a> {
    token: &'a str,
}

pub struct UserApi {
    client: ApiClient,
}

impl UserApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Log in with the subscription token issued to the customer
    pub async fn login(&self, token: &str) -> Result<SessionCredentials, SubmitError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(FormError::Missing("token").into());
        }
        Ok(self.client.login(&UserLogin { token }).await?)
    }

    pub async fn logout(&self) {
        self.client.logout().await;
    }

    pub async fn subscription(&self) -> Result<Subscription, ApiError> {
        let sub: Option<Subscription> = self.client.get(&["api", "user", "subscription"], &[]).await?;
        Ok(sub.unwrap_or_default())
    }

    pub async fn usage(&self, range: AnalyticsRange) -> Result<UsageAnalytics, ApiError> {
        let usage: Option<UsageAnalytics> = self
            .client
            .get(&["api", "user", "analytics", "usage"], &range.query())
            .await?;
        Ok(usage.unwrap_or_default())
    }

    pub async fn costs(&self, range: AnalyticsRange) -> Result<CostAnalytics, ApiError> {
        let costs: Option<CostAnalytics> = self
            .client
            .get(&["api", "user", "analytics", "costs"], &range.query())
            .await?;
        Ok(costs.unwrap_or_default())
    }

    pub async fn features(&self) -> Result<FeatureList, ApiError> {
        let features: Option<FeatureList> = self.client.get(&["api", "user", "features"], &[]).await?;
        Ok(features.unwrap_or_default())
    }

    pub async fn save_and_test_feature(
        &self,
        feature: &str,
        update: &FeatureUpdate,
    ) -> Result<SaveAndTestResult, SubmitError> {
        update.check()?;
        let result: Option<SaveAndTestResult> = self
            .client
            .put(&["api", "user", "features", feature, "save-and-test"], update)
            .await?;
        Ok(result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::ScriptedTransport;
    use crate::core::{LlmConfigInput, MemorySessionStorage, SessionStorage};
    use std::sync::Arc;

    fn user(transport: &ScriptedTransport, storage: &MemorySessionStorage) -> UserApi {
        let client = ApiClient::new(
            "http://proxy.test",
            Arc::new(transport.clone()),
            Arc::new(storage.clone()),
            USER_AUTH,
        )
        .unwrap();
        UserApi::new(client)
    }

    #[tokio::test]
    async fn test_token_login_then_expired_access_is_refreshed() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, r#"{"access_token":"A1","refresh_token":"R1","expires_in":3600}"#)
            .respond(401, r#"{"detail":"Access token expired"}"#)
            .respond(200, r#"{"access_token":"A2","refresh_token":"R2","expires_in":3600}"#)
            .respond(200, r#"{"subscription_key":"sk_1","request_limit":1000,"requests_used":250}"#);
        let storage = MemorySessionStorage::new();
        let api = user(&transport, &storage);

        api.login(" abc ").await.unwrap();
        let sub = api.subscription().await.unwrap();
        assert_eq!(sub.subscription_key, "sk_1");
        assert_eq!(sub.usage_percent(), 25.0);

        let requests = transport.requests();
        assert_eq!(requests[0].url, "http://proxy.test/api/user/auth/login");
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"token":"abc"}"#));
        assert_eq!(requests[2].url, "http://proxy.test/api/user/auth/refresh");
        assert_eq!(requests[3].authorization().as_deref(), Some("Bearer A2"));
        assert_eq!(storage.load().unwrap().access_token, "A2");
    }

    #[tokio::test]
    async fn test_blank_token_is_rejected_locally() {
        let transport = ScriptedTransport::new();
        let storage = MemorySessionStorage::new();

        let err = user(&transport, &storage).login("   ").await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(FormError::Missing("token"))));
        assert!(transport.requests().is_empty());
        assert!(storage.load().is_none());
    }

    #[tokio::test]
    async fn test_features_and_save_and_test() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, r#"{"features":{"chat":{"enabled":true}}}"#)
            .respond(200, r#"{"success":false,"message":"Main LLM unreachable","main_llm_test":{"success":false,"error":"timeout"}}"#);
        let storage = MemorySessionStorage::new();
        storage.save(&SessionCredentials::new("A1", "R1", 3600)).unwrap();
        let api = user(&transport, &storage);

        let features = api.features().await.unwrap();
        assert!(features.get("chat").unwrap().enabled);

        let update = FeatureUpdate {
            use_custom_llm: Some(true),
            main_llm: Some(LlmConfigInput::new("openai", "gpt-4o").with_api_key("sk-x")),
            ..Default::default()
        };
        let result = api.save_and_test_feature("chat", &update).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.main_llm_test.unwrap().error.as_deref(), Some("timeout"));
        assert_eq!(
            transport.urls()[1],
            "http://proxy.test/api/user/features/chat/save-and-test"
        );
    }

    #[tokio::test]
    async fn test_empty_feature_update_is_not_sent() {
        let transport = ScriptedTransport::new();
        let storage = MemorySessionStorage::new();
        let api = user(&transport, &storage);

        let err = api
            .save_and_test_feature("chat", &FeatureUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(FormError::EmptyUpdate)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_usage_and_costs() {
        let transport = ScriptedTransport::new();
        transport
            .respond(200, r#"{"total_requests":10,"request_limit":100}"#)
            .respond(200, r#"{"total_cost":1.25}"#);
        let storage = MemorySessionStorage::new();
        storage.save(&SessionCredentials::new("A1", "R1", 3600)).unwrap();
        let api = user(&transport, &storage);

        let usage = api.usage(AnalyticsRange::default()).await.unwrap();
        assert_eq!(usage.usage_percent(), Some(10.0));
        let costs = api.costs(AnalyticsRange::default()).await.unwrap();
        assert_eq!(costs.format_total(), "$1.25");
        assert_eq!(transport.urls()[1], "http://proxy.test/api/user/analytics/costs");
    }
}

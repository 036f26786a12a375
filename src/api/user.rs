//! Profile endpoints.

use super::cache::{Invalidation, ResponseCache, TtlClass};
use super::facade::{logged, require_text, SessionScope};
use super::keys::USER_PROFILE_KEY;
use super::pipeline::{ApiClient, ApiRequest};
use super::scheduler::Priority;
use super::types::{Envelope, ProfileUpdate, UserProfile};
use crate::config::CacheConfig;
use crate::error::ApiError;

#[derive(Debug)]
pub struct UserApi {
    client: ApiClient,
    profile: ResponseCache<String, UserProfile>,
    session: SessionScope,
}

impl UserApi {
    pub fn new(client: ApiClient, cache: &CacheConfig) -> Self {
        Self {
            profile: ResponseCache::new(client.scheduler().clone(), cache),
            session: SessionScope::new(client.tokens()),
            client,
        }
    }

    pub async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        if self.session.moved(self.client.tokens()) {
            self.invalidate_all();
        }
        let client = self.client.clone();
        self.profile
            .get_or_fetch(USER_PROFILE_KEY.to_string(), TtlClass::Long, move || {
                let fetch = client.fetch::<Envelope<UserProfile>>(ApiRequest::get("/user/profile"));
                async move { fetch.await.map(Envelope::into_inner) }
            })
            .await
            .map_err(|err| logged("get_profile", err))
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        if update.is_empty() {
            return Err(ApiError::validation("profile update has no fields to change"));
        }
        if let Some(name) = &update.name {
            require_text(name, "name")?;
        }
        if let Some(email) = &update.email {
            require_text(email, "email")?;
        }
        if update.new_password.is_some() && update.current_password.is_none() {
            return Err(ApiError::validation(
                "current password is required to set a new password",
            ));
        }
        let request = ApiRequest::put("/user/profile").with_json(update)?;
        let updated = self
            .client
            .send::<Envelope<UserProfile>>(Priority::Normal, request)
            .await
            .map_err(|err| logged("update_profile", err))?
            .into_inner();
        self.invalidate_all();
        Ok(updated)
    }

    pub fn invalidate_all(&self) {
        self.profile.invalidate(Invalidation::All);
    }
}

#[cfg(test)]
mod tests {
    use crate::api::ProfileUpdate;
    use crate::error::ApiError;
    use crate::testsupport::{json_response, test_client, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    // Verifies the profile is cached and an update forces a refetch.
    #[tokio::test]
    async fn profile_cached_until_updated() {
        let transport = Arc::new(MockTransport::new(|request| {
            let name = if request.body.is_some() { "Grace" } else { "Ada" };
            Ok(json_response(
                200,
                json!({ "user": { "_id": "u1", "name": name, "email": "a@example.com" } }),
            ))
        }));
        let client = test_client(&transport);
        let user = client.user();

        assert_eq!(user.get_profile().await.expect("get").name, "Ada");
        assert_eq!(user.get_profile().await.expect("cached").name, "Ada");
        assert_eq!(transport.request_count(), 1);

        let updated = user
            .update_profile(&ProfileUpdate {
                name: Some("Grace".into()),
                ..ProfileUpdate::default()
            })
            .await
            .expect("update");
        assert_eq!(updated.name, "Grace");
        user.get_profile().await.expect("refetch");
        assert_eq!(transport.request_count(), 3);
    }

    // Verifies empty or inconsistent updates are rejected locally.
    #[tokio::test]
    async fn invalid_updates_are_rejected_locally() {
        let transport = Arc::new(MockTransport::new(|_| Ok(json_response(200, json!({})))));
        let client = test_client(&transport);
        assert!(matches!(
            client.user().update_profile(&ProfileUpdate::default()).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            client
                .user()
                .update_profile(&ProfileUpdate {
                    new_password: Some("abcdef".into()),
                    ..ProfileUpdate::default()
                })
                .await,
            Err(ApiError::Validation(_))
        ));
        assert_eq!(transport.request_count(), 0);
    }
}

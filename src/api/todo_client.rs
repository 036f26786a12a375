//! Composition root wiring one pipeline into the three façades.

use std::sync::Arc;

use super::auth::AuthApi;
use super::pipeline::ApiClient;
use super::retry::RetryPolicy;
use super::scheduler::{RequestScheduler, SchedulerStats};
use super::tasks::TaskApi;
use super::transport::{ReqwestTransport, Transport};
use super::user::UserApi;
use crate::auth::{token_store_from_config, TokenStore};
use crate::config::Config;
use crate::error::StoreError;

/// Everything a front end needs: one transport, token store, scheduler and
/// refresh coordinator shared by the task, auth and user façades.
#[derive(Debug)]
pub struct TodoClient {
    client: ApiClient,
    tasks: TaskApi,
    auth: AuthApi,
    user: UserApi,
}

impl TodoClient {
    /// Build the production client: `reqwest` transport plus the configured
    /// token store.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let tokens = Arc::new(token_store_from_config(&config.auth)?);
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config.api.timeout()));
        Ok(Self::with_parts(config, transport, tokens))
    }

    pub fn with_parts(
        config: &Config,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
    ) -> Self {
        let scheduler = Arc::new(RequestScheduler::new(&config.scheduler));
        let client = ApiClient::new(
            transport,
            &config.api,
            RetryPolicy::from(&config.retry),
            tokens,
            scheduler,
        );
        Self {
            tasks: TaskApi::new(client.clone(), &config.cache),
            auth: AuthApi::new(client.clone()),
            user: UserApi::new(client.clone(), &config.cache),
            client,
        }
    }

    pub fn tasks(&self) -> &TaskApi {
        &self.tasks
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn user(&self) -> &UserApi {
        &self.user
    }

    pub fn api_client(&self) -> &ApiClient {
        &self.client
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.client.scheduler().stats()
    }

    /// End the session and purge every cached read.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.tasks.invalidate_all();
        self.user.invalidate_all();
    }
}

//! Authenticated request pipeline.
//!
//! One logical request flows through: bearer attachment, in-place retries
//! for transient failures, then a single refresh-and-replay on 401.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::refresh::{AuthRefreshCoordinator, REFRESH_PATH};
use super::retry::{RetryDecision, RetryPolicy};
use super::scheduler::{Priority, RequestScheduler};
use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::auth::TokenStore;
use crate::config::ApiConfig;
use crate::error::ApiError;

const LOGIN_PATH: &str = "/auth/login";

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::validation(format!("request body is not serializable: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    fn is_auth_endpoint(&self) -> bool {
        self.path.starts_with("/auth/")
    }

    /// Login and refresh: a 401 here means the credentials themselves failed.
    fn is_session_endpoint(&self) -> bool {
        self.path == LOGIN_PATH || self.path == REFRESH_PATH
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
    tokens: Arc<TokenStore>,
    retry: RetryPolicy,
    refresh: AuthRefreshCoordinator,
    scheduler: Arc<RequestScheduler>,
}

/// Cheaply cloneable handle to the shared pipeline.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        api: &ApiConfig,
        retry: RetryPolicy,
        tokens: Arc<TokenStore>,
        scheduler: Arc<RequestScheduler>,
    ) -> Self {
        let base_url = api.base_url.trim_end_matches('/').to_string();
        let refresh = AuthRefreshCoordinator::new(
            Arc::clone(&transport),
            &base_url,
            api.timeout(),
            Arc::clone(&tokens),
        );
        Self {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                timeout: api.timeout(),
                tokens,
                retry,
                refresh,
                scheduler,
            }),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.inner.tokens
    }

    pub fn scheduler(&self) -> &Arc<RequestScheduler> {
        &self.inner.scheduler
    }

    pub fn refresh_coordinator(&self) -> &AuthRefreshCoordinator {
        &self.inner.refresh
    }

    /// Run `request` through the pipeline without queuing it.
    pub async fn execute(&self, request: &ApiRequest) -> Result<HttpResponse, ApiError> {
        let bearer = self.inner.tokens.valid_access_token();
        let response = self.send_with_retries(request, bearer.as_deref()).await?;
        if response.status != 401 {
            return into_result(response);
        }

        if request.is_auth_endpoint() {
            if request.is_session_endpoint() {
                self.inner.tokens.clear();
            }
            return into_result(response);
        }

        debug!(path = %request.path, "received 401, awaiting token refresh");
        let token = self.inner.refresh.refreshed_access_token().await?;
        let replay = self.send_with_retries(request, Some(&token)).await?;
        if replay.status == 401 {
            self.inner.tokens.clear();
            return Err(ApiError::authentication(
                "Session expired. Please log in again.",
            ));
        }
        into_result(replay)
    }

    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.json()
    }

    /// Owned future for `request`, suitable for handing to the scheduler or
    /// a cache.
    pub fn fetch<T>(&self, request: ApiRequest) -> impl Future<Output = Result<T, ApiError>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        async move { client.execute_json(&request).await }
    }

    /// Queue `request` at `priority` and decode its JSON body.
    pub async fn send<T>(&self, priority: Priority, request: ApiRequest) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let job = self.fetch(request);
        self.inner.scheduler.enqueue(priority, job).await
    }

    async fn send_with_retries(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let excluded = RetryPolicy::is_excluded(&request.path);
        let mut retries = 0;
        loop {
            let outcome = self
                .inner
                .transport
                .send(self.build_http_request(request, bearer))
                .await;
            let failure = match &outcome {
                Ok(response) if response.is_success() || response.status == 401 => None,
                Ok(response) => Some((Some(response.status), response.retry_after())),
                Err(ApiError::Network { .. }) => Some((None, None)),
                Err(_) => None,
            };
            let Some((status, retry_after)) = failure else {
                return outcome;
            };
            match self
                .inner
                .retry
                .should_retry(status, retries, excluded, retry_after)
            {
                RetryDecision::Retry(delay) => {
                    retries += 1;
                    debug!(
                        method = request.method.as_str(),
                        path = %request.path,
                        status = ?status,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return outcome,
            }
        }
    }

    fn build_http_request(&self, request: &ApiRequest, bearer: Option<&str>) -> HttpRequest {
        let mut http = HttpRequest::new(
            request.method,
            format!("{}{}", self.inner.base_url, request.path),
            self.inner.timeout,
        );
        http.query = request.query.clone();
        http.body = request.body.clone();
        http.headers
            .push(("Accept".to_string(), "application/json".to_string()));
        if let Some(token) = bearer {
            http.headers
                .push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        http
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

fn into_result(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(
            response.status,
            &response.body,
            response.retry_after(),
        ))
    }
}

//! Single-flight access token renewal.
//!
//! The first caller that needs a fresh token moves the coordinator from idle
//! to refreshing and spawns the refresh call; callers arriving meanwhile join
//! the waiter list. All waiters are settled together with one outcome.

use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use super::transport::{HttpRequest, Method, Transport};
use crate::auth::{TokenKind, TokenPair, TokenStore};
use crate::error::ApiError;

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

type Waiter = oneshot::Sender<Result<String, ApiError>>;

enum RefreshState {
    Idle,
    Refreshing(Vec<Waiter>),
}

struct RefreshInner {
    transport: Arc<dyn Transport>,
    refresh_url: String,
    timeout: Duration,
    tokens: Arc<TokenStore>,
    state: Mutex<RefreshState>,
}

/// Ensures at most one refresh call is in flight.
#[derive(Clone)]
pub struct AuthRefreshCoordinator {
    inner: Arc<RefreshInner>,
}

impl AuthRefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        timeout: Duration,
        tokens: Arc<TokenStore>,
    ) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                transport,
                refresh_url: format!("{base_url}{REFRESH_PATH}"),
                timeout,
                tokens,
                state: Mutex::new(RefreshState::Idle),
            }),
        }
    }

    /// Wait for a renewed access token, starting a refresh if none is running.
    ///
    /// On failure the stored tokens are cleared and every waiter receives the
    /// same authentication error.
    pub async fn refreshed_access_token(&self) -> Result<String, ApiError> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut state = self.inner.lock();
            match &mut *state {
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(vec![tx]);
                    true
                }
                RefreshState::Refreshing(waiters) => {
                    waiters.push(tx);
                    false
                }
            }
        };
        if start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run().await });
        }
        rx.await
            .unwrap_or_else(|_| Err(ApiError::authentication("token refresh was interrupted")))
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock(), RefreshState::Refreshing(_))
    }
}

impl std::fmt::Debug for AuthRefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRefreshCoordinator")
            .field("refresh_url", &self.inner.refresh_url)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl RefreshInner {
    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run(&self) {
        let outcome = self.refresh().await;
        match &outcome {
            Ok(_) => info!("access token refreshed"),
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing session");
                self.tokens.clear();
            }
        }
        let waiters = match std::mem::replace(&mut *self.lock(), RefreshState::Idle) {
            RefreshState::Refreshing(waiters) => waiters,
            RefreshState::Idle => Vec::new(),
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn refresh(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .tokens
            .get(TokenKind::Refresh)
            .ok_or_else(|| ApiError::authentication("Session expired. Please log in again."))?;

        let mut request = HttpRequest::new(Method::Post, self.refresh_url.as_str(), self.timeout);
        request.body = Some(json!({ "refreshToken": refresh_token }));
        let response = self.transport.send(request).await.map_err(|err| {
            ApiError::authentication(format!("Unable to refresh session: {err}"))
        })?;
        if !response.is_success() {
            return Err(ApiError::authentication(format!(
                "Session expired. Please log in again. (refresh returned {})",
                response.status
            )));
        }
        let pair: TokenPair = response
            .json()
            .map_err(|err| ApiError::authentication(format!("Invalid refresh response: {err}")))?;
        self.tokens
            .set(&pair.token, pair.refresh_token.clone().into())
            .map_err(|err| {
                ApiError::authentication(format!("Unable to persist refreshed session: {err}"))
            })?;
        Ok(pair.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::HttpResponse;
    use crate::auth::{MemoryStore, RefreshUpdate};
    use crate::testsupport::{jwt_expiring_in, MockTransport};

    fn tokens_with_refresh(refresh: Option<&str>) -> Arc<TokenStore> {
        let tokens = Arc::new(TokenStore::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(300),
        ));
        let update = refresh.map(str::to_string).into();
        tokens.set("stale-access", update).expect("seed");
        tokens
    }

    fn coordinator(transport: Arc<MockTransport>, tokens: Arc<TokenStore>) -> AuthRefreshCoordinator {
        AuthRefreshCoordinator::new(transport, "http://api.test", Duration::from_secs(5), tokens)
    }

    // Verifies concurrent waiters share one refresh call and one new token.
    #[tokio::test]
    async fn concurrent_waiters_share_single_refresh() {
        let fresh = jwt_expiring_in(3600);
        let body = serde_json::json!({ "token": fresh, "refreshToken": "r2" }).to_string();
        let transport = Arc::new(
            MockTransport::new(move |_| Ok(HttpResponse::new(200, body.clone())))
                .with_delay(Duration::from_millis(30)),
        );
        let tokens = tokens_with_refresh(Some("r1"));
        let coordinator = coordinator(Arc::clone(&transport), Arc::clone(&tokens));

        let results = futures::future::join_all(
            (0..4).map(|_| coordinator.refreshed_access_token()),
        )
        .await;
        for result in results {
            assert_eq!(result.as_deref(), Ok(fresh.as_str()));
        }
        assert_eq!(transport.request_count(), 1);
        let request = &transport.requests()[0];
        assert_eq!(request.url, "http://api.test/auth/refresh");
        assert_eq!(request.bearer(), None);
        assert_eq!(
            request.body,
            Some(serde_json::json!({ "refreshToken": "r1" }))
        );
        assert_eq!(tokens.get(TokenKind::Access), Some(fresh));
        assert_eq!(tokens.get(TokenKind::Refresh).as_deref(), Some("r2"));
        assert!(!coordinator.is_refreshing());
    }

    // Verifies a rejected refresh clears tokens and fails every waiter alike.
    #[tokio::test]
    async fn failed_refresh_clears_tokens_and_rejects_all() {
        let transport = Arc::new(
            MockTransport::new(|_| Ok(HttpResponse::new(401, r#"{"message":"bad token"}"#)))
                .with_delay(Duration::from_millis(10)),
        );
        let tokens = tokens_with_refresh(Some("r1"));
        let coordinator = coordinator(Arc::clone(&transport), Arc::clone(&tokens));

        let (a, b) = tokio::join!(
            coordinator.refreshed_access_token(),
            coordinator.refreshed_access_token()
        );
        let a = a.expect_err("refresh should fail");
        assert!(a.is_authentication());
        assert_eq!(Err(a), b);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(tokens.get(TokenKind::Access), None);
        assert_eq!(tokens.get(TokenKind::Refresh), None);
    }

    // Verifies a missing refresh token fails without touching the network.
    #[tokio::test]
    async fn missing_refresh_token_fails_fast() {
        let transport = Arc::new(MockTransport::new(|_| Ok(HttpResponse::new(200, "{}"))));
        let tokens = tokens_with_refresh(None);
        let coordinator = coordinator(Arc::clone(&transport), Arc::clone(&tokens));

        let err = coordinator
            .refreshed_access_token()
            .await
            .expect_err("no refresh token");
        assert!(err.is_authentication());
        assert_eq!(transport.request_count(), 0);
        assert_eq!(tokens.get(TokenKind::Access), None);
    }

    // Verifies a refresh response without a new refresh token keeps the old one.
    #[tokio::test]
    async fn refresh_without_rotation_keeps_refresh_token() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(HttpResponse::new(200, r#"{"accessToken":"a2"}"#))
        }));
        let tokens = tokens_with_refresh(Some("r1"));
        let coordinator = coordinator(transport, Arc::clone(&tokens));

        assert_eq!(coordinator.refreshed_access_token().await.as_deref(), Ok("a2"));
        assert_eq!(tokens.get(TokenKind::Refresh).as_deref(), Some("r1"));

        tokens.set("a3", RefreshUpdate::Keep).expect("set");
        assert_eq!(coordinator.refreshed_access_token().await.as_deref(), Ok("a2"));
    }
}

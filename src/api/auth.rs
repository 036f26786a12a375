//! Session endpoints: login, registration, logout and password reset.

use serde_json::json;
use std::sync::Arc;

use tracing::{info, warn};

use super::facade::{logged, require_id, require_text};
use super::pipeline::{ApiClient, ApiRequest};
use super::scheduler::Priority;
use super::types::{Ack, AuthResponse, Credentials, Registration};
use crate::auth::{TokenKind, TokenStore};
use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn tokens(&self) -> &Arc<TokenStore> {
        self.client.tokens()
    }

    /// Exchange credentials for a session and persist its tokens.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        require_email(&credentials.email)?;
        if credentials.password.is_empty() {
            return Err(ApiError::validation("password is required"));
        }
        let request = ApiRequest::post("/auth/login").with_json(credentials)?;
        let response = self
            .client
            .send::<AuthResponse>(Priority::Normal, request)
            .await
            .map_err(|err| logged("login", err))?;
        self.store_session(&response)?;
        info!("logged in");
        Ok(response)
    }

    /// Create an account. A session is stored when the server issues one.
    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        require_text(&registration.name, "name")?;
        require_email(&registration.email)?;
        require_password(&registration.password)?;
        let request = ApiRequest::post("/auth/register").with_json(registration)?;
        let response = self
            .client
            .send::<AuthResponse>(Priority::Normal, request)
            .await
            .map_err(|err| logged("register", err))?;
        if response.token.is_some() {
            self.store_session(&response)?;
        }
        info!("registered account");
        Ok(response)
    }

    /// End the session. The server call is best effort; local tokens are
    /// always cleared.
    pub async fn logout(&self) {
        let refresh_token = self.tokens().get(TokenKind::Refresh);
        let outcome = match ApiRequest::post("/auth/logout")
            .with_json(&json!({ "refreshToken": refresh_token }))
        {
            Ok(request) => self
                .client
                .send::<serde_json::Value>(Priority::Normal, request)
                .await
                .map(|_| ()),
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(error = %err, "server-side logout failed, clearing local session anyway");
        }
        self.tokens().clear();
        info!("logged out");
    }

    /// Force a token refresh through the shared coordinator.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        self.client
            .refresh_coordinator()
            .refreshed_access_token()
            .await
            .map(|_| ())
            .map_err(|err| logged("refresh_session", err))
    }

    /// True when a usable access token or a refresh token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.tokens().has_valid_access_token() || self.tokens().get(TokenKind::Refresh).is_some()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.tokens().user_id()
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Ack, ApiError> {
        let email = require_email(email)?;
        let request = ApiRequest::post("/auth/forgot-password").with_json(&json!({ "email": email }))?;
        self.client
            .send(Priority::Normal, request)
            .await
            .map_err(|err| logged("forgot_password", err))
    }

    pub async fn validate_reset_token(&self, token: &str) -> Result<Ack, ApiError> {
        let token = require_id(token, "reset token")?;
        self.client
            .send(
                Priority::Normal,
                ApiRequest::get(format!("/auth/reset-password/{token}")),
            )
            .await
            .map_err(|err| logged("validate_reset_token", err))
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<Ack, ApiError> {
        let token = require_id(token, "reset token")?;
        require_password(new_password)?;
        let request = ApiRequest::post("/auth/reset-password")
            .with_json(&json!({ "token": token, "newPassword": new_password }))?;
        self.client
            .send(Priority::Normal, request)
            .await
            .map_err(|err| logged("reset_password", err))
    }

    fn store_session(&self, response: &AuthResponse) -> Result<(), ApiError> {
        let Some(token) = response.token.as_deref().filter(|t| !t.is_empty()) else {
            return Err(ApiError::authentication(
                "Login response did not include an access token.",
            ));
        };
        self.tokens()
            .start_session(token, response.refresh_token.clone().into())
            .map_err(|err| {
                warn!(error = %err, "failed to persist session tokens");
                ApiError::authentication(format!("Unable to save session: {err}"))
            })
    }
}

fn require_email(email: &str) -> Result<&str, ApiError> {
    let email = require_text(email, "email")?;
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::validation("email address is invalid")),
    }
}

fn require_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::api::{Credentials, Registration};
    use crate::auth::TokenKind;
    use crate::error::ApiError;
    use crate::testsupport::{json_response, jwt_with_claims, test_client, MockTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "ada@example.com".into(),
            password: password.into(),
        }
    }

    // Verifies login stores both tokens and exposes the user id.
    #[tokio::test]
    async fn login_persists_session() {
        let access = jwt_with_claims(json!({ "sub": "u-42", "exp": 4_000_000_000u64 }));
        let body = json!({ "token": access, "refreshToken": "r1", "user": { "_id": "u-42", "name": "Ada", "email": "ada@example.com" } });
        let transport = Arc::new(MockTransport::new(move |_| Ok(json_response(200, body.clone()))));
        let client = test_client(&transport);

        assert!(!client.auth().is_authenticated());
        let response = client.auth().login(&credentials("secret1")).await.expect("login");
        assert_eq!(response.user.map(|u| u.name).as_deref(), Some("Ada"));
        assert!(client.auth().is_authenticated());
        assert_eq!(client.auth().current_user_id().as_deref(), Some("u-42"));
        assert_eq!(
            client.api_client().tokens().get(TokenKind::Refresh).as_deref(),
            Some("r1")
        );
        let sent = &transport.requests()[0];
        assert_eq!(
            sent.body,
            Some(json!({ "email": "ada@example.com", "password": "secret1" }))
        );
    }

    // Verifies a rejected login surfaces an authentication error without refresh.
    #[tokio::test]
    async fn rejected_login_is_authentication_error() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(json_response(401, json!({ "message": "Invalid credentials" })))
        }));
        let client = test_client(&transport);
        let err = client
            .auth()
            .login(&credentials("wrong-pass"))
            .await
            .expect_err("401");
        assert_eq!(err, ApiError::authentication("Invalid credentials"));
        assert_eq!(transport.request_count(), 1);
        assert!(!client.auth().is_authenticated());
    }

    // Verifies logout clears tokens even when the server call fails.
    #[tokio::test]
    async fn logout_is_best_effort() {
        let transport = Arc::new(MockTransport::new(|request| {
            if request.url.ends_with("/auth/logout") {
                Ok(json_response(500, json!({ "message": "down" })))
            } else {
                Ok(json_response(200, json!({ "token": "a1", "refreshToken": "r1" })))
            }
        }));
        let client = test_client(&transport);
        client.auth().login(&credentials("secret1")).await.expect("login");

        client.auth().logout().await;
        assert_eq!(client.api_client().tokens().get(TokenKind::Access), None);
        assert_eq!(client.api_client().tokens().get(TokenKind::Refresh), None);
        assert_eq!(
            transport.count_matching(|r| r.url.ends_with("/auth/logout")),
            1,
            "logout is never retried"
        );
    }

    // Verifies registration input checks and the password-reset calls.
    #[tokio::test]
    async fn registration_and_reset_flow() {
        let transport = Arc::new(MockTransport::new(|request| {
            let body = if request.url.ends_with("/auth/register") {
                json!({ "user": { "id": "u1", "name": "Ada", "email": "ada@example.com" } })
            } else {
                json!({ "message": "ok", "valid": true })
            };
            Ok(json_response(200, body))
        }));
        let client = test_client(&transport);
        let auth = client.auth();

        let short = Registration {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "123".into(),
        };
        assert!(matches!(auth.register(&short).await, Err(ApiError::Validation(_))));
        assert!(matches!(
            auth.forgot_password("not-an-email").await,
            Err(ApiError::Validation(_))
        ));
        assert_eq!(transport.request_count(), 0);

        let created = auth
            .register(&Registration {
                password: "long-enough".into(),
                ..short
            })
            .await
            .expect("register");
        assert_eq!(created.user.map(|u| u.id).as_deref(), Some("u1"));
        assert!(!auth.is_authenticated(), "no token issued on register");

        let ack = auth.forgot_password("ada@example.com").await.expect("forgot");
        assert_eq!(ack.message.as_deref(), Some("ok"));
        let valid = auth.validate_reset_token("abc123").await.expect("validate");
        assert_eq!(valid.valid, Some(true));
        auth.reset_password("abc123", "new-secret").await.expect("reset");

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert!(urls[2].ends_with("/auth/reset-password/abc123"));
        assert!(urls[3].ends_with("/auth/reset-password"));
    }
}

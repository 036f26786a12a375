//! Shared test fixtures for config/auth/pipeline test modules.
//!
//! Keeping tiny but reusable helpers here prevents each test module from
//! rebuilding ad-hoc temp dirs, fake tokens and scripted transports.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::api::{HttpRequest, HttpResponse, TodoClient, Transport};
use crate::auth::{MemoryStore, TokenStore};
use crate::config::Config;
use crate::error::ApiError;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!(
            "todo-{prefix}-{}-{millis}-{suffix}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    /// Root directory path for this fixture.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Unsigned JWT-shaped token carrying `claims` as its payload.
pub fn jwt_with_claims(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Token for `user-1` whose `exp` lies `secs` seconds from now.
pub fn jwt_expiring_in(secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    jwt_with_claims(json!({ "id": "user-1", "exp": now + secs }))
}

/// JSON response with the given status.
pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("content-type", "application/json")
}

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync>;

/// Scripted transport: records every request and answers through `handler`.
pub struct MockTransport {
    handler: Handler,
    delay: Duration,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request after `delay`, as a slow server would.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn count_matching(&self, predicate: impl Fn(&HttpRequest) -> bool) -> usize {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|request| predicate(request))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(&request)
    }
}

/// Config pointing at `http://api.test` with millisecond-scale retry delays.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.api.base_url = "http://api.test".to_string();
    config.retry.base_delay_ms = 5;
    config.retry.max_delay_ms = 20;
    config.retry.jitter = 0.0;
    config
}

/// Client over `transport` with in-memory token storage.
pub fn test_client(transport: &Arc<MockTransport>) -> TodoClient {
    let tokens = Arc::new(TokenStore::new(
        Arc::new(MemoryStore::new()),
        Duration::from_secs(300),
    ));
    TodoClient::with_parts(&test_config(), Arc::clone(transport) as Arc<dyn Transport>, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::decode_claims;

    #[test]
    fn temp_dir_fixture_writes_and_resolves_paths() {
        let fixture = TestTempDir::new("fixture");
        let file = fixture.write_text("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(file).unwrap(), "hello");
        assert!(fixture.path().exists());
    }

    #[test]
    fn jwt_helpers_produce_decodable_tokens() {
        let token = jwt_expiring_in(60);
        let claims = decode_claims(&token).expect("claims");
        assert_eq!(claims.subject().as_deref(), Some("user-1"));
        assert!(claims.exp().is_some());
    }

    #[tokio::test]
    async fn mock_transport_records_requests() {
        let transport = MockTransport::new(|_| Ok(json_response(204, json!(null))));
        let request = HttpRequest::new(crate::api::Method::Get, "http://x/y", Duration::from_secs(1));
        let response = transport.send(request).await.expect("send");
        assert_eq!(response.status, 204);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.count_matching(|r| r.url.ends_with("/y")), 1);
    }
}

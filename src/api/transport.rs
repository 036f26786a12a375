//! HTTP transport seam.
//!
//! The pipeline only needs "send this request, give me status, headers and
//! body". [`ReqwestTransport`] is the production implementation; tests
//! substitute scripted transports without touching the network.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use super::retry::parse_retry_after;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One fully-resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn bearer(&self) -> Option<&str> {
        self.header("authorization")?.strip_prefix("Bearer ")
    }
}

/// Response as seen by the pipeline; header names are lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Delay requested by a `Retry-After` header, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.header("retry-after")?)
    }

    /// Decode the body as JSON; an empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|err| ApiError::Status {
            status: self.status,
            code: Some("INVALID_RESPONSE".to_string()),
            message: format!("unexpected response body: {err}"),
        })
    }
}

/// Executes one HTTP exchange.
///
/// Implementations report "no response" failures (connect errors, resets,
/// timeouts) as [`ApiError::Network`] and return every received response,
/// whatever its status, as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            http: build_http_client(default_timeout),
        }
    }
}

/// Build an HTTP client with timeout applied.
fn build_http_client(timeout: Duration) -> reqwest::Client {
    // Fall back to reqwest defaults if builder creation fails for any reason.
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .http
            .request(method, &request.url)
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verifies header lookups ignore case on both request and response.
    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut request = HttpRequest::new(Method::Get, "http://x/tasks", Duration::from_secs(1));
        request
            .headers
            .push(("Authorization".into(), "Bearer abc".into()));
        assert_eq!(request.bearer(), Some("abc"));

        let response = HttpResponse::new(429, "").with_header("Retry-After", "2");
        assert_eq!(response.header("retry-after"), Some("2"));
        assert_eq!(response.retry_after(), Some(Duration::from_secs(2)));
    }

    // Verifies empty bodies decode as JSON null and bad bodies are classified.
    #[test]
    fn json_decoding_handles_empty_and_invalid_bodies() {
        let empty = HttpResponse::new(204, "");
        let unit: () = empty.json().expect("null decodes to unit");
        assert_eq!(unit, ());

        let bad = HttpResponse::new(200, "<html>");
        let err = bad.json::<serde_json::Value>().expect_err("invalid json");
        assert_eq!(err.status_code(), Some(200));
    }

    // Verifies an unparseable URL is reported as bad input, not a network fault.
    #[tokio::test]
    async fn malformed_url_is_a_validation_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(1));
        let request = HttpRequest::new(Method::Get, "not a url/tasks", Duration::from_secs(1));
        let err = transport.send(request).await.expect_err("bad url");
        assert!(matches!(err, ApiError::Validation(_)), "got: {err}");
    }
}

//! Unverified JWT payload decoding.
//!
//! The client never verifies signatures; it only reads `exp` and subject
//! claims to decide whether a token is worth sending.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Subject claim names, in lookup order.
const SUBJECT_CLAIMS: [&str; 3] = ["id", "sub", "userId"];

/// Decoded JWT payload claims.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Expiry as unix seconds, when present and numeric.
    pub fn exp(&self) -> Option<f64> {
        self.0.get("exp").and_then(Value::as_f64)
    }

    /// First non-empty subject identifier among `id`, `sub`, `userId`.
    pub fn subject(&self) -> Option<String> {
        SUBJECT_CLAIMS.iter().find_map(|name| match self.0.get(*name)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// Decode the middle segment of a three-part JWT.
///
/// Returns `None` for anything that is not `header.payload.signature` with a
/// base64url-encoded JSON object payload.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(map) => Some(Claims(map)),
        _ => None,
    }
}

/// True while `now + buffer < exp`; fails closed on malformed tokens.
pub fn is_valid_at(token: &str, now_millis: u128, buffer_millis: u128) -> bool {
    let Some(exp) = decode_claims(token).and_then(|claims| claims.exp()) else {
        return false;
    };
    if !exp.is_finite() || exp <= 0.0 {
        return false;
    }
    let exp_millis = (exp * 1000.0) as u128;
    now_millis.saturating_add(buffer_millis) < exp_millis
}

pub(crate) fn unix_now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

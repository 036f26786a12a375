//! Public auth model types.

use serde::{Deserialize, Serialize};

/// Which of the two persisted tokens to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Storage key under which this token is persisted.
    pub(crate) fn storage_key(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }
}

/// What to do with the refresh token when storing a new access token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshUpdate {
    /// Leave the stored refresh token untouched.
    #[default]
    Keep,
    /// Delete the stored refresh token.
    Clear,
    /// Overwrite the stored refresh token.
    Replace(String),
}

impl From<Option<String>> for RefreshUpdate {
    /// A present value replaces; an absent one keeps the current token.
    fn from(value: Option<String>) -> Self {
        match value {
            Some(token) if !token.trim().is_empty() => Self::Replace(token),
            _ => Self::Keep,
        }
    }
}

/// Token pair returned by login and refresh endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(alias = "accessToken", alias = "access_token")]
    pub token: String,
    #[serde(
        default,
        rename = "refreshToken",
        alias = "refresh_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<String>,
}

//! Core data types for Talecast

use std::fmt;

use crate::http::HttpResponse;

/// Short-lived bearer token for the Reddit API.
///
/// No expiry is tracked. A token is trusted until the platform rejects it.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED; {} chars])", self.0.len())
    }
}

/// A story produced by one generation call, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStory {
    pub title: String,
    pub body: String,
}

impl GeneratedStory {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Both parts must carry text before the story is worth posting.
    pub fn is_publishable(&self) -> bool {
        !self.title.trim().is_empty() && !self.body.trim().is_empty()
    }
}

/// Outcome of one submission, kept only long enough to log it.
#[derive(Debug, Clone)]
pub struct PostResult {
    pub success: bool,
    pub raw_response: Option<HttpResponse>,
    pub error: Option<String>,
}

impl PostResult {
    pub fn succeeded(response: HttpResponse) -> Self {
        Self {
            success: true,
            raw_response: Some(response),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            raw_response: None,
            error: Some(error.into()),
        }
    }
}

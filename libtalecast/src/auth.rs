//! Reddit password-grant token exchange

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::RedditConfig;
use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::http::{HttpClient, HttpRequest};
use crate::types::AccessToken;

/// Scopes needed to read the profile and submit posts.
pub const SCOPES: &str = "read,submit";

/// Body of the token endpoint's reply.
///
/// Reddit answers bad passwords with HTTP 200 and an `error` field, so both
/// fields are optional here.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    expires_in: Option<u64>,
}

pub struct AuthClient {
    http: Arc<dyn HttpClient>,
    token_url: String,
    user_agent: String,
}

/// `Basic base64(client_id:client_secret)`
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let encoded = STANDARD.encode(format!("{}:{}", client_id, client_secret));
    format!("Basic {}", encoded)
}

impl AuthClient {
    pub fn new(http: Arc<dyn HttpClient>, config: &RedditConfig) -> Self {
        Self {
            http,
            token_url: config.auth_url.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// Exchange credentials for a token, reporting why it failed.
    ///
    /// Makes exactly one request; callers own the retry policy.
    pub async fn try_authenticate(&self, credentials: &Credentials) -> Result<AccessToken, AuthError> {
        if let Some(field) = credentials.missing_field() {
            return Err(AuthError::MissingCredential(field));
        }

        let request = HttpRequest::form(
            &self.token_url,
            &[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.password.expose_secret()),
                ("scope", SCOPES),
            ],
        )
        .header(
            "Authorization",
            basic_auth_header(&credentials.client_id, credentials.client_secret.expose_secret()),
        )
        .header("User-Agent", &self.user_agent);

        debug!("Requesting access token for {}", credentials.username);
        let response = self.http.execute(request).await?;

        if !response.is_success() {
            return Err(AuthError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if let Some(reason) = parsed.error {
            return Err(AuthError::Denied(reason));
        }

        match parsed.access_token {
            Some(token) if !token.trim().is_empty() => {
                if let Some(expires_in) = parsed.expires_in {
                    debug!("Token endpoint reports expiry in {}s (not tracked)", expires_in);
                }
                Ok(AccessToken::new(token))
            }
            _ => Err(AuthError::MalformedResponse(
                "missing access_token field".to_string(),
            )),
        }
    }

    /// Exchange credentials for a token; failures are logged and become `None`.
    pub async fn authenticate(&self, credentials: &Credentials) -> Option<AccessToken> {
        match self.try_authenticate(credentials).await {
            Ok(token) => {
                info!("Obtained a new access token for {}", credentials.username);
                Some(token)
            }
            Err(e) => {
                error!("Token generation failed: {}", e);
                None
            }
        }
    }
}

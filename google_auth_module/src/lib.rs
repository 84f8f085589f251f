//! Google OAuth 2.0 token management.
//!
//! Shared by the Gmail, Vertex AI, and Firestore clients. Supports the OAuth
//! refresh-token flow and a pre-generated access token for environments
//! without network access to the token endpoint.

use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Default Google OAuth token endpoint.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Buffer subtracted from token lifetime so callers never hold an
/// about-to-expire token across a request.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Google OAuth credentials and cached access token.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    inner: Arc<RwLock<GoogleAuthInner>>,
}

#[derive(Debug)]
struct GoogleAuthInner {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    access_token: Option<String>,
    token_expires_at: Option<Instant>,
}

/// Configuration for Google OAuth.
#[derive(Debug, Clone, Default)]
pub struct GoogleAuthConfig {
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    pub client_secret: Option<String>,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// Pre-generated access token (for sandbox environments without network access)
    pub access_token: Option<String>,
}

impl GoogleAuthConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            refresh_token: std::env::var("GOOGLE_REFRESH_TOKEN").ok(),
            access_token: std::env::var("GOOGLE_ACCESS_TOKEN").ok(),
        }
    }

    /// Check if the configuration carries enough credentials to mint tokens.
    pub fn is_valid(&self) -> bool {
        // A pre-generated access token is valid on its own
        self.access_token.is_some()
            || (self.client_id.is_some()
                && self.client_secret.is_some()
                && self.refresh_token.is_some())
    }
}

/// Error types for Google authentication. Authentication failure is fatal
/// for a triage pass; callers surface it to the operator.
#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("json error: {0}")]
    Json(String),
}

impl GoogleAuth {
    /// Create a new GoogleAuth instance from configuration.
    pub fn new(config: GoogleAuthConfig) -> Result<Self, GoogleAuthError> {
        if !config.is_valid() {
            return Err(GoogleAuthError::MissingCredentials(
                "either GOOGLE_ACCESS_TOKEN or (GOOGLE_CLIENT_ID + GOOGLE_CLIENT_SECRET + GOOGLE_REFRESH_TOKEN) must be set".to_string(),
            ));
        }

        // Pre-generated tokens are assumed valid for one hour
        let (access_token, token_expires_at) = match config.access_token {
            Some(ref token) => (
                Some(token.clone()),
                Some(Instant::now() + Duration::from_secs(3600)),
            ),
            None => (None, None),
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(GoogleAuthInner {
                client_id: config.client_id,
                client_secret: config.client_secret,
                refresh_token: config.refresh_token,
                access_token,
                token_expires_at,
            })),
        })
    }

    /// Create a new GoogleAuth instance from environment variables.
    pub fn from_env() -> Result<Self, GoogleAuthError> {
        Self::new(GoogleAuthConfig::from_env())
    }

    /// Get a valid access token, refreshing if necessary.
    pub fn get_access_token(&self) -> Result<String, GoogleAuthError> {
        {
            let inner = self.inner.read().unwrap();
            if let (Some(token), Some(expires_at)) = (&inner.access_token, &inner.token_expires_at)
            {
                if *expires_at > Instant::now() + EXPIRY_BUFFER {
                    return Ok(token.clone());
                }
            }
        }

        self.refresh_access_token()
    }

    /// Force refresh the access token via the OAuth refresh-token flow.
    pub fn refresh_access_token(&self) -> Result<String, GoogleAuthError> {
        let (client_id, client_secret, refresh_token) = {
            let inner = self.inner.read().unwrap();
            match (&inner.client_id, &inner.client_secret, &inner.refresh_token) {
                (Some(id), Some(secret), Some(token)) => {
                    (id.clone(), secret.clone(), token.clone())
                }
                _ => {
                    return Err(GoogleAuthError::MissingCredentials(
                        "no refresh credentials available and cached token expired".to_string(),
                    ))
                }
            }
        };

        debug!("refreshing Google OAuth token");

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(token_uri())
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .map_err(|e| GoogleAuthError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("OAuth token refresh failed: {} - {}", status, body);
            return Err(GoogleAuthError::TokenRefreshFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let token_response: OAuthTokenResponse = response
            .json()
            .map_err(|e| GoogleAuthError::Json(e.to_string()))?;

        let expires_at = Instant::now() + Duration::from_secs(token_response.expires_in as u64);
        let access_token = token_response.access_token.clone();

        {
            let mut inner = self.inner.write().unwrap();
            inner.access_token = Some(token_response.access_token);
            inner.token_expires_at = Some(expires_at);
        }

        debug!("Google OAuth token refreshed");
        Ok(access_token)
    }
}

/// Token endpoint, overridable for tests.
fn token_uri() -> String {
    std::env::var("GOOGLE_TOKEN_URI").unwrap_or_else(|_| DEFAULT_TOKEN_URI.to_string())
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: Option<String>,
    #[allow(dead_code)]
    scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        let empty_config = GoogleAuthConfig::default();
        assert!(!empty_config.is_valid());

        let oauth_config = GoogleAuthConfig {
            client_id: Some("client_id".to_string()),
            client_secret: Some("client_secret".to_string()),
            refresh_token: Some("refresh_token".to_string()),
            access_token: None,
        };
        assert!(oauth_config.is_valid());

        let pregenerated_config = GoogleAuthConfig {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            access_token: Some("ya29.token".to_string()),
        };
        assert!(pregenerated_config.is_valid());

        let partial_config = GoogleAuthConfig {
            client_id: Some("client_id".to_string()),
            client_secret: None,
            refresh_token: Some("refresh_token".to_string()),
            access_token: None,
        };
        assert!(!partial_config.is_valid());
    }

    #[test]
    fn missing_credentials_rejected_at_construction() {
        let err = GoogleAuth::new(GoogleAuthConfig::default()).unwrap_err();
        assert!(matches!(err, GoogleAuthError::MissingCredentials(_)));
    }

    #[test]
    fn pregenerated_token_served_without_refresh() {
        let auth = GoogleAuth::new(GoogleAuthConfig {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            access_token: Some("ya29.pregenerated".to_string()),
        })
        .unwrap();

        let token = auth.get_access_token().unwrap();
        assert_eq!(token, "ya29.pregenerated");
    }
}

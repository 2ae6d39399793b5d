//! OAuth2 client-credentials token acquisition.
//!
//! A single POST to the tenant's v2.0 token endpoint. There is no retry and
//! no refresh: the token is fetched once per process run and handed to the
//! log submitter.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::client::build_http_client;
use crate::config::{Config, Credentials};

/// Public Azure cloud authority.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default scope of the Azure Monitor resource.
pub const MONITOR_SCOPE: &str = "https://monitor.azure.com//.default";

const GRANT_TYPE: &str = "client_credentials";

/// Bearer token returned by the authority.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in: None,
        }
    }

    /// The raw bearer value.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Lifetime reported by the authority, if any. Not tracked after issue.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in.map(Duration::from_secs)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,

    #[serde(default)]
    expires_in: Option<u64>,

    #[serde(default)]
    token_type: Option<String>,
}

/// Errors that can occur while acquiring a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The authority answered with something other than 200
    #[error("Failed to get access token. Response code: {code}")]
    Status { code: StatusCode, body: String },

    /// The request never produced a response
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 200 response without a usable `access_token`
    #[error("Failed to parse token response: {0}")]
    Parse(String),

    /// The HTTP client could not be built
    #[error("Client configuration error: {0}")]
    Client(String),
}

impl TokenError {
    /// Status code observed from the authority, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TokenError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Client for the OAuth2 token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    client: Client,
    authority_host: String,
}

impl TokenClient {
    /// Create a token client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, TokenError> {
        Self::with_authority(config.authority_host.clone(), config.request_timeout)
    }

    /// Create a token client for an explicit authority host.
    ///
    /// Useful for sovereign clouds and for pointing at a local test server.
    pub fn with_authority(
        authority_host: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, TokenError> {
        let client = build_http_client(timeout).map_err(|e| TokenError::Client(e.to_string()))?;
        let authority_host = authority_host.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            authority_host,
        })
    }

    /// Token endpoint URL for the given tenant.
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant_id)
    }

    /// Exchange the credentials for a bearer token.
    ///
    /// Exactly one request is made. Anything other than HTTP 200 with an
    /// `access_token` field fails immediately.
    pub async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken, TokenError> {
        let url = self.token_url(&credentials.tenant_id);

        debug!(
            url = %url,
            app_id = %credentials.app_id,
            "Requesting access token"
        );

        let form = [
            ("client_id", credentials.app_id.as_str()),
            ("scope", MONITOR_SCOPE),
            ("client_secret", credentials.app_secret()),
            ("grant_type", GRANT_TYPE),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            error!(status = %status, "Token request rejected");
            return Err(TokenError::Status { code: status, body });
        }

        let body = response.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| TokenError::Parse(e.to_string()))?;

        info!(
            token_type = parsed.token_type.as_deref().unwrap_or("unknown"),
            expires_in_secs = ?parsed.expires_in,
            "Access token acquired"
        );

        Ok(AccessToken {
            secret: parsed.access_token,
            expires_in: parsed.expires_in,
        })
    }
}

/// Acquire a token from the public cloud authority with transport defaults.
pub async fn acquire_token(credentials: &Credentials) -> Result<AccessToken, TokenError> {
    TokenClient::with_authority(DEFAULT_AUTHORITY_HOST, None)?
        .acquire_token(credentials)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_url() {
        let client = TokenClient::with_authority(DEFAULT_AUTHORITY_HOST, None).unwrap();
        assert_eq!(
            client.token_url("contoso"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_token_url_trims_authority_slash() {
        let client = TokenClient::with_authority("http://127.0.0.1:9999/", None).unwrap();
        assert_eq!(
            client.token_url("t"),
            "http://127.0.0.1:9999/t/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "token_type": "Bearer",
            "expires_in": 3599,
            "ext_expires_in": 3599,
            "access_token": "eyJ0eXAi"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "eyJ0eXAi");
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_token_response_requires_access_token() {
        let json = r#"{"token_type": "Bearer"}"#;
        assert!(serde_json::from_str::<TokenResponse>(json).is_err());
    }

    #[test]
    fn test_access_token_debug_redacts_secret() {
        let token = AccessToken::new("very-secret-bearer");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("very-secret-bearer"));
        assert_eq!(token.secret(), "very-secret-bearer");
        assert!(token.expires_in().is_none());
    }

    #[test]
    fn test_token_error_status() {
        let err = TokenError::Status {
            code: StatusCode::UNAUTHORIZED,
            body: "invalid_client".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(err.to_string().contains("401"));

        let err = TokenError::Parse("missing field".to_string());
        assert_eq!(err.status(), None);
    }
}

//! Configuration module for the log ingestion tool.
//!
//! Everything is read once from the process environment at startup: the
//! client credentials used for the token exchange, the Data Collection Rule
//! target the log is posted to, and a couple of optional overrides.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::client::IngestTarget;
use crate::token::DEFAULT_AUTHORITY_HOST;

/// Directory (tenant) ID of the app registration.
pub const TENANT_ID_VAR: &str = "tenantId";

/// Application (client) ID of the app registration.
pub const APP_ID_VAR: &str = "appId";

/// Client secret of the app registration.
pub const APP_SECRET_VAR: &str = "appSecret";

/// Data Collection Endpoint base URI.
pub const ENDPOINT_URI_VAR: &str = "endpointUri";

/// Immutable ID of the Data Collection Rule.
pub const DCR_ID_VAR: &str = "dcrId";

/// Custom table name without the `Custom-` prefix and `_CL` suffix.
pub const LOG_TYPE_VAR: &str = "logType";

/// Optional override of the token authority host.
pub const AUTHORITY_HOST_VAR: &str = "authorityHost";

/// Optional per-request HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_VAR: &str = "requestTimeoutSecs";

/// Client credentials for the OAuth2 client-credentials grant.
///
/// The secret is never printed by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Directory (tenant) identifier
    pub tenant_id: String,

    /// Application (client) identifier
    pub app_id: String,

    app_secret: String,
}

impl Credentials {
    pub fn new(
        tenant_id: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    /// Read `tenantId`, `appId` and `appSecret` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            tenant_id: required(&lookup, TENANT_ID_VAR)?,
            app_id: required(&lookup, APP_ID_VAR)?,
            app_secret: required(&lookup, APP_SECRET_VAR)?,
        })
    }

    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for a single ingestion run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credentials exchanged for the bearer token
    pub credentials: Credentials,

    /// Where the log body is posted
    pub target: IngestTarget,

    /// Base URL of the OAuth2 authority, without the tenant segment
    pub authority_host: String,

    /// Per-request timeout; `None` keeps the transport default
    pub request_timeout: Option<Duration>,
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent
    #[error("Configuration error: required environment variable {0} is not set")]
    Missing(&'static str),

    /// A variable is present but unusable
    #[error("Configuration error for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    /// Name of the offending environment variable.
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigError::Missing(var) => var,
            ConfigError::Invalid { var, .. } => var,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - any of `tenantId`, `appId`, `appSecret`, `endpointUri`, `dcrId`,
    ///   `logType` is missing or blank
    /// - `requestTimeoutSecs` is set but is not a positive integer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use law_ingest::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Stream URL: {}", config.target.stream_url());
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::from_lookup(&lookup)?;

        let target = IngestTarget::new(
            required(&lookup, ENDPOINT_URI_VAR)?,
            required(&lookup, DCR_ID_VAR)?,
            required(&lookup, LOG_TYPE_VAR)?,
        );

        let authority_host = lookup(AUTHORITY_HOST_VAR)
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());

        let request_timeout = Self::parse_request_timeout(&lookup)?;

        Ok(Self {
            credentials,
            target,
            authority_host,
            request_timeout,
        })
    }

    fn parse_request_timeout<F>(lookup: &F) -> Result<Option<Duration>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(value) = lookup(REQUEST_TIMEOUT_VAR) else {
            return Ok(None);
        };

        let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: REQUEST_TIMEOUT_VAR,
            message: format!("'{}' is not a valid number", value),
        })?;

        if secs == 0 {
            return Err(ConfigError::Invalid {
                var: REQUEST_TIMEOUT_VAR,
                message: "timeout must be greater than 0".to_string(),
            });
        }

        Ok(Some(Duration::from_secs(secs)))
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(var).ok_or(ConfigError::Missing(var))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            var,
            message: "value must not be empty".to_string(),
        });
    }
    Ok(value)
}

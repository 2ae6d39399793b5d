//! Log ingestion library
//!
//! Submits a structured log to an Azure Monitor Data Collection Rule stream:
//!
//! - **config**: Environment-based configuration (credentials, target, overrides)
//! - **token**: OAuth2 client-credentials token acquisition
//! - **client**: Log submission with bounded linear retry
//! - **error**: Crate-level error type
//!
//! # Example
//!
//! ```no_run
//! use law_ingest::config::Config;
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let log = json!([{ "TimeGenerated": "2024-01-01T00:00:00Z", "Message": "hello" }]);
//!
//!     law_ingest::run(&config, &log).await.expect("Log not delivered");
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod token;

pub use client::{
    submit_log, AttemptFailure, IngestResponse, IngestTarget, LogClient, RetryPolicy, SubmitError,
};
pub use config::{Config, ConfigError, Credentials};
pub use error::Error;
pub use token::{acquire_token, AccessToken, TokenClient, TokenError};

use serde::Serialize;

/// Acquire a token, then submit `log` to the configured stream.
///
/// The token is fetched exactly once. If that fails nothing is submitted.
pub async fn run<T>(config: &Config, log: &T) -> Result<IngestResponse, Error>
where
    T: Serialize + ?Sized,
{
    let token = TokenClient::new(config)?
        .acquire_token(&config.credentials)
        .await?;

    let response = LogClient::new(config)?
        .submit(&config.target, &token, log)
        .await?;

    Ok(response)
}

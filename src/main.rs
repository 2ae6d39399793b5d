//! law-ingest - submit one log to Azure Monitor Logs Ingestion
//!
//! Acquires an access token with the client-credentials grant, reads a JSON
//! log body from standard input and posts it to a Data Collection Rule
//! stream, retrying up to three times.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `tenantId`, `appId`, `appSecret`: app registration credentials (required)
//! - `endpointUri`: Data Collection Endpoint base URI (required)
//! - `dcrId`: Data Collection Rule immutable ID (required)
//! - `logType`: custom table name, posted to `Custom-{logType}_CL` (required)
//! - `authorityHost`: token authority (default: https://login.microsoftonline.com)
//! - `requestTimeoutSecs`: per-request HTTP timeout (default: none)
//! - `RUST_LOG`: Logging level filter (default: info)

use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use law_ingest::config::Config;
use law_ingest::Error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                tenant_id = %config.credentials.tenant_id,
                app_id = %config.credentials.app_id,
                stream_url = %config.target.stream_url(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let log = match read_log_body().await {
        Ok(log) => log,
        Err(e) => {
            error!(error = %e, "Failed to read log body from stdin");
            std::process::exit(1);
        }
    };

    match law_ingest::run(&config, &log).await {
        Ok(response) => {
            info!(
                status = %response.status,
                attempts = response.attempts,
                "Log delivered"
            );
        }
        Err(e) => {
            error!(error = %e, "Log not delivered");
            std::process::exit(1);
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn read_log_body() -> Result<serde_json::Value, Error> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .map_err(|e| Error::Input(e.to_string()))?;

    parse_log_body(&raw)
}

fn parse_log_body(raw: &str) -> Result<serde_json::Value, Error> {
    if raw.trim().is_empty() {
        return Err(Error::Input("stdin was empty".to_string()));
    }
    serde_json::from_str(raw).map_err(|e| Error::Input(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_body() {
        let log = parse_log_body(r#"[{"Message": "disk full", "Level": "error"}]"#).unwrap();
        assert_eq!(log[0]["Message"], "disk full");
    }

    #[test]
    fn test_parse_empty_log_body() {
        let err = parse_log_body("  \n").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_parse_invalid_log_body() {
        assert!(matches!(parse_log_body("{not json"), Err(Error::Input(_))));
    }
}



use std::time::Duration;

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::HelixSettings;


const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10_000;


#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Query {0} timed out after {1:?}")]
    Timeout(String, Duration),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}

impl HelixClientError {
    /// Whether the failure says the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(..) | Self::RetryExhausted(..) => true,
            Self::Helix(e) => {
                let msg = e.to_string().to_lowercase();
                msg.contains("connect") || msg.contains("refused") || msg.contains("timed out")
            }
            Self::Query(_) | Self::Serialization(_) => false,
        }
    }
}


/// Named-query client for HelixDB with per-attempt timeout and exponential backoff.
pub struct HelixClient {
    inner: HelixDB,
    base_url: String,
    max_retries: u32,
    attempt_timeout: Duration,
}

impl HelixClient {
    pub fn new(settings: &HelixSettings) -> Self {
        let endpoint = format!("http://{}", settings.host);
        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(settings.port), None);

        info!("HelixClient created for {}", settings.base_url());

        Self {
            inner,
            base_url: settings.base_url(),
            max_retries: settings.max_retries.max(1),
            attempt_timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        }
    }

    pub async fn execute_query<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 1..=self.max_retries {
            debug!("Executing query: {} (attempt {})", query_name, attempt);

            let err = match self.execute_query_no_retry::<T, P>(query_name, params).await {
                Ok(result) => {
                    debug!("Query {} succeeded", query_name);
                    return Ok(result);
                }
                Err(e) => e,
            };

            let err_str = err.to_string();
            if err_str.contains("not found") || err_str.contains("No value") {
                debug!("Query {} returned not found", query_name);
                return Err(HelixClientError::Query(err_str));
            }

            debug!("Query {} failed (attempt {}/{}): {}", query_name, attempt, self.max_retries, err_str);
            last_error = Some(err_str);

            if attempt < self.max_retries {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
            }
        }

        Err(HelixClientError::RetryExhausted(
            self.max_retries,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    pub async fn execute_query_no_retry<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        match tokio::time::timeout(self.attempt_timeout, self.inner.query::<P, T>(query_name, params)).await {
            Ok(result) => result.map_err(HelixClientError::from),
            Err(_) => Err(HelixClientError::Timeout(query_name.to_string(), self.attempt_timeout)),
        }
    }

    pub async fn health_check(&self) -> Result<(), HelixClientError> {
        match self.execute_query_no_retry::<serde_json::Value, _>("health", &serde_json::json!({})).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                // An unknown-query answer still proves the server is up.
                if err_str.contains("404") || err_str.contains("not found") || err_str.contains("couldn't find") {
                    info!("Health check passed (server alive, no health query)");
                    Ok(())
                } else {
                    Err(HelixClientError::Connection(e.to_string()))
                }
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for HelixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelixClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HelixClient::new(&HelixSettings::default());
        assert_eq!(client.base_url(), "http://localhost:6969");
        assert_eq!(client.max_retries, 3);
    }

    #[test]
    fn test_zero_retries_clamped() {
        let settings = HelixSettings {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(HelixClient::new(&settings).max_retries, 1);
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(HelixClientError::Connection("refused".into()).is_unreachable());
        assert!(HelixClientError::Timeout("getNeighborhood".into(), Duration::from_secs(1)).is_unreachable());
        assert!(!HelixClientError::Query("bad params".into()).is_unreachable());
    }
}

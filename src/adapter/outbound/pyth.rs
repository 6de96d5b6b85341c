//! Pyth Hermes price service client.
//!
//! Fetches the latest signed price update for a feed as hex-encoded VAA
//! bytes, ready to pass to `executeOffchainDelayedOrder`.

use std::time::Duration;

use alloy_primitives::hex;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{OracleError, Result};
use crate::port::PriceOracle;

/// First retry delay; doubled on every further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct HermesClient {
    client: Client,
    endpoint: Url,
    max_retries: u32,
}

#[derive(Deserialize)]
struct LatestUpdates {
    binary: BinaryUpdate,
}

#[derive(Deserialize)]
struct BinaryUpdate {
    data: Vec<String>,
}

impl HermesClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Url, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            max_retries,
        })
    }

    fn latest_url(&self, feed_id: &str) -> Result<Url> {
        let mut url = self.endpoint.join("v2/updates/price/latest")?;
        url.query_pairs_mut()
            .append_pair("ids[]", feed_id)
            .append_pair("encoding", "hex");
        Ok(url)
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<LatestUpdates, OracleError> {
        let request = |e: reqwest::Error| OracleError::Request(e.to_string());
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(request)?
            .error_for_status()
            .map_err(request)?
            .json::<LatestUpdates>()
            .await
            .map_err(request)
    }
}

/// Decode hex-encoded update blobs, with or without `0x` prefix.
fn decode_updates(feed_id: &str, data: &[String]) -> Result<Vec<Vec<u8>>> {
    if data.is_empty() {
        return Err(OracleError::EmptyPayload {
            feed_id: feed_id.to_string(),
        }
        .into());
    }
    data.iter()
        .map(|blob| {
            hex::decode(blob).map_err(|e| OracleError::InvalidPayload(e.to_string()).into())
        })
        .collect()
}

#[async_trait]
impl PriceOracle for HermesClient {
    async fn price_update_payload(&self, feed_id: &str) -> Result<Vec<Vec<u8>>> {
        let url = self.latest_url(feed_id)?;
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.fetch_once(&url).await {
                Ok(updates) => {
                    debug!(
                        feed_id,
                        attempt,
                        blobs = updates.binary.data.len(),
                        "Fetched price update"
                    );
                    return decode_updates(feed_id, &updates.binary.data);
                }
                Err(e) => {
                    warn!(feed_id, attempt, error = %e, "Price update request failed");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(BASE_BACKOFF * 2u32.saturating_pow(attempt - 1)).await;
            }
        }

        Err(OracleError::Exhausted {
            attempts,
            last_error,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";

    #[test]
    fn latest_url_carries_feed_and_encoding() {
        let client = HermesClient::new(
            Url::parse("https://hermes.pyth.network/").unwrap(),
            Duration::from_secs(3),
            5,
        )
        .unwrap();

        let url = client.latest_url(FEED).unwrap();

        assert_eq!(url.path(), "/v2/updates/price/latest");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("ids[]".to_string(), FEED.to_string())));
        assert!(pairs.contains(&("encoding".to_string(), "hex".to_string())));
    }

    #[test]
    fn decodes_prefixed_and_bare_hex() {
        let blobs = decode_updates(FEED, &["0x0102".into(), "ff".into()]).unwrap();
        assert_eq!(blobs, vec![vec![1, 2], vec![255]]);
    }

    #[test]
    fn empty_update_list_is_an_error() {
        let err = decode_updates(FEED, &[]).unwrap_err();
        assert!(err.to_string().contains("no update data"));
    }

    #[test]
    fn response_body_parses() {
        let body = r#"{"binary":{"encoding":"hex","data":["504e4155"]},"parsed":[]}"#;
        let parsed: LatestUpdates = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.binary.data, vec!["504e4155"]);
    }

    #[tokio::test]
    async fn unreachable_service_exhausts_retries() {
        let client = HermesClient::new(
            Url::parse("http://127.0.0.1:9/").unwrap(),
            Duration::from_millis(100),
            1,
        )
        .unwrap();

        let err = client.price_update_payload(FEED).await.unwrap_err();

        assert!(matches!(
            err,
            crate::error::Error::Oracle(OracleError::Exhausted { attempts: 2, .. })
        ));
    }
}

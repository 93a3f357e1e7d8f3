use std::{ fmt, net::IpAddr, time::Duration };

use async_trait::async_trait;
use moka::sync::Cache;
use reqwest::Client;
use serde_derive::Deserialize;
use tracing::{ debug, trace };

/// Fixed lookback window sent with every check.
const MAX_AGE_DAYS: u16 = 90;
/// Per-call ceiling on top of the transport's own timeout.
const CHECK_MAX_SECONDS: u64 = 10;

/// Soft failure for a single lookup. Logged and degraded to an unknown
/// observation by the caller, never fatal to a batch.
#[derive(Debug)]
pub enum LookupError {
    /// Network error, timeout, or non-success status.
    Transport(String),
    /// Success status but unparseable payload.
    Malformed(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Transport(msg) => write!(f, "transport error: {}", msg),
            LookupError::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for LookupError {}

#[async_trait]
pub trait ReputationChecker: Send + Sync {
    async fn check(&self, ip: IpAddr) -> Result<f64, LookupError>;
}

#[derive(Deserialize)]
struct CheckResponse {
    data: CheckData,
}

#[derive(Deserialize)]
struct CheckData {
    #[serde(rename = "abuseConfidenceScore")]
    abuse_confidence_score: f64,
}

/// Client for the AbuseIPDB check endpoint.
pub struct AbuseIpDb {
    client: Client,
    url: String,
    api_key: String,
    cache: Cache<IpAddr, f64>,
}

impl AbuseIpDb {
    pub fn new(client: Client, url: &str, api_key: &str) -> AbuseIpDb {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(30 * 60))
            .time_to_idle(Duration::from_secs(5 * 60))
            .build();
        AbuseIpDb {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
            cache,
        }
    }

    async fn query(&self, ip: IpAddr) -> Result<f64, LookupError> {
        debug!(%ip, "querying reputation service");
        let resp = self.client
            .get(&self.url)
            .query(
                &[
                    ("ipAddress", ip.to_string()),
                    ("maxAgeInDays", MAX_AGE_DAYS.to_string()),
                ]
            )
            .header("Key", &self.api_key)
            .header("Accept", "application/json")
            .send().await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(LookupError::Transport(format!("server returned {}", resp.status())));
        }
        let text = resp
            .text().await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let parsed: CheckResponse = serde_json
            ::from_str(&text)
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        Ok(parsed.data.abuse_confidence_score)
    }
}

#[async_trait]
impl ReputationChecker for AbuseIpDb {
    async fn check(&self, ip: IpAddr) -> Result<f64, LookupError> {
        if let Some(score) = self.cache.get(&ip) {
            trace!(%ip, "returning reputation score from cache");
            return Ok(score);
        }
        let score = tokio::time
            ::timeout(Duration::from_secs(CHECK_MAX_SECONDS), self.query(ip)).await
            .map_err(|_| LookupError::Transport("request timed out".to_string()))??;
        self.cache.insert(ip, score);
        Ok(score)
    }
}

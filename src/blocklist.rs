use std::{ collections::HashSet, net::IpAddr };

use reqwest::Client;
use tracing::debug;

use crate::error::ScanError;

/// Highest published tier of the blocklist.
pub const TIER_CEILING: u8 = 8;

/// Retrieves one tier's list and returns the set of addresses it names.
/// Each tier is an independent resource; nothing is cached across tiers.
pub async fn fetch_tier(
    client: &Client,
    base_url: &str,
    level: u8
) -> Result<HashSet<IpAddr>, ScanError> {
    let url = format!("{}/{}.txt", base_url.trim_end_matches('/'), level);
    debug!(level, "fetching blocklist tier from {}", url);
    let resp = client
        .get(&url)
        .send().await
        .map_err(|e| ScanError::SourceUnavailable { level, reason: e.to_string() })?;
    if !resp.status().is_success() {
        return Err(ScanError::SourceUnavailable {
            level,
            reason: format!("server returned {}", resp.status()),
        });
    }
    let text = resp
        .text().await
        .map_err(|e| ScanError::SourceUnavailable { level, reason: e.to_string() })?;
    let listed = parse_tier_list(&text);
    debug!(level, entries = listed.len(), "blocklist tier loaded");
    Ok(listed)
}

fn parse_tier_list(text: &str) -> HashSet<IpAddr> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.parse().ok())
        .collect()
}

use std::{ net::IpAddr, sync::Arc };

use reqwest::Client;
use tokio::{ sync::Semaphore, task::JoinSet };
use tracing::{ debug, error, warn };

use crate::{
    blocklist::{ self, TIER_CEILING },
    observation::{ Confidence, ScanBatch, ScoreObservation, Source },
    reputation::ReputationChecker,
    error::ScanError,
    utils,
};

/// Max in-flight reputation calls within one keyed pass.
pub const CHECK_CONCURRENCY: usize = 8;

/// Maps a tier level to the confidence assigned to addresses it flags.
/// Must be monotonically non-decreasing in the level.
pub type TierScorer = fn(u8) -> f64;

/// Default curve: linear in level over the tier ceiling, as a percentage.
pub fn linear_tier_score(level: u8) -> f64 {
    utils::round((f64::from(level) / f64::from(TIER_CEILING)) * 100.0, 2)
}

/// Classifies every target against one tier of the blocklist. Flagged
/// addresses get the tier-derived score; unflagged ones produce nothing.
pub async fn scan_tier(
    client: &Client,
    base_url: &str,
    level: u8,
    targets: &[IpAddr],
    scorer: TierScorer
) -> Result<ScanBatch, ScanError> {
    let listed = blocklist::fetch_tier(client, base_url, level).await?;
    let mut observations = vec![];
    let mut flagged = 0;
    for ip in targets {
        if !listed.contains(ip) {
            continue;
        }
        flagged += 1;
        debug!(%ip, level, "address is listed in this tier");
        observations.push(ScoreObservation {
            ip: *ip,
            source: Source::Tier(level),
            confidence: Confidence::Score(scorer(level)),
        });
    }
    Ok(ScanBatch { observations, flagged })
}

/// Checks every target against the keyed reputation service, one task per
/// address bounded by [`CHECK_CONCURRENCY`]. The returned batch preserves
/// input order regardless of completion order, and a failed lookup only
/// turns its own slot into `Unknown`. Returns after all calls settle.
pub async fn scan_keyed(checker: Arc<dyn ReputationChecker>, targets: &[IpAddr]) -> ScanBatch {
    let semaphore = Arc::new(Semaphore::new(CHECK_CONCURRENCY));
    let mut set = JoinSet::new();
    for (idx, ip) in targets.iter().enumerate() {
        let checker = checker.clone();
        let semaphore = semaphore.clone();
        let ip = *ip;
        set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return (idx, Err(crate::reputation::LookupError::Transport(e.to_string())));
                }
            };
            (idx, checker.check(ip).await)
        });
    }

    let mut slots = vec![Confidence::Unknown; targets.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, Ok(score))) => {
                slots[idx] = Confidence::Score(score);
            }
            Ok((idx, Err(e))) => {
                warn!(ip = %targets[idx], "reputation lookup failed, marking as unknown: {}", e);
            }
            Err(e) => {
                error!("a lookup task did not complete: {}", e);
            }
        }
    }

    let flagged = slots
        .iter()
        .filter(|c| c.is_score())
        .count();
    let observations = targets
        .iter()
        .zip(slots)
        .map(|(ip, confidence)| ScoreObservation {
            ip: *ip,
            source: Source::Reputation,
            confidence,
        })
        .collect();
    ScanBatch { observations, flagged }
}

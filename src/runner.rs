use std::{ net::IpAddr, sync::Arc, time::Duration };

use anyhow::Result;
use reqwest::Client;
use tracing::info;

use crate::{
    aggregate::{ Aggregate, AggregateRecord },
    blocklist::TIER_CEILING,
    error::ScanError,
    reputation::AbuseIpDb,
    scanner::{ self, TierScorer },
    utils,
};

const HTTP_TIMEOUT_SECONDS: u64 = 30;

pub struct ScanOpt {
    pub targets: Vec<IpAddr>,
    /// Presence of a key fixes the mode for the whole run.
    pub credential: Option<String>,
    pub blocklist_url: String,
    pub reputation_url: String,
    pub scorer: TierScorer,
}

enum ScanMode {
    Tiered,
    Keyed(String),
}

impl ScanMode {
    fn select(credential: Option<&str>) -> Result<ScanMode, ScanError> {
        match credential {
            None => Ok(ScanMode::Tiered),
            Some(key) if key.trim().is_empty() => {
                Err(
                    ScanError::ConfigurationError(
                        "reputation API key is present but blank".to_string()
                    )
                )
            }
            Some(key) => Ok(ScanMode::Keyed(key.trim().to_string())),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScanMode::Tiered => "tiered",
            ScanMode::Keyed(_) => "keyed",
        }
    }
}

/// Drives one scan run: selects the mode once, produces batches through the
/// scanners, folds them into the aggregate, and hands back the snapshot.
pub struct ScanRunner {
    opt: ScanOpt,
    client: Client,
    aggregate: Aggregate,
    run_id: String,
}

impl ScanRunner {
    pub fn new(opt: ScanOpt) -> Result<ScanRunner> {
        // a bad credential must fail before any scanning starts
        ScanMode::select(opt.credential.as_deref())?;
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()?;
        Ok(ScanRunner {
            opt,
            client,
            aggregate: Aggregate::new(),
            run_id: utils::generate_id(),
        })
    }

    pub async fn run(mut self) -> Result<Vec<AggregateRecord>, ScanError> {
        let mode = ScanMode::select(self.opt.credential.as_deref())?;
        info!(
            run_id = %self.run_id,
            targets = self.opt.targets.len(),
            mode = mode.label(),
            "scan started"
        );
        match mode {
            ScanMode::Tiered => self.run_tiered().await?,
            ScanMode::Keyed(key) => self.run_keyed(&key).await,
        }
        info!(run_id = %self.run_id, records = self.aggregate.len(), "scan complete");
        Ok(self.aggregate.snapshot())
    }

    /// Escalates through tiers 1..=8, stopping early once two consecutive
    /// tiers flag nothing.
    async fn run_tiered(&mut self) -> Result<(), ScanError> {
        let mut previous_zero = false;
        for level in 1..=TIER_CEILING {
            let batch = scanner::scan_tier(
                &self.client,
                &self.opt.blocklist_url,
                level,
                &self.opt.targets,
                self.opt.scorer
            ).await?;
            let flagged = batch.flagged;
            self.aggregate.merge(&batch);
            info!(run_id = %self.run_id, level, flagged, "tier batch merged");
            if flagged == 0 && previous_zero {
                info!(
                    run_id = %self.run_id,
                    level,
                    "two consecutive tiers without flags, stopping early"
                );
                return Ok(());
            }
            previous_zero = flagged == 0;
        }
        Ok(())
    }

    /// Single keyed pass over all targets; the blocklist is never consulted.
    async fn run_keyed(&mut self, key: &str) {
        let checker = Arc::new(AbuseIpDb::new(self.client.clone(), &self.opt.reputation_url, key));
        let batch = scanner::scan_keyed(checker, &self.opt.targets).await;
        info!(run_id = %self.run_id, scored = batch.flagged, "keyed batch merged");
        self.aggregate.merge(&batch);
    }
}

#[cfg(test)]
mod test {
    use mockito::{ Matcher, Server };
    use tracing_test::traced_test;

    use crate::observation::{ Confidence, Source };
    use crate::scanner::linear_tier_score;

    use super::*;

    fn opt(targets: &[&str], credential: Option<&str>, base_url: &str) -> ScanOpt {
        ScanOpt {
            targets: targets
                .iter()
                .map(|s| s.parse().unwrap())
                .collect(),
            credential: credential.map(|s| s.to_string()),
            blocklist_url: base_url.to_string(),
            reputation_url: format!("{}/check", base_url),
            scorer: linear_tier_score,
        }
    }

    #[test]
    fn test_blank_credential_is_a_configuration_error() {
        let res = ScanRunner::new(opt(&["1.2.3.4"], Some("  "), "http://127.0.0.1:1"));
        let err = res.err().unwrap();
        assert!(matches!(err.downcast_ref::<ScanError>(), Some(ScanError::ConfigurationError(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[traced_test]
    async fn test_tiered_run_stops_after_consecutive_zero_tiers() {
        let mut server = Server::new_async().await;
        // tier 1 flags one address, tiers 2 and 3 are quiet, tier 4 must
        // never be queried
        let _m1 = server
            .mock("GET", "/1.txt")
            .with_status(200)
            .with_body("1.2.3.4\n")
            .create_async().await;
        let _m2 = server
            .mock("GET", "/2.txt")
            .with_status(200)
            .with_body("# nothing here\n")
            .create_async().await;
        let _m3 = server
            .mock("GET", "/3.txt")
            .with_status(200)
            .with_body("\n")
            .create_async().await;
        let m4 = server
            .mock("GET", "/4.txt")
            .with_status(200)
            .with_body("\n")
            .expect(0)
            .create_async().await;
        let check = server.mock("GET", "/check").expect(0).create_async().await;

        let runner = ScanRunner::new(opt(&["1.2.3.4", "5.6.7.8"], None, &server.url())).unwrap();
        let records = runner.run().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ip, "1.2.3.4".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(records[0].best_confidence, Confidence::Score(12.5));
        assert_eq!(records[0].sources, vec![Source::Tier(1)]);
        m4.assert_async().await;
        // a run without a credential must never touch the check endpoint
        check.assert_async().await;
        assert!(logs_contain("stopping early"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tiered_run_needs_consecutive_zeros_to_stop() {
        let mut server = Server::new_async().await;
        // zero, non-zero, zero, zero: the lone zero at tier 3 must not stop
        // the loop, the pair at 3+4 must
        let _m1 = server
            .mock("GET", "/1.txt")
            .with_status(200)
            .with_body("\n")
            .create_async().await;
        let _m2 = server
            .mock("GET", "/2.txt")
            .with_status(200)
            .with_body("1.2.3.4\n")
            .create_async().await;
        let m3 = server
            .mock("GET", "/3.txt")
            .with_status(200)
            .with_body("\n")
            .expect(1)
            .create_async().await;
        let m4 = server
            .mock("GET", "/4.txt")
            .with_status(200)
            .with_body("\n")
            .expect(1)
            .create_async().await;
        let m5 = server
            .mock("GET", "/5.txt")
            .with_status(200)
            .with_body("\n")
            .expect(0)
            .create_async().await;

        let runner = ScanRunner::new(opt(&["1.2.3.4"], None, &server.url())).unwrap();
        let records = runner.run().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].best_confidence, Confidence::Score(25.0));
        m3.assert_async().await;
        m4.assert_async().await;
        m5.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tiered_run_aborts_on_unavailable_tier() {
        let mut server = Server::new_async().await;
        let _m1 = server
            .mock("GET", "/1.txt")
            .with_status(200)
            .with_body("1.2.3.4\n")
            .create_async().await;
        let _m2 = server.mock("GET", "/2.txt").with_status(502).create_async().await;

        let runner = ScanRunner::new(opt(&["1.2.3.4"], None, &server.url())).unwrap();
        let res = runner.run().await;
        assert!(matches!(res, Err(ScanError::SourceUnavailable { level: 2, .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_keyed_run_never_touches_the_blocklist() {
        let mut server = Server::new_async().await;
        let tier = server
            .mock("GET", "/1.txt")
            .with_status(200)
            .with_body("1.2.3.4\n")
            .expect(0)
            .create_async().await;
        let _c1 = server
            .mock("GET", "/check")
            .match_query(Matcher::UrlEncoded("ipAddress".into(), "1.2.3.4".into()))
            .with_status(200)
            .with_body(r#"{ "data": { "abuseConfidenceScore": 90 } }"#)
            .create_async().await;
        let _c2 = server
            .mock("GET", "/check")
            .match_query(Matcher::UrlEncoded("ipAddress".into(), "5.6.7.8".into()))
            .with_status(200)
            .with_body(r#"{ "data": { "abuseConfidenceScore": 0 } }"#)
            .create_async().await;

        let runner = ScanRunner::new(
            opt(&["1.2.3.4", "5.6.7.8"], Some("test-key"), &server.url())
        ).unwrap();
        let records = runner.run().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].best_confidence, Confidence::Score(90.0));
        assert_eq!(records[0].sources, vec![Source::Reputation]);
        assert_eq!(records[1].best_confidence, Confidence::Score(0.0));
        tier.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_keyed_run_degrades_failed_lookup_to_unknown() {
        let mut server = Server::new_async().await;
        let _c1 = server
            .mock("GET", "/check")
            .match_query(Matcher::UrlEncoded("ipAddress".into(), "1.2.3.4".into()))
            .with_status(200)
            .with_body(r#"{ "data": { "abuseConfidenceScore": 42 } }"#)
            .create_async().await;
        let _c2 = server
            .mock("GET", "/check")
            .match_query(Matcher::UrlEncoded("ipAddress".into(), "5.6.7.8".into()))
            .with_status(500)
            .create_async().await;

        let runner = ScanRunner::new(
            opt(&["1.2.3.4", "5.6.7.8"], Some("test-key"), &server.url())
        ).unwrap();
        let records = runner.run().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].best_confidence, Confidence::Score(42.0));
        assert_eq!(records[1].best_confidence, Confidence::Unknown);
        assert_eq!(records[1].sources, vec![Source::Reputation]);
    }
}

//! Per-item fallback search.
//!
//! Walks the ranked candidates for one item, cheap-checking observed
//! manifests, and stops at the first pass. Candidate sets are
//! re-discovered on every call so page drift between retries is picked
//! up automatically.

mod types;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use types::{Locator, SearchOutcome};

use crate::driver::{Item, PageDriver};
use crate::probe::QualityGate;
use crate::ranker;

pub struct CandidateSearch {
    gate: Arc<dyn QualityGate>,
    /// How long the driver waits for manifest URLs to appear.
    manifest_wait: Duration,
}

impl CandidateSearch {
    pub fn new(gate: Arc<dyn QualityGate>, manifest_wait: Duration) -> Self {
        Self {
            gate,
            manifest_wait,
        }
    }

    /// Searches for a usable source for `item`, skipping `excluded`
    /// candidates. Per-candidate driver failures and empty manifest
    /// lists reject that candidate and advance to the next one; only a
    /// failure to enumerate candidates at all propagates.
    pub async fn run(
        &self,
        driver: &mut dyn PageDriver,
        item: &Item,
        excluded: &HashSet<usize>,
    ) -> Result<SearchOutcome, crate::driver::DriverError> {
        let candidates = driver.enumerate_candidates().await?;
        let ranked = ranker::rank(&candidates, excluded);
        debug!(
            item = item.index,
            candidates = candidates.len(),
            usable = ranked.len(),
            "starting search pass"
        );

        for candidate in &ranked {
            if let Err(e) = driver.switch_to_candidate(candidate.index).await {
                warn!(
                    item = item.index,
                    candidate = %candidate.label,
                    error = %e,
                    "candidate switch failed, skipping"
                );
                continue;
            }
            let urls = match driver.list_manifest_urls(item.index, self.manifest_wait).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(
                        item = item.index,
                        candidate = %candidate.label,
                        error = %e,
                        "manifest listing failed, skipping candidate"
                    );
                    continue;
                }
            };
            if urls.is_empty() {
                debug!(
                    item = item.index,
                    candidate = %candidate.label,
                    "candidate has no stream for this item"
                );
                continue;
            }

            // Later-observed manifests tend to be the real player
            // stream rather than preroll noise, so try them first.
            for url in urls.iter().rev() {
                let probe = self.gate.cheap_check(url).await;
                if probe.outcome.passes {
                    info!(
                        item = item.index,
                        candidate = %candidate.label,
                        width = probe.outcome.width,
                        height = probe.outcome.height,
                        "found passing source"
                    );
                    return Ok(SearchOutcome::Found {
                        locator: Locator {
                            manifest_url: url.clone(),
                            variant_url: probe.variant_url,
                        },
                        candidate_index: candidate.index,
                        candidate_label: candidate.label.clone(),
                        resolution: probe.outcome.resolution(),
                    });
                }
                debug!(
                    item = item.index,
                    candidate = %candidate.label,
                    url,
                    width = probe.outcome.width,
                    "manifest below floor or inconclusive"
                );
            }
        }

        info!(item = item.index, "search exhausted all candidates");
        Ok(SearchOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ManifestProbe, ProbeOutcome, Resolution};
    use crate::testing::{MockPageDriver, MockQualityGate};

    fn item() -> Item {
        Item::numbered(1, "EP01", "Show", 1)
    }

    #[tokio::test]
    async fn test_first_passing_candidate_wins() {
        let mut driver = MockPageDriver::new();
        driver.add_candidate("海外推薦A", &["https://a/ep1.m3u8"]);
        driver.add_candidate("B", &["https://b/ep1.m3u8"]);
        let gate = Arc::new(MockQualityGate::new());
        gate.script_cheap(
            "https://a/ep1.m3u8",
            ManifestProbe {
                outcome: ProbeOutcome::from_resolution(
                    Resolution {
                        width: 1920,
                        height: 1080,
                    },
                    1920,
                ),
                variant_url: None,
            },
        );

        let search = CandidateSearch::new(gate.clone(), Duration::from_millis(10));
        let outcome = search
            .run(&mut driver, &item(), &HashSet::new())
            .await
            .unwrap();
        match outcome {
            SearchOutcome::Found {
                candidate_label,
                resolution,
                ..
            } => {
                assert_eq!(candidate_label, "海外推薦A");
                assert_eq!(resolution.unwrap().width, 1920);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The second candidate was never probed.
        assert_eq!(gate.cheap_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_candidate_falls_through() {
        let mut driver = MockPageDriver::new();
        driver.add_candidate("推薦A", &["https://a/ep1.m3u8"]);
        driver.add_candidate("B", &["https://b/ep1.m3u8"]);
        let gate = Arc::new(MockQualityGate::new());
        gate.script_cheap(
            "https://a/ep1.m3u8",
            ManifestProbe {
                outcome: ProbeOutcome::from_resolution(
                    Resolution {
                        width: 1280,
                        height: 720,
                    },
                    1920,
                ),
                variant_url: None,
            },
        );
        gate.script_cheap(
            "https://b/ep1.m3u8",
            ManifestProbe {
                outcome: ProbeOutcome::from_resolution(
                    Resolution {
                        width: 1920,
                        height: 1080,
                    },
                    1920,
                ),
                variant_url: None,
            },
        );

        let search = CandidateSearch::new(gate, Duration::from_millis(10));
        let outcome = search
            .run(&mut driver, &item(), &HashSet::new())
            .await
            .unwrap();
        match outcome {
            SearchOutcome::Found { candidate_label, .. } => assert_eq!(candidate_label, "B"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manifests_tried_in_reverse_order() {
        let mut driver = MockPageDriver::new();
        driver.add_candidate("A", &["https://a/first.m3u8", "https://a/second.m3u8"]);
        let gate = Arc::new(MockQualityGate::new());
        gate.script_cheap(
            "https://a/second.m3u8",
            ManifestProbe {
                outcome: ProbeOutcome::from_resolution(
                    Resolution {
                        width: 1920,
                        height: 1080,
                    },
                    1920,
                ),
                variant_url: None,
            },
        );

        let search = CandidateSearch::new(gate.clone(), Duration::from_millis(10));
        let outcome = search
            .run(&mut driver, &item(), &HashSet::new())
            .await
            .unwrap();
        assert!(matches!(outcome, SearchOutcome::Found { .. }));
        assert_eq!(gate.cheap_calls(), vec!["https://a/second.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_switch_failure_skips_to_next_candidate() {
        let mut driver = MockPageDriver::new();
        driver.add_candidate("海外推薦A", &["https://a/ep1.m3u8"]);
        driver.add_candidate("B", &["https://b/ep1.m3u8"]);
        // The best-tier candidate's player never activates.
        driver.fail_switch(0);
        let gate = Arc::new(MockQualityGate::new());
        gate.script_cheap_width("https://b/ep1.m3u8", 1920);

        let search = CandidateSearch::new(gate.clone(), Duration::from_millis(10));
        let outcome = search
            .run(&mut driver, &item(), &HashSet::new())
            .await
            .unwrap();
        match outcome {
            SearchOutcome::Found { candidate_label, .. } => assert_eq!(candidate_label, "B"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The broken candidate was never probed.
        assert_eq!(gate.cheap_calls(), vec!["https://b/ep1.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_excluded_candidates_skipped() {
        let mut driver = MockPageDriver::new();
        driver.add_candidate("A", &["https://a/ep1.m3u8"]);
        let gate = Arc::new(MockQualityGate::new());
        let search = CandidateSearch::new(gate.clone(), Duration::from_millis(10));
        let excluded: HashSet<usize> = [0].into_iter().collect();
        let outcome = search.run(&mut driver, &item(), &excluded).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Exhausted);
        assert!(gate.cheap_calls().is_empty());
    }

    #[tokio::test]
    async fn test_candidate_without_item_is_rejection() {
        let mut driver = MockPageDriver::new();
        driver.add_candidate("A", &[]);
        let gate = Arc::new(MockQualityGate::new());
        let search = CandidateSearch::new(gate, Duration::from_millis(10));
        let outcome = search
            .run(&mut driver, &item(), &HashSet::new())
            .await
            .unwrap();
        assert_eq!(outcome, SearchOutcome::Exhausted);
    }
}

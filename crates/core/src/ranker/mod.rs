//! Candidate ranking.
//!
//! Pure and deterministic: same candidates + same exclusions always
//! produce the same order, and ranking already-ranked output is a
//! no-op.

use std::collections::HashSet;

use crate::driver::SourceCandidate;

/// Ranks candidates into quality tiers, best first, filtering out
/// excluded indices. Within a tier, page discovery order is preserved.
///
/// Tier order: alternate-region+recommended, alternate-region,
/// recommended, everything else. An empty result is a normal outcome,
/// never an error.
pub fn rank(candidates: &[SourceCandidate], excluded: &HashSet<usize>) -> Vec<SourceCandidate> {
    let mut ranked: Vec<&SourceCandidate> = candidates
        .iter()
        .filter(|c| !excluded.contains(&c.index))
        .collect();
    ranked.sort_by_key(|c| tier(c));
    ranked.into_iter().cloned().collect()
}

fn tier(candidate: &SourceCandidate) -> u8 {
    match (candidate.alternate_region, candidate.recommended) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TierMarkers;

    fn candidates(labels: &[&str]) -> Vec<SourceCandidate> {
        let markers = TierMarkers::default();
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| SourceCandidate::from_label(i, l.to_string(), &markers))
            .collect()
    }

    #[test]
    fn test_tier_order() {
        let cs = candidates(&["FLV-1", "推薦FLV", "海外FLV", "海外推薦FLV"]);
        let ranked = rank(&cs, &HashSet::new());
        let labels: Vec<&str> = ranked.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["海外推薦FLV", "海外FLV", "推薦FLV", "FLV-1"]);
    }

    #[test]
    fn test_stable_within_tier() {
        let cs = candidates(&["FLV-1", "FLV-2", "推薦A", "推薦B"]);
        let ranked = rank(&cs, &HashSet::new());
        let labels: Vec<&str> = ranked.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["推薦A", "推薦B", "FLV-1", "FLV-2"]);
    }

    #[test]
    fn test_exclusions_filtered() {
        let cs = candidates(&["海外推薦FLV", "推薦FLV", "FLV-1"]);
        let excluded: HashSet<usize> = [0, 2].into_iter().collect();
        let ranked = rank(&cs, &excluded);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].label, "推薦FLV");
    }

    #[test]
    fn test_all_excluded_is_empty_not_error() {
        let cs = candidates(&["FLV-1", "FLV-2"]);
        let excluded: HashSet<usize> = [0, 1].into_iter().collect();
        assert!(rank(&cs, &excluded).is_empty());
    }

    #[test]
    fn test_deterministic_and_idempotent() {
        let cs = candidates(&["FLV-2", "海外A", "推薦B", "FLV-9", "海外推薦C"]);
        let excluded: HashSet<usize> = [3].into_iter().collect();
        let once = rank(&cs, &excluded);
        let twice = rank(&cs, &excluded);
        assert_eq!(once, twice);
        let again = rank(&once, &HashSet::new());
        assert_eq!(once, again);
    }
}

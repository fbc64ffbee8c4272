//! Types for the page driver seam.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static HOSTILE_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("valid regex"));

/// One unit of the overall job (e.g. one episode).
///
/// Identity is immutable; lifecycle state lives in the orchestrator's
/// per-item record, never on the item itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Sequential 1-based index, ordering-significant.
    pub index: u32,
    /// Human-readable label (e.g. the episode button text).
    pub label: String,
    /// Target output file name for the assembled artifact.
    pub output_name: String,
}

impl Item {
    /// Builds an item with an output name derived from the show title,
    /// `"{title}.S{season:03}.E{index:03}.mp4"`.
    pub fn numbered(index: u32, label: impl Into<String>, title: &str, season: u32) -> Self {
        Self {
            index,
            label: label.into(),
            output_name: format!("{}.S{:03}.E{:03}.mp4", sanitize_filename(title), season, index),
        }
    }
}

/// One alternative origin offering a manifest for an item.
///
/// Ephemeral: recomputed per item per search attempt. The tier tags are
/// derived from the candidate's display label and only used for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCandidate {
    /// Opaque index, stable within one item's search session.
    pub index: usize,
    /// Display label as discovered on the page.
    pub label: String,
    /// Marked as an alternate-region source.
    pub alternate_region: bool,
    /// Marked as a recommended source.
    pub recommended: bool,
}

impl SourceCandidate {
    /// Tags a discovered label using the configured markers.
    pub fn from_label(index: usize, label: impl Into<String>, markers: &TierMarkers) -> Self {
        let label = label.into();
        let alternate_region = markers.alternate_region.iter().any(|m| label.contains(m.as_str()));
        let recommended = markers.recommended.iter().any(|m| label.contains(m.as_str()));
        Self {
            index,
            label,
            alternate_region,
            recommended,
        }
    }
}

/// Substrings that mark a candidate label as belonging to a tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierMarkers {
    /// Labels containing any of these are tagged alternate-region.
    #[serde(default = "default_alternate_region_markers")]
    pub alternate_region: Vec<String>,
    /// Labels containing any of these are tagged recommended.
    #[serde(default = "default_recommended_markers")]
    pub recommended: Vec<String>,
}

fn default_alternate_region_markers() -> Vec<String> {
    vec!["海外".to_string()]
}

fn default_recommended_markers() -> Vec<String> {
    vec!["推薦".to_string()]
}

impl Default for TierMarkers {
    fn default() -> Self {
        Self {
            alternate_region: default_alternate_region_markers(),
            recommended: default_recommended_markers(),
        }
    }
}

/// Errors from the page driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("capture file not found: {0}")]
    CaptureNotFound(String),

    #[error("capture file is invalid: {0}")]
    CaptureInvalid(String),

    #[error("no such candidate: {0}")]
    UnknownCandidate(usize),

    #[error("driver navigation failed: {0}")]
    Navigation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Replaces filesystem-hostile characters in a name with underscores.
pub fn sanitize_filename(name: &str) -> String {
    HOSTILE_CHARS_RE.replace_all(name.trim(), "_").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Some: Show?"), "Some_ Show_");
        assert_eq!(sanitize_filename("  plain  "), "plain");
        assert_eq!(sanitize_filename(r#"a\b/c"#), "a_b_c");
    }

    #[test]
    fn test_item_numbered_output_name() {
        let item = Item::numbered(7, "EP07", "My Show", 1);
        assert_eq!(item.output_name, "My Show.S001.E007.mp4");
        assert_eq!(item.index, 7);
    }

    #[test]
    fn test_candidate_tagging_from_markers() {
        let markers = TierMarkers::default();
        let c = SourceCandidate::from_label(0, "海外推薦FLV", &markers);
        assert!(c.alternate_region);
        assert!(c.recommended);

        let c = SourceCandidate::from_label(1, "推薦FLV", &markers);
        assert!(!c.alternate_region);
        assert!(c.recommended);

        let c = SourceCandidate::from_label(2, "FLV-2", &markers);
        assert!(!c.alternate_region);
        assert!(!c.recommended);
    }

    #[test]
    fn test_candidate_tagging_custom_markers() {
        let markers = TierMarkers {
            alternate_region: vec!["INTL".to_string()],
            recommended: vec!["HQ".to_string(), "BEST".to_string()],
        };
        let c = SourceCandidate::from_label(3, "INTL-BEST", &markers);
        assert!(c.alternate_region);
        assert!(c.recommended);
    }
}

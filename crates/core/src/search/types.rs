use serde::{Deserialize, Serialize};

use crate::probe::Resolution;

/// Where to fetch an item's stream from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Manifest URL as observed on the page.
    pub manifest_url: String,
    /// Winning variant URL when the manifest was a master playlist.
    pub variant_url: Option<String>,
}

impl Locator {
    /// URL the transfer should actually fetch.
    pub fn transfer_url(&self) -> &str {
        self.variant_url.as_deref().unwrap_or(&self.manifest_url)
    }
}

/// Result of one per-item search pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A candidate passed the cheap check.
    Found {
        locator: Locator,
        candidate_index: usize,
        candidate_label: String,
        /// Advertised resolution, when the manifest carried one.
        resolution: Option<Resolution>,
    },
    /// Every usable candidate was tried and rejected.
    Exhausted,
}

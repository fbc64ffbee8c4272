//! Driver backed by a pre-captured candidate/manifest map.
//!
//! Real DOM automation lives outside this repo. An external sniffing
//! tool records, per candidate and per item, the manifest URLs it
//! observed, and writes them to a JSON capture file. This driver
//! replays that file so the whole pipeline runs unmodified.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{DriverError, Item, SourceCandidate, TierMarkers};
use super::PageDriver;

/// Configuration for the capture-file driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Path to the JSON capture file.
    pub capture_file: PathBuf,
    /// Markers used to tag candidate labels into tiers.
    #[serde(default)]
    pub markers: TierMarkers,
}

/// On-disk capture format.
#[derive(Debug, Deserialize)]
struct CaptureFile {
    /// Show title, used for output naming.
    title: String,
    /// Season number for output naming.
    #[serde(default = "default_season")]
    season: u32,
    /// Ordered item labels. Item indices are 1-based positions here.
    items: Vec<String>,
    /// Candidate labels in page discovery order.
    candidates: Vec<String>,
    /// candidate label -> item index (as string) -> observed manifest URLs.
    streams: HashMap<String, HashMap<String, Vec<String>>>,
}

fn default_season() -> u32 {
    1
}

/// [`PageDriver`] that replays a capture file.
#[derive(Debug)]
pub struct CaptureFileDriver {
    markers: TierMarkers,
    capture: CaptureFile,
    active_candidate: Option<usize>,
}

impl CaptureFileDriver {
    /// Loads and parses the capture file eagerly so malformed input
    /// fails before any pipeline work starts.
    pub async fn load(config: &CaptureConfig) -> Result<Self, DriverError> {
        let path: &Path = &config.capture_file;
        if !path.exists() {
            return Err(DriverError::CaptureNotFound(path.display().to_string()));
        }
        let raw = tokio::fs::read_to_string(path).await?;
        let capture: CaptureFile = serde_json::from_str(&raw)
            .map_err(|e| DriverError::CaptureInvalid(e.to_string()))?;
        if capture.items.is_empty() {
            return Err(DriverError::CaptureInvalid("no items in capture".to_string()));
        }
        if capture.candidates.is_empty() {
            return Err(DriverError::CaptureInvalid(
                "no candidates in capture".to_string(),
            ));
        }
        debug!(
            title = %capture.title,
            items = capture.items.len(),
            candidates = capture.candidates.len(),
            "loaded capture file"
        );
        Ok(Self {
            markers: config.markers.clone(),
            capture,
            active_candidate: None,
        })
    }

    fn candidate_label(&self, index: usize) -> Result<&str, DriverError> {
        self.capture
            .candidates
            .get(index)
            .map(String::as_str)
            .ok_or(DriverError::UnknownCandidate(index))
    }
}

#[async_trait]
impl PageDriver for CaptureFileDriver {
    fn name(&self) -> &str {
        "capture-file"
    }

    async fn enumerate_items(&mut self) -> Result<Vec<Item>, DriverError> {
        let title = self.capture.title.clone();
        let season = self.capture.season;
        Ok(self
            .capture
            .items
            .iter()
            .enumerate()
            .map(|(i, label)| Item::numbered(i as u32 + 1, label.clone(), &title, season))
            .collect())
    }

    async fn enumerate_candidates(&mut self) -> Result<Vec<SourceCandidate>, DriverError> {
        Ok(self
            .capture
            .candidates
            .iter()
            .enumerate()
            .map(|(i, label)| SourceCandidate::from_label(i, label.clone(), &self.markers))
            .collect())
    }

    async fn switch_to_candidate(&mut self, index: usize) -> Result<(), DriverError> {
        self.candidate_label(index)?;
        self.active_candidate = Some(index);
        Ok(())
    }

    async fn list_manifest_urls(
        &mut self,
        item_index: u32,
        _wait: Duration,
    ) -> Result<Vec<String>, DriverError> {
        let candidate = self
            .active_candidate
            .ok_or_else(|| DriverError::Navigation("no candidate selected".to_string()))?;
        let label = self.candidate_label(candidate)?;
        let urls = self
            .capture
            .streams
            .get(label)
            .and_then(|per_item| per_item.get(&item_index.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(urls)
    }
}

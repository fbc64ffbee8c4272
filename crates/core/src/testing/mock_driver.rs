//! Mock page driver for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{DriverError, Item, PageDriver, SourceCandidate, TierMarkers};

struct MockCandidate {
    label: String,
    /// URLs served for any item without a per-item override.
    default_urls: Vec<String>,
    per_item: HashMap<u32, Vec<String>>,
}

struct DriverState {
    items: Vec<Item>,
    candidates: Vec<MockCandidate>,
    active: Option<usize>,
    switch_errors: Vec<usize>,
    enumerate_error: Option<String>,
}

/// Scripted [`PageDriver`]. Clones share state, so a test can keep a
/// handle for assertions after moving the driver into a session.
#[derive(Clone)]
pub struct MockPageDriver {
    state: Arc<Mutex<DriverState>>,
    markers: TierMarkers,
}

impl Default for MockPageDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPageDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DriverState {
                items: Vec::new(),
                candidates: Vec::new(),
                active: None,
                switch_errors: Vec::new(),
                enumerate_error: None,
            })),
            markers: TierMarkers::default(),
        }
    }

    /// Populates `count` items labeled `EP01..`, season 1.
    pub fn set_items(&mut self, count: u32, title: &str) {
        let mut state = self.state.lock().unwrap();
        state.items = (1..=count)
            .map(|i| Item::numbered(i, format!("EP{i:02}"), title, 1))
            .collect();
    }

    /// Adds a candidate serving `urls` for every item. Returns its
    /// index.
    pub fn add_candidate(&mut self, label: &str, urls: &[&str]) -> usize {
        let mut state = self.state.lock().unwrap();
        state.candidates.push(MockCandidate {
            label: label.to_string(),
            default_urls: urls.iter().map(|u| u.to_string()).collect(),
            per_item: HashMap::new(),
        });
        state.candidates.len() - 1
    }

    /// Overrides the URLs one candidate serves for one item. An empty
    /// list means the candidate does not carry that item.
    pub fn set_item_urls(&mut self, candidate: usize, item_index: u32, urls: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.candidates[candidate]
            .per_item
            .insert(item_index, urls.iter().map(|u| u.to_string()).collect());
    }

    /// Makes switching to the given candidate fail.
    pub fn fail_switch(&mut self, candidate: usize) {
        self.state.lock().unwrap().switch_errors.push(candidate);
    }

    /// Makes the next candidate enumeration fail.
    pub fn fail_enumerate(&mut self, message: &str) {
        self.state.lock().unwrap().enumerate_error = Some(message.to_string());
    }
}

#[async_trait]
impl PageDriver for MockPageDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn enumerate_items(&mut self) -> Result<Vec<Item>, DriverError> {
        Ok(self.state.lock().unwrap().items.clone())
    }

    async fn enumerate_candidates(&mut self) -> Result<Vec<SourceCandidate>, DriverError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.enumerate_error.take() {
            return Err(DriverError::Navigation(message));
        }
        Ok(state
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| SourceCandidate::from_label(i, c.label.clone(), &self.markers))
            .collect())
    }

    async fn switch_to_candidate(&mut self, index: usize) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        if index >= state.candidates.len() {
            return Err(DriverError::UnknownCandidate(index));
        }
        if state.switch_errors.contains(&index) {
            return Err(DriverError::Navigation(format!(
                "scripted switch failure for candidate {index}"
            )));
        }
        state.active = Some(index);
        Ok(())
    }

    async fn list_manifest_urls(
        &mut self,
        item_index: u32,
        _wait: Duration,
    ) -> Result<Vec<String>, DriverError> {
        let state = self.state.lock().unwrap();
        let Some(active) = state.active else {
            return Err(DriverError::Navigation("no candidate selected".to_string()));
        };
        let candidate = &state.candidates[active];
        Ok(candidate
            .per_item
            .get(&item_index)
            .unwrap_or(&candidate.default_urls)
            .clone())
    }
}

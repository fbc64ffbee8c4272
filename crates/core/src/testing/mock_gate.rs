//! Mock quality gate for testing.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::probe::{ManifestProbe, ProbeOutcome, QualityGate, Resolution};

struct GateState {
    cheap_by_url: HashMap<String, ManifestProbe>,
    cheap_calls: Vec<String>,
    verify_queue: VecDeque<ProbeOutcome>,
    verify_calls: Vec<PathBuf>,
}

/// Scripted [`QualityGate`].
///
/// Cheap checks are keyed by URL; unscripted URLs come back
/// inconclusive. Authoritative checks consume a queue; an empty queue
/// passes at 1920x1080.
#[derive(Clone)]
pub struct MockQualityGate {
    state: Arc<Mutex<GateState>>,
}

impl Default for MockQualityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQualityGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState {
                cheap_by_url: HashMap::new(),
                cheap_calls: Vec::new(),
                verify_queue: VecDeque::new(),
                verify_calls: Vec::new(),
            })),
        }
    }

    /// Scripts the cheap-check response for one manifest URL.
    pub fn script_cheap(&self, url: &str, probe: ManifestProbe) {
        self.state
            .lock()
            .unwrap()
            .cheap_by_url
            .insert(url.to_string(), probe);
    }

    /// Convenience: scripts a cheap check passing/failing a 1920 floor
    /// at the given width.
    pub fn script_cheap_width(&self, url: &str, width: u32) {
        let height = width * 9 / 16;
        self.script_cheap(
            url,
            ManifestProbe {
                outcome: ProbeOutcome::from_resolution(Resolution { width, height }, 1920),
                variant_url: None,
            },
        );
    }

    /// Queues the outcome of the next authoritative check.
    pub fn push_verify(&self, outcome: ProbeOutcome) {
        self.state.lock().unwrap().verify_queue.push_back(outcome);
    }

    /// URLs cheap-checked so far, in order.
    pub fn cheap_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().cheap_calls.clone()
    }

    /// Artifacts verified so far, in order.
    pub fn verify_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().verify_calls.clone()
    }
}

#[async_trait]
impl QualityGate for MockQualityGate {
    async fn cheap_check(&self, manifest_url: &str) -> ManifestProbe {
        let mut state = self.state.lock().unwrap();
        state.cheap_calls.push(manifest_url.to_string());
        state
            .cheap_by_url
            .get(manifest_url)
            .cloned()
            .unwrap_or(ManifestProbe {
                outcome: ProbeOutcome::inconclusive(),
                variant_url: None,
            })
    }

    async fn authoritative_check(&self, artifact: &Path) -> ProbeOutcome {
        let mut state = self.state.lock().unwrap();
        state.verify_calls.push(artifact.to_path_buf());
        state.verify_queue.pop_front().unwrap_or(ProbeOutcome {
            passes: true,
            width: 1920,
            height: 1080,
        })
    }
}

//! Types for the acquisition orchestrator.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::Item;
use crate::probe::Resolution;
use crate::search::Locator;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Item already has an in-flight attempt or terminal state.
    #[error("item {0} is not accepting a new attempt (state {1})")]
    InvalidSubmit(u32, String),

    /// Orchestrator is shut down.
    #[error("orchestrator is not running")]
    NotRunning,
}

/// Lifecycle state of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    /// Waiting for (or undergoing) a source search.
    Searching,
    Transferring,
    Assembling,
    Verifying,
    /// Terminal success.
    Done,
    /// Terminal failure with a reason.
    Abandoned(String),
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Done | ItemState::Abandoned(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ItemState::Searching => "searching",
            ItemState::Transferring => "transferring",
            ItemState::Assembling => "assembling",
            ItemState::Verifying => "verifying",
            ItemState::Done => "done",
            ItemState::Abandoned(_) => "abandoned",
        }
    }
}

/// Context of the attempt currently in flight for an item.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub candidate_index: usize,
    pub candidate_label: String,
    pub locator: Locator,
    pub workspace: PathBuf,
}

/// Orchestrator-owned record of one item.
///
/// Holds everything the retry and reporting machinery needs: the
/// monotonically growing exclusion set, the attempt counter that fences
/// stale task events, and the terminal outcome.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item: Item,
    pub state: ItemState,
    /// Candidate indices that must never be retried for this item.
    pub excluded: HashSet<usize>,
    /// Incremented on every submitted attempt.
    pub attempt: u64,
    /// In-flight attempt context; `None` between attempts.
    pub current: Option<AttemptContext>,
    /// Authoritative resolution once verified.
    pub resolution: Option<Resolution>,
    /// Final artifact path once assembled.
    pub artifact: Option<PathBuf>,
    /// Label of the candidate that produced the artifact.
    pub source_label: Option<String>,
}

impl ItemRecord {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            state: ItemState::Searching,
            excluded: HashSet::new(),
            attempt: 0,
            current: None,
            resolution: None,
            artifact: None,
            source_label: None,
        }
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Transfer(String),
    Assemble(String),
    /// Authoritative check came back below the floor (or inconclusive,
    /// reported as 0x0).
    QualityRejected { width: u32, height: u32 },
}

impl AttemptFailure {
    pub fn describe(&self) -> String {
        match self {
            AttemptFailure::Transfer(d) => format!("transfer failed: {d}"),
            AttemptFailure::Assemble(d) => format!("assembly failed: {d}"),
            AttemptFailure::QualityRejected { width, height } => {
                format!("verified at {width}x{height}, below floor")
            }
        }
    }
}

/// Completion events emitted by pool tasks, consumed by the single
/// event loop. Every event carries the attempt number it belongs to so
/// events from superseded attempts can be dropped.
#[derive(Debug)]
pub enum TaskEvent {
    TransferFinished {
        item_index: u32,
        attempt: u64,
        result: Result<(), AttemptFailure>,
    },
    AssembleFinished {
        item_index: u32,
        attempt: u64,
        result: Result<(), AttemptFailure>,
    },
    VerifyFinished {
        item_index: u32,
        attempt: u64,
        outcome: Result<Resolution, AttemptFailure>,
    },
}

/// Ask from the orchestrator to the producer: run another search for
/// this item, skipping the excluded candidates.
#[derive(Debug, Clone)]
pub struct RetryRequest {
    pub item: Item,
    pub excluded: HashSet<usize>,
}

/// Point-in-time status of one worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub name: String,
    pub active_jobs: usize,
    pub max_concurrent: usize,
    pub queued_jobs: usize,
    pub total_processed: u64,
    pub total_failed: u64,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub transfer_pool: PoolStatus,
    pub assemble_pool: PoolStatus,
    /// Items by state name.
    pub searching: usize,
    pub in_flight: usize,
    pub done: usize,
    pub abandoned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ItemState::Done.is_terminal());
        assert!(ItemState::Abandoned("x".to_string()).is_terminal());
        assert!(!ItemState::Searching.is_terminal());
        assert!(!ItemState::Verifying.is_terminal());
    }

    #[test]
    fn test_failure_description() {
        let f = AttemptFailure::QualityRejected {
            width: 1280,
            height: 720,
        };
        assert_eq!(f.describe(), "verified at 1280x720, below floor");
    }

    #[test]
    fn test_new_record_starts_searching() {
        let record = ItemRecord::new(Item::numbered(3, "EP03", "Show", 1));
        assert_eq!(record.state, ItemState::Searching);
        assert!(record.excluded.is_empty());
        assert_eq!(record.attempt, 0);
    }
}

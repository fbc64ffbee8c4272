//! Concurrency-bounded acquisition orchestrator.
//!
//! Drives items through transfer, assembly, and final verification:
//! - **Search**: owned by the producer, strictly sequential per item
//! - **Transfer**: bounded pool, many items at once
//! - **Assemble + verify**: bounded pool, runs under one permit

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::AcquisitionOrchestrator;
pub use types::{
    AttemptContext, AttemptFailure, ItemRecord, ItemState, OrchestratorError, OrchestratorStatus,
    PoolStatus, RetryRequest, TaskEvent,
};

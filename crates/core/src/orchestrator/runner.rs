//! Acquisition orchestrator implementation.
//!
//! Owns the per-item records and the two bounded worker pools. Pool
//! tasks report back over a single mpsc event channel; one event loop
//! applies every state transition, so records never race. Search and
//! page work never happen here: when an attempt fails, the orchestrator
//! emits a [`RetryRequest`] and the producer runs the next search.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock, Semaphore};
use tracing::{debug, info, warn};

use crate::assemble::{AssembleRequest, Assembler};
use crate::driver::Item;
use crate::metrics;
use crate::probe::QualityGate;
use crate::search::Locator;
use crate::transfer::{TransferRequest, Transferrer};

use super::config::OrchestratorConfig;
use super::types::{
    AttemptContext, AttemptFailure, ItemRecord, ItemState, OrchestratorError, OrchestratorStatus,
    PoolStatus, RetryRequest, TaskEvent,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const RETRY_CHANNEL_CAPACITY: usize = 64;

/// Tracks statistics for a worker pool.
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl Default for PoolStats {
    fn default() -> Self {
        Self {
            active: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            total_processed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

struct Inner<T: Transferrer, A: Assembler> {
    config: OrchestratorConfig,
    transferrer: Arc<T>,
    assembler: Arc<A>,
    gate: Arc<dyn QualityGate>,
    output_dir: PathBuf,
    workspace_root: PathBuf,
    transfer_semaphore: Semaphore,
    assemble_semaphore: Semaphore,
    transfer_stats: PoolStats,
    assemble_stats: PoolStats,
    records: RwLock<HashMap<u32, ItemRecord>>,
    event_tx: mpsc::Sender<TaskEvent>,
    retry_tx: mpsc::Sender<RetryRequest>,
    shutdown_tx: broadcast::Sender<()>,
    running: RwLock<bool>,
}

/// The acquisition orchestrator.
pub struct AcquisitionOrchestrator<T: Transferrer, A: Assembler> {
    inner: Arc<Inner<T, A>>,
    event_rx: Mutex<Option<mpsc::Receiver<TaskEvent>>>,
}

impl<T: Transferrer + 'static, A: Assembler + 'static> AcquisitionOrchestrator<T, A> {
    /// Creates the orchestrator and the retry channel the producer
    /// must drain.
    pub fn new(
        config: OrchestratorConfig,
        transferrer: T,
        assembler: A,
        gate: Arc<dyn QualityGate>,
        output_dir: PathBuf,
        workspace_root: PathBuf,
    ) -> (Self, mpsc::Receiver<RetryRequest>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (retry_tx, retry_rx) = mpsc::channel(RETRY_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = broadcast::channel(1);
        let inner = Arc::new(Inner {
            transfer_semaphore: Semaphore::new(config.max_concurrent_transfers),
            assemble_semaphore: Semaphore::new(config.assemble_limit()),
            config,
            transferrer: Arc::new(transferrer),
            assembler: Arc::new(assembler),
            gate,
            output_dir,
            workspace_root,
            transfer_stats: PoolStats::default(),
            assemble_stats: PoolStats::default(),
            records: RwLock::new(HashMap::new()),
            event_tx,
            retry_tx,
            shutdown_tx,
            running: RwLock::new(false),
        });
        (
            Self {
                inner,
                event_rx: Mutex::new(Some(event_rx)),
            },
            retry_rx,
        )
    }

    /// Starts the event loop. Must be called before submitting work.
    pub async fn start(&self) {
        {
            let mut running = self.inner.running.write().await;
            *running = true;
        }
        let Some(event_rx) = self.event_rx.lock().await.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let shutdown_rx = inner.shutdown_tx.subscribe();
        tokio::spawn(Self::run_event_loop(inner, event_rx, shutdown_rx));
    }

    /// Stops the event loop. In-flight tasks finish on their own but
    /// their completions are no longer applied.
    pub async fn stop(&self) {
        let mut running = self.inner.running.write().await;
        *running = false;
        let _ = self.inner.shutdown_tx.send(());
    }

    /// Submits one attempt for an item. The item must be new or back
    /// in the searching state; anything else is a producer bug.
    pub async fn submit(
        &self,
        item: Item,
        locator: Locator,
        candidate_index: usize,
        candidate_label: String,
    ) -> Result<(), OrchestratorError> {
        if !*self.inner.running.read().await {
            return Err(OrchestratorError::NotRunning);
        }
        let (attempt, workspace, request) = {
            let mut records = self.inner.records.write().await;
            let record = records
                .entry(item.index)
                .or_insert_with(|| ItemRecord::new(item.clone()));
            if record.state != ItemState::Searching || record.current.is_some() {
                return Err(OrchestratorError::InvalidSubmit(
                    item.index,
                    record.state.name().to_string(),
                ));
            }
            record.attempt += 1;
            let workspace = self.inner.workspace_root.join(format!(
                "item{:03}-{}",
                item.index,
                chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
            ));
            record.current = Some(AttemptContext {
                candidate_index,
                candidate_label: candidate_label.clone(),
                locator: locator.clone(),
                workspace: workspace.clone(),
            });
            record.state = ItemState::Transferring;
            let save_name = item
                .output_name
                .strip_suffix(".mp4")
                .unwrap_or(&item.output_name)
                .to_string();
            let request = TransferRequest {
                url: locator.transfer_url().to_string(),
                workspace: workspace.clone(),
                save_name,
            };
            (record.attempt, workspace, request)
        };
        info!(
            item = item.index,
            attempt,
            candidate = %candidate_label,
            workspace = %workspace.display(),
            "submitting transfer"
        );

        let inner = Arc::clone(&self.inner);
        let item_index = item.index;
        tokio::spawn(async move {
            Self::run_transfer(inner, item_index, attempt, request).await;
        });
        Ok(())
    }

    /// Marks an item as terminally failed. Creates the record when the
    /// item never had a submittable source to begin with.
    pub async fn mark_abandoned(&self, item: &Item, reason: &str) {
        let workspace = {
            let mut records = self.inner.records.write().await;
            let record = records
                .entry(item.index)
                .or_insert_with(|| ItemRecord::new(item.clone()));
            if record.state.is_terminal() {
                return;
            }
            let workspace = record.current.take().map(|c| c.workspace);
            record.state = ItemState::Abandoned(reason.to_string());
            workspace
        };
        warn!(item = item.index, reason, "item abandoned");
        metrics::ITEMS_ABANDONED.inc();
        if let Some(workspace) = workspace {
            let _ = tokio::fs::remove_dir_all(&workspace).await;
        }
    }

    /// Force-abandons every non-terminal item, e.g. when the drain
    /// budget expires.
    pub async fn abandon_in_flight(&self, reason: &str) {
        let workspaces = {
            let mut records = self.inner.records.write().await;
            let mut workspaces = Vec::new();
            for record in records.values_mut() {
                if !record.state.is_terminal() {
                    warn!(item = record.item.index, reason, "force abandoning item");
                    if let Some(current) = record.current.take() {
                        workspaces.push(current.workspace);
                    }
                    record.state = ItemState::Abandoned(reason.to_string());
                    metrics::ITEMS_ABANDONED.inc();
                }
            }
            workspaces
        };
        for workspace in workspaces {
            let _ = tokio::fs::remove_dir_all(&workspace).await;
        }
    }

    /// True once every known item is in a terminal state.
    pub async fn is_drained(&self) -> bool {
        let records = self.inner.records.read().await;
        records.values().all(|r| r.state.is_terminal())
    }

    /// Snapshot of all item records, ordered by item index.
    pub async fn item_reports(&self) -> Vec<ItemRecord> {
        let records = self.inner.records.read().await;
        let mut reports: Vec<ItemRecord> = records.values().cloned().collect();
        reports.sort_by_key(|r| r.item.index);
        reports
    }

    /// Returns the current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let records = self.inner.records.read().await;
        let mut searching = 0;
        let mut in_flight = 0;
        let mut done = 0;
        let mut abandoned = 0;
        for record in records.values() {
            match record.state {
                ItemState::Searching => searching += 1,
                ItemState::Done => done += 1,
                ItemState::Abandoned(_) => abandoned += 1,
                _ => in_flight += 1,
            }
        }
        OrchestratorStatus {
            running: *self.inner.running.read().await,
            transfer_pool: self
                .inner
                .transfer_stats
                .to_status("transfer", self.inner.config.max_concurrent_transfers),
            assemble_pool: self
                .inner
                .assemble_stats
                .to_status("assemble", self.inner.config.assemble_limit()),
            searching,
            in_flight,
            done,
            abandoned,
        }
    }

    async fn run_transfer(
        inner: Arc<Inner<T, A>>,
        item_index: u32,
        attempt: u64,
        request: TransferRequest,
    ) {
        inner.transfer_stats.queued.fetch_add(1, Ordering::Relaxed);
        let permit = match inner.transfer_semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        inner.transfer_stats.queued.fetch_sub(1, Ordering::Relaxed);
        inner.transfer_stats.active.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let result = inner.transferrer.transfer(&request).await;
        drop(permit);
        inner.transfer_stats.active.fetch_sub(1, Ordering::Relaxed);

        let label = if result.is_ok() { "success" } else { "failed" };
        metrics::TRANSFERS_TOTAL.with_label_values(&[label]).inc();
        metrics::TRANSFER_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        let result = match result {
            Ok(()) => {
                inner
                    .transfer_stats
                    .total_processed
                    .fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                inner
                    .transfer_stats
                    .total_failed
                    .fetch_add(1, Ordering::Relaxed);
                Err(AttemptFailure::Transfer(e.to_string()))
            }
        };
        let _ = inner
            .event_tx
            .send(TaskEvent::TransferFinished {
                item_index,
                attempt,
                result,
            })
            .await;
    }

    /// Assembles and verifies under one assemble-pool permit, so a
    /// verify never overlaps with more assemblies than the pool allows.
    async fn run_assemble_verify(
        inner: Arc<Inner<T, A>>,
        item_index: u32,
        attempt: u64,
        workspace: PathBuf,
        output: PathBuf,
    ) {
        inner.assemble_stats.queued.fetch_add(1, Ordering::Relaxed);
        let permit = match inner.assemble_semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        inner.assemble_stats.queued.fetch_sub(1, Ordering::Relaxed);
        inner.assemble_stats.active.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let request = AssembleRequest {
            workspace,
            output: output.clone(),
        };
        let assemble_result = inner.assembler.assemble(&request).await;
        let label = if assemble_result.is_ok() {
            "success"
        } else {
            "failed"
        };
        metrics::ASSEMBLIES_TOTAL.with_label_values(&[label]).inc();
        metrics::ASSEMBLY_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        if let Err(e) = assemble_result {
            inner.assemble_stats.active.fetch_sub(1, Ordering::Relaxed);
            inner
                .assemble_stats
                .total_failed
                .fetch_add(1, Ordering::Relaxed);
            drop(permit);
            let _ = inner
                .event_tx
                .send(TaskEvent::AssembleFinished {
                    item_index,
                    attempt,
                    result: Err(AttemptFailure::Assemble(e.to_string())),
                })
                .await;
            return;
        }
        let _ = inner
            .event_tx
            .send(TaskEvent::AssembleFinished {
                item_index,
                attempt,
                result: Ok(()),
            })
            .await;

        let outcome = inner.gate.authoritative_check(&output).await;
        metrics::VERIFIES_TOTAL
            .with_label_values(&[if outcome.passes { "pass" } else { "reject" }])
            .inc();
        inner.assemble_stats.active.fetch_sub(1, Ordering::Relaxed);
        drop(permit);

        let outcome = if outcome.passes {
            inner
                .assemble_stats
                .total_processed
                .fetch_add(1, Ordering::Relaxed);
            match outcome.resolution() {
                Some(resolution) => Ok(resolution),
                None => Err(AttemptFailure::QualityRejected {
                    width: outcome.width,
                    height: outcome.height,
                }),
            }
        } else {
            inner
                .assemble_stats
                .total_failed
                .fetch_add(1, Ordering::Relaxed);
            // A substandard artifact must not survive to be mistaken
            // for a good one.
            let _ = tokio::fs::remove_file(&output).await;
            Err(AttemptFailure::QualityRejected {
                width: outcome.width,
                height: outcome.height,
            })
        };
        let _ = inner
            .event_tx
            .send(TaskEvent::VerifyFinished {
                item_index,
                attempt,
                outcome,
            })
            .await;
    }

    async fn run_event_loop(
        inner: Arc<Inner<T, A>>,
        mut event_rx: mpsc::Receiver<TaskEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("orchestrator event loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("orchestrator event loop stopping");
                    break;
                }
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    Self::handle_event(&inner, event).await;
                }
            }
        }
    }

    async fn handle_event(inner: &Arc<Inner<T, A>>, event: TaskEvent) {
        match event {
            TaskEvent::TransferFinished {
                item_index,
                attempt,
                result,
            } => match result {
                Ok(()) => {
                    let next = {
                        let mut records = inner.records.write().await;
                        let Some(record) = current_attempt(&mut records, item_index, attempt)
                        else {
                            return;
                        };
                        record.state = ItemState::Assembling;
                        record.current.as_ref().map(|c| {
                            (c.workspace.clone(), inner.output_dir.join(&record.item.output_name))
                        })
                    };
                    if let Some((workspace, output)) = next {
                        debug!(item = item_index, attempt, "transfer done, assembling");
                        let inner = Arc::clone(inner);
                        tokio::spawn(async move {
                            Self::run_assemble_verify(inner, item_index, attempt, workspace, output)
                                .await;
                        });
                    }
                }
                Err(failure) => Self::fail_attempt(inner, item_index, attempt, failure).await,
            },
            TaskEvent::AssembleFinished {
                item_index,
                attempt,
                result,
            } => match result {
                Ok(()) => {
                    let mut records = inner.records.write().await;
                    if let Some(record) = current_attempt(&mut records, item_index, attempt) {
                        record.state = ItemState::Verifying;
                    }
                }
                Err(failure) => Self::fail_attempt(inner, item_index, attempt, failure).await,
            },
            TaskEvent::VerifyFinished {
                item_index,
                attempt,
                outcome,
            } => match outcome {
                Ok(resolution) => {
                    let workspace = {
                        let mut records = inner.records.write().await;
                        let Some(record) = current_attempt(&mut records, item_index, attempt)
                        else {
                            return;
                        };
                        let current = record.current.take();
                        record.state = ItemState::Done;
                        record.resolution = Some(resolution);
                        record.artifact = Some(inner.output_dir.join(&record.item.output_name));
                        record.source_label = current.as_ref().map(|c| c.candidate_label.clone());
                        current.map(|c| c.workspace)
                    };
                    info!(item = item_index, %resolution, "item done");
                    metrics::ITEMS_COMPLETED.inc();
                    if let Some(workspace) = workspace {
                        let _ = tokio::fs::remove_dir_all(&workspace).await;
                    }
                }
                Err(failure) => Self::fail_attempt(inner, item_index, attempt, failure).await,
            },
        }
    }

    /// Applies a failed attempt: exclude the candidate, scrap the
    /// workspace, put the item back up for search.
    async fn fail_attempt(
        inner: &Arc<Inner<T, A>>,
        item_index: u32,
        attempt: u64,
        failure: AttemptFailure,
    ) {
        let request = {
            let mut records = inner.records.write().await;
            let Some(record) = current_attempt(&mut records, item_index, attempt) else {
                return;
            };
            let current = record.current.take();
            if let Some(current) = &current {
                record.excluded.insert(current.candidate_index);
            }
            record.state = ItemState::Searching;
            warn!(
                item = item_index,
                attempt,
                reason = %failure.describe(),
                excluded = record.excluded.len(),
                "attempt failed, requesting retry"
            );
            let request = RetryRequest {
                item: record.item.clone(),
                excluded: record.excluded.clone(),
            };
            (request, current.map(|c| c.workspace))
        };
        let (retry, workspace) = request;
        if let Some(workspace) = workspace {
            let _ = tokio::fs::remove_dir_all(&workspace).await;
        }
        metrics::RETRY_ATTEMPTS.inc();
        if inner.retry_tx.send(retry).await.is_err() {
            // Producer is gone; nothing can re-search this item.
            let mut records = inner.records.write().await;
            if let Some(record) = records.get_mut(&item_index) {
                record.state = ItemState::Abandoned("retry channel closed".to_string());
                metrics::ITEMS_ABANDONED.inc();
            }
        }
    }
}

/// Record lookup fenced by attempt number, so completions from a
/// superseded attempt are consumed at most once and otherwise dropped.
fn current_attempt<'a>(
    records: &'a mut HashMap<u32, ItemRecord>,
    item_index: u32,
    attempt: u64,
) -> Option<&'a mut ItemRecord> {
    let record = records.get_mut(&item_index)?;
    if record.attempt != attempt || record.state.is_terminal() || record.current.is_none() {
        debug!(item = item_index, attempt, "ignoring stale task event");
        return None;
    }
    Some(record)
}

//! The acquisition session: the single producer that owns the page
//! driver.
//!
//! All page interaction happens here, strictly sequentially. The
//! session enumerates items, runs the initial search for each, feeds
//! the orchestrator, serves its retry requests, and drains the run
//! into a final summary.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::assemble::Assembler;
use crate::config::AcquisitionConfig;
use crate::driver::{DriverError, Item, PageDriver};
use crate::orchestrator::{AcquisitionOrchestrator, RetryRequest};
use crate::report::{Reporter, RunSummary};
use crate::search::{CandidateSearch, SearchOutcome};
use crate::transfer::Transferrer;

const EXHAUSTED_REASON: &str = "all sources exhausted";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("no items discovered")]
    NoItems,

    #[error("selected item {requested} exceeds the {available} discovered items")]
    SelectionOutOfRange { requested: u32, available: usize },
}

pub struct AcquisitionSession<D, T, A>
where
    D: PageDriver,
    T: Transferrer + 'static,
    A: Assembler + 'static,
{
    driver: D,
    search: CandidateSearch,
    orchestrator: AcquisitionOrchestrator<T, A>,
    retry_rx: tokio::sync::mpsc::Receiver<RetryRequest>,
    acquisition: AcquisitionConfig,
    drain_budget: Duration,
    reporter: Reporter,
}

impl<D, T, A> AcquisitionSession<D, T, A>
where
    D: PageDriver,
    T: Transferrer + 'static,
    A: Assembler + 'static,
{
    pub fn new(
        driver: D,
        search: CandidateSearch,
        orchestrator: AcquisitionOrchestrator<T, A>,
        retry_rx: tokio::sync::mpsc::Receiver<RetryRequest>,
        acquisition: AcquisitionConfig,
        drain_budget: Duration,
        reporter: Reporter,
    ) -> Self {
        Self {
            driver,
            search,
            orchestrator,
            retry_rx,
            acquisition,
            drain_budget,
            reporter,
        }
    }

    /// Runs the session to completion and returns the summary.
    pub async fn run(mut self) -> Result<RunSummary, SessionError> {
        let all_items = self.driver.enumerate_items().await?;
        if all_items.is_empty() {
            return Err(SessionError::NoItems);
        }
        let selected = select_items(
            &all_items,
            self.acquisition.items.as_deref(),
            self.acquisition.start_index,
        )?;
        info!(
            discovered = all_items.len(),
            selected = selected.len(),
            "starting acquisition session"
        );

        self.orchestrator.start().await;
        let deadline = Instant::now() + self.drain_budget;

        for item in &selected {
            self.search_and_submit(item, &Default::default()).await;
        }

        // Serve retries until everything is terminal or the budget
        // runs out.
        loop {
            if self.orchestrator.is_drained().await {
                break;
            }
            if Instant::now() >= deadline {
                warn!("drain budget expired, abandoning in-flight items");
                self.orchestrator
                    .abandon_in_flight("drain budget expired")
                    .await;
                break;
            }
            tokio::select! {
                request = self.retry_rx.recv() => {
                    let Some(request) = request else { break };
                    self.search_and_submit(&request.item, &request.excluded).await;
                }
                _ = tokio::time::sleep(Duration::from_millis(200)) => {
                    let status = self.orchestrator.status().await;
                    debug!(
                        done = status.done,
                        abandoned = status.abandoned,
                        in_flight = status.in_flight,
                        transfers_active = status.transfer_pool.active_jobs,
                        transfers_queued = status.transfer_pool.queued_jobs,
                        "drain progress"
                    );
                }
            }
        }

        self.orchestrator.stop().await;
        let records = self.orchestrator.item_reports().await;
        let summary = self.reporter.summarize(&records);
        self.reporter.cleanup(&records).await;
        if let Err(e) = self.reporter.write_report(&summary).await {
            warn!(error = %e, "could not write report file");
        }
        info!(
            done = summary.done,
            total = summary.total,
            reacquire = %summary.reacquire_ranges,
            "session finished"
        );
        Ok(summary)
    }

    /// One sequential search pass for an item, ending in a submit or a
    /// terminal abandon.
    async fn search_and_submit(
        &mut self,
        item: &Item,
        excluded: &std::collections::HashSet<usize>,
    ) {
        match self.search.run(&mut self.driver, item, excluded).await {
            Ok(SearchOutcome::Found {
                locator,
                candidate_index,
                candidate_label,
                ..
            }) => {
                if let Err(e) = self
                    .orchestrator
                    .submit(item.clone(), locator, candidate_index, candidate_label)
                    .await
                {
                    error!(item = item.index, error = %e, "submit rejected");
                }
            }
            Ok(SearchOutcome::Exhausted) => {
                self.orchestrator
                    .mark_abandoned(item, EXHAUSTED_REASON)
                    .await;
            }
            Err(e) => {
                error!(item = item.index, error = %e, "candidate enumeration failed");
                self.orchestrator
                    .mark_abandoned(item, &format!("driver error: {e}"))
                    .await;
            }
        }
    }
}

/// Resolves the configured selection against the discovered items.
/// An explicit index past the end of the list is a configuration error
/// raised before any work starts.
fn select_items(
    all: &[Item],
    selection: Option<&[u32]>,
    start_index: u32,
) -> Result<Vec<Item>, SessionError> {
    match selection {
        Some(indices) => {
            let mut indices: Vec<u32> = indices.to_vec();
            indices.sort_unstable();
            indices.dedup();
            let mut items = Vec::with_capacity(indices.len());
            for index in indices {
                let Some(item) = all.iter().find(|i| i.index == index) else {
                    return Err(SessionError::SelectionOutOfRange {
                        requested: index,
                        available: all.len(),
                    });
                };
                items.push(item.clone());
            }
            Ok(items)
        }
        None => Ok(all
            .iter()
            .filter(|i| i.index >= start_index)
            .cloned()
            .collect()),
    }
}

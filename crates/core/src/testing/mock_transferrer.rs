//! Mock transferrer for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::transfer::{TransferError, TransferRequest, Transferrer};

struct TransferrerState {
    calls: Vec<TransferRequest>,
    /// Scripted results, consumed in order; empty means success.
    results: VecDeque<Result<(), String>>,
    delay: Duration,
}

/// Mock implementation of the [`Transferrer`] trait.
///
/// Records every request, supports scripted failures and simulated
/// duration, and tracks the highest number of transfers it ever ran
/// at once so pool bounds can be asserted.
#[derive(Clone)]
pub struct MockTransferrer {
    state: Arc<Mutex<TransferrerState>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for MockTransferrer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransferrer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransferrerState {
                calls: Vec::new(),
                results: VecDeque::new(),
                delay: Duration::ZERO,
            })),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queues a result for the next transfer; `Err` holds a diagnostic.
    pub fn push_result(&self, result: Result<(), String>) {
        self.state.lock().unwrap().results.push_back(result);
    }

    /// Simulated transfer duration.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Every request seen so far.
    pub fn calls(&self) -> Vec<TransferRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Highest observed concurrent transfer count.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transferrer for MockTransferrer {
    async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError> {
        let (delay, result) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(request.clone());
            (state.delay, state.results.pop_front().unwrap_or(Ok(())))
        };

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(()) => {
                tokio::fs::create_dir_all(&request.workspace).await?;
                tokio::fs::write(request.workspace.join("seg000.ts"), b"mock segment").await?;
                Ok(())
            }
            Err(diagnostic) => Err(TransferError::DownloaderFailed {
                attempts: 1,
                last_diagnostic: diagnostic,
            }),
        }
    }
}

//! Mock assembler for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::assemble::{AssembleError, AssembleRequest, Assembler};

struct AssemblerState {
    calls: Vec<AssembleRequest>,
    results: VecDeque<Result<(), String>>,
}

/// Mock implementation of the [`Assembler`] trait.
///
/// On success it writes a small placeholder artifact to the requested
/// output path, so tests asserting artifact deletion have a real file
/// to watch.
#[derive(Clone)]
pub struct MockAssembler {
    state: Arc<Mutex<AssemblerState>>,
}

impl Default for MockAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAssembler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AssemblerState {
                calls: Vec::new(),
                results: VecDeque::new(),
            })),
        }
    }

    /// Queues a result for the next assembly; `Err` holds a diagnostic.
    pub fn push_result(&self, result: Result<(), String>) {
        self.state.lock().unwrap().results.push_back(result);
    }

    /// Every request seen so far.
    pub fn calls(&self) -> Vec<AssembleRequest> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Assembler for MockAssembler {
    async fn assemble(&self, request: &AssembleRequest) -> Result<(), AssembleError> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(request.clone());
            state.results.pop_front().unwrap_or(Ok(()))
        };
        match result {
            Ok(()) => {
                if let Some(parent) = request.output.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&request.output, b"mock artifact").await?;
                Ok(())
            }
            Err(diagnostic) => Err(AssembleError::FfmpegFailed(diagnostic)),
        }
    }
}

pub mod assemble;
pub mod config;
pub mod driver;
pub mod metrics;
pub mod orchestrator;
pub mod probe;
pub mod ranker;
pub mod report;
pub mod search;
pub mod session;
pub mod testing;
pub mod transfer;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use driver::{CaptureFileDriver, Item, PageDriver, SourceCandidate};
pub use orchestrator::{AcquisitionOrchestrator, ItemRecord, ItemState, OrchestratorConfig};
pub use probe::{FfprobeInspector, QualityGate, QualityProbe, Resolution};
pub use report::{Reporter, RunSummary};
pub use search::{CandidateSearch, Locator, SearchOutcome};
pub use session::{AcquisitionSession, SessionError};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::assemble::AssembleConfig;
use crate::driver::CaptureConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::probe::{InspectorConfig, ProbeConfig};
use crate::transfer::TransferConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Capture replay driver settings. Required: the capture file is
    /// the run's input.
    pub capture: CaptureConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Item selection and quality settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// First item to acquire; earlier items are skipped.
    #[serde(default = "default_start_index")]
    pub start_index: u32,
    /// Explicit 1-based item selection. Absent means every item from
    /// `start_index` on.
    #[serde(default)]
    pub items: Option<Vec<u32>>,
    /// How long the driver waits for manifest URLs per candidate.
    #[serde(default = "default_manifest_wait_ms")]
    pub manifest_wait_ms: u64,
    /// Quality floor and probe behavior.
    #[serde(flatten)]
    pub probe: ProbeConfig,
}

fn default_start_index() -> u32 {
    1
}

fn default_manifest_wait_ms() -> u64 {
    2000
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            start_index: default_start_index(),
            items: None,
            manifest_wait_ms: default_manifest_wait_ms(),
            probe: ProbeConfig::default(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Where finished artifacts land.
    pub output_dir: PathBuf,
    /// Scratch root for per-attempt workspaces.
    /// Defaults to `<output_dir>/.rita-tmp`.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// Report file name, written under `output_dir`.
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

fn default_report_file() -> String {
    "reacquire.json".to_string()
}

impl PathsConfig {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| self.output_dir.join(".rita-tmp"))
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }
}

/// External tool settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub assemble: AssembleConfig,
    #[serde(default)]
    pub inspector: InspectorConfig,
}

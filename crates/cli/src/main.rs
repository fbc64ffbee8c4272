use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hlsworth_core::assemble::FfmpegAssembler;
use hlsworth_core::driver::CaptureFileDriver;
use hlsworth_core::orchestrator::AcquisitionOrchestrator;
use hlsworth_core::probe::{FfprobeInspector, MediaInspector, QualityGate, QualityProbe};
use hlsworth_core::report::{Reporter, RunSummary};
use hlsworth_core::search::CandidateSearch;
use hlsworth_core::session::AcquisitionSession;
use hlsworth_core::transfer::CommandTransferrer;
use hlsworth_core::{load_config, metrics, validate_config};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    match run().await {
        Ok(summary) => {
            if !summary.reacquire.is_empty() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run() -> Result<RunSummary> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("rita {}", VERSION);

    // Determine config path: first argument, then RITA_CONFIG, then cwd
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var("RITA_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("rita.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let workspace_root = config.paths.workspace_root();
    info!("Output directory: {:?}", config.paths.output_dir);
    info!("Workspace root: {:?}", workspace_root);

    // Register metrics so internal counters are collected
    let registry = prometheus::Registry::new();
    for metric in metrics::all_metrics() {
        let _ = registry.register(metric);
    }

    // External tools
    let transferrer = CommandTransferrer::new(config.tools.transfer.clone());
    transferrer
        .validate()
        .await
        .context("Segment downloader unavailable")?;
    let assembler = FfmpegAssembler::new(config.tools.assemble.clone());
    assembler.validate().await.context("ffmpeg unavailable")?;

    // Quality gate
    let inspector: Arc<dyn MediaInspector> =
        Arc::new(FfprobeInspector::new(config.tools.inspector.clone()));
    let gate: Arc<dyn QualityGate> = Arc::new(
        QualityProbe::new(
            config.acquisition.probe.clone(),
            inspector,
            workspace_root.join("samples"),
        )
        .context("Failed to build quality probe")?,
    );

    // Capture replay driver
    let driver = CaptureFileDriver::load(&config.capture)
        .await
        .context("Failed to load capture file")?;

    // Pipeline wiring
    let (orchestrator, retry_rx) = AcquisitionOrchestrator::new(
        config.orchestrator.clone(),
        transferrer,
        assembler,
        Arc::clone(&gate),
        config.paths.output_dir.clone(),
        workspace_root.clone(),
    );
    let search = CandidateSearch::new(
        gate,
        Duration::from_millis(config.acquisition.manifest_wait_ms),
    );
    let reporter = Reporter::new(
        config.acquisition.probe.quality_floor_width,
        workspace_root,
        config.paths.report_path(),
    );
    let session = AcquisitionSession::new(
        driver,
        search,
        orchestrator,
        retry_rx,
        config.acquisition.clone(),
        Duration::from_secs(config.orchestrator.drain_budget_secs),
        reporter,
    );

    let summary = session.run().await.context("Acquisition session failed")?;

    println!("\n{}/{} items acquired", summary.done, summary.total);
    for item in &summary.items {
        println!("{}", item.summary_line());
    }
    if !summary.reacquire.is_empty() {
        println!("re-acquire: {}", summary.reacquire_ranges);
    }

    Ok(summary)
}

//! External downloader invocation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::config::TransferConfig;
use super::error::TransferError;
use super::types::TransferRequest;
use super::Transferrer;

/// Quiet-mode argument variants, tried in order. Downloader releases
/// disagree on which flag exists; an invocation that fails fast is
/// retried with the next variant.
const SILENT_FLAG_SETS: &[&[&str]] = &[&[], &["--quiet"], &["--log-level", "error"]];

/// [`Transferrer`] shelling out to an N_m3u8DL-RE style downloader.
pub struct CommandTransferrer {
    config: TransferConfig,
}

impl CommandTransferrer {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Checks the downloader binary responds at all.
    pub async fn validate(&self) -> Result<(), TransferError> {
        let result = Command::new(&self.config.downloader_path)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(TransferError::DownloaderUnavailable(format!(
                "{}: {e}",
                self.config.downloader_path
            ))),
        }
    }

    async fn invoke(
        &self,
        request: &TransferRequest,
        silent_flags: &[&str],
    ) -> Result<(), String> {
        let args = build_downloader_args(request, silent_flags);
        debug!(url = %request.url, ?silent_flags, "invoking downloader");
        let fut = Command::new(&self.config.downloader_path)
            .args(&args)
            .kill_on_drop(true)
            .output();
        let output = match tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            fut,
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("spawn failed: {e}")),
            Err(_) => {
                return Err(format!(
                    "timed out after {} seconds",
                    self.config.timeout_secs
                ))
            }
        };
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "exit {:?}: {}",
                output.status.code(),
                stderr.lines().last().unwrap_or("").trim()
            ))
        }
    }
}

#[async_trait]
impl Transferrer for CommandTransferrer {
    async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError> {
        tokio::fs::create_dir_all(&request.workspace).await?;
        let mut last_diagnostic = String::new();
        for (attempt, silent_flags) in SILENT_FLAG_SETS.iter().enumerate() {
            match self.invoke(request, silent_flags).await {
                Ok(()) => {
                    info!(url = %request.url, save_name = %request.save_name, "transfer complete");
                    return Ok(());
                }
                Err(diagnostic) => {
                    warn!(
                        url = %request.url,
                        attempt = attempt + 1,
                        %diagnostic,
                        "downloader invocation failed"
                    );
                    last_diagnostic = diagnostic;
                }
            }
        }
        Err(TransferError::DownloaderFailed {
            attempts: SILENT_FLAG_SETS.len(),
            last_diagnostic,
        })
    }
}

fn build_downloader_args(request: &TransferRequest, silent_flags: &[&str]) -> Vec<String> {
    let mut args = vec![
        request.url.clone(),
        "--save-dir".to_string(),
        request.workspace.display().to_string(),
        "--save-name".to_string(),
        request.save_name.clone(),
        "--tmp-dir".to_string(),
        request.workspace.display().to_string(),
        "--skip-merge".to_string(),
        "--no-log".to_string(),
    ];
    args.extend(silent_flags.iter().map(|s| s.to_string()));
    args
}

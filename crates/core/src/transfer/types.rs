use std::path::PathBuf;

/// One transfer job handed to a pool worker.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Manifest or variant URL to fetch segments from.
    pub url: String,
    /// Attempt workspace; segments land here unmerged.
    pub workspace: PathBuf,
    /// Base name for the downloader's output inside the workspace.
    pub save_name: String,
}

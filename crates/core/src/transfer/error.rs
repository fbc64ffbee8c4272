use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("downloader not found or not executable: {0}")]
    DownloaderUnavailable(String),

    #[error("downloader failed after {attempts} invocation variants: {last_diagnostic}")]
    DownloaderFailed {
        attempts: usize,
        last_diagnostic: String,
    },

    #[error("transfer timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("ffmpeg not found or not executable: {0}")]
    FfmpegUnavailable(String),

    #[error("no segments found under {0}")]
    NoSegments(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("assembly timed out after {0} seconds")]
    Timeout(u64),

    #[error("assembled artifact missing or empty: {0}")]
    EmptyArtifact(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

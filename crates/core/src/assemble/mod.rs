//! Container assembly.

mod config;
mod error;
mod ffmpeg;
mod types;

use async_trait::async_trait;

pub use config::AssembleConfig;
pub use error::AssembleError;
pub use ffmpeg::FfmpegAssembler;
pub use types::AssembleRequest;

#[async_trait]
pub trait Assembler: Send + Sync {
    async fn assemble(&self, request: &AssembleRequest) -> Result<(), AssembleError>;
}

//! Segment transfer.
//!
//! A transfer fetches every segment of one item's stream into an
//! attempt workspace without merging. Assembly is a separate stage.

mod command;
mod config;
mod error;
mod types;

use async_trait::async_trait;

pub use command::CommandTransferrer;
pub use config::TransferConfig;
pub use error::TransferError;
pub use types::TransferRequest;

#[async_trait]
pub trait Transferrer: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<(), TransferError>;
}

//! Page driver seam.
//!
//! All DOM-facing interaction (item enumeration, candidate discovery,
//! manifest sniffing) goes through [`PageDriver`]. The trait takes
//! `&mut self` everywhere: there is exactly one owner driving the page,
//! and pool workers never touch it.

mod capture;
mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use capture::{CaptureConfig, CaptureFileDriver};
pub use types::{sanitize_filename, DriverError, Item, SourceCandidate, TierMarkers};

/// Interaction with the source page.
///
/// Candidate sets are recomputed on every call; callers must not cache
/// them across searches.
#[async_trait]
pub trait PageDriver: Send {
    /// Driver name for logging.
    fn name(&self) -> &str;

    /// Discovers the full ordered item list for the asset.
    async fn enumerate_items(&mut self) -> Result<Vec<Item>, DriverError>;

    /// Discovers the currently available source candidates, tagged with
    /// their tier markers, in page discovery order.
    async fn enumerate_candidates(&mut self) -> Result<Vec<SourceCandidate>, DriverError>;

    /// Activates the candidate with the given index so that subsequent
    /// manifest listing reflects it.
    async fn switch_to_candidate(&mut self, index: usize) -> Result<(), DriverError>;

    /// Triggers playback of the given item on the active candidate and
    /// returns the manifest URLs observed within the wait budget, in
    /// observation order. An empty list is a valid outcome.
    async fn list_manifest_urls(
        &mut self,
        item_index: u32,
        wait: Duration,
    ) -> Result<Vec<String>, DriverError>;
}

use std::path::PathBuf;

/// One assembly job: turn a workspace full of segments into a single
/// container at `output`.
#[derive(Debug, Clone)]
pub struct AssembleRequest {
    /// Workspace the transfer filled with segments (and possibly a
    /// local playlist).
    pub workspace: PathBuf,
    /// Final artifact path.
    pub output: PathBuf,
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Path to the external HLS segment downloader binary.
    #[serde(default = "default_downloader_path")]
    pub downloader_path: String,
    /// Per-transfer wall-clock timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_downloader_path() -> String {
    "N_m3u8DL-RE".to_string()
}

fn default_timeout_secs() -> u64 {
    3600
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            downloader_path: default_downloader_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

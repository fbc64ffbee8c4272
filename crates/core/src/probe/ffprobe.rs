//! Media inspection via ffprobe, with an ffmpeg banner fallback.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use super::types::Resolution;

static BANNER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Video:.*?(\d{3,4})x(\d{3,4})").expect("valid regex"));

/// Reads video dimensions out of a stream URL or a local file.
///
/// Fail-open: `None` means "could not determine", never an error.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    async fn inspect_url(&self, url: &str) -> Option<Resolution>;
    async fn inspect_file(&self, path: &Path) -> Option<Resolution>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorConfig {
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_inspect_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_inspect_timeout_secs() -> u64 {
    30
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe_path(),
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_inspect_timeout_secs(),
        }
    }
}

/// ffprobe-backed [`MediaInspector`].
pub struct FfprobeInspector {
    config: InspectorConfig,
}

impl FfprobeInspector {
    pub fn new(config: InspectorConfig) -> Self {
        Self { config }
    }

    async fn inspect_target(&self, target: &str) -> Option<Resolution> {
        if let Some(resolution) = self.ffprobe_dimensions(target).await {
            return Some(resolution);
        }
        // Some streams refuse ffprobe but still print a usable banner.
        self.ffmpeg_banner_dimensions(target).await
    }

    async fn ffprobe_dimensions(&self, target: &str) -> Option<Resolution> {
        let args = build_ffprobe_args(target);
        let output = self.run(&self.config.ffprobe_path, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_csv(&stdout)
    }

    async fn ffmpeg_banner_dimensions(&self, target: &str) -> Option<Resolution> {
        let args = vec!["-hide_banner".to_string(), "-i".to_string(), target.to_string()];
        // ffmpeg exits nonzero without an output file; the stderr banner
        // is still written, which is all we want.
        let output = self.run(&self.config.ffmpeg_path, &args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_ffmpeg_banner(&stderr)
    }

    async fn run(&self, program: &str, args: &[String]) -> Option<std::process::Output> {
        let fut = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), fut).await {
            Ok(Ok(output)) => Some(output),
            Ok(Err(e)) => {
                warn!(program, error = %e, "inspection command failed to spawn");
                None
            }
            Err(_) => {
                warn!(program, timeout_secs = self.config.timeout_secs, "inspection timed out");
                None
            }
        }
    }
}

#[async_trait]
impl MediaInspector for FfprobeInspector {
    async fn inspect_url(&self, url: &str) -> Option<Resolution> {
        debug!(url, "inspecting stream");
        self.inspect_target(url).await
    }

    async fn inspect_file(&self, path: &Path) -> Option<Resolution> {
        debug!(path = %path.display(), "inspecting file");
        self.inspect_target(&path.display().to_string()).await
    }
}

fn build_ffprobe_args(target: &str) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=width,height".to_string(),
        "-of".to_string(),
        "csv=p=0".to_string(),
        target.to_string(),
    ]
}

fn parse_ffprobe_csv(stdout: &str) -> Option<Resolution> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let mut parts = line.trim().split(',');
    let width = parts.next()?.trim().parse().ok()?;
    let height = parts.next()?.trim().parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Resolution { width, height })
}

fn parse_ffmpeg_banner(stderr: &str) -> Option<Resolution> {
    let caps = BANNER_RE.captures(stderr)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some(Resolution { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffprobe_args() {
        let args = build_ffprobe_args("https://cdn.example/v.m3u8");
        assert_eq!(args[0], "-v");
        assert!(args.contains(&"stream=width,height".to_string()));
        assert_eq!(args.last().unwrap(), "https://cdn.example/v.m3u8");
    }

    #[test]
    fn test_parse_ffprobe_csv() {
        assert_eq!(
            parse_ffprobe_csv("1920,1080\n"),
            Some(Resolution {
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(parse_ffprobe_csv("\n1280,720"), Some(Resolution { width: 1280, height: 720 }));
        assert_eq!(parse_ffprobe_csv(""), None);
        assert_eq!(parse_ffprobe_csv("garbage"), None);
        assert_eq!(parse_ffprobe_csv("0,0"), None);
    }

    #[test]
    fn test_parse_ffmpeg_banner() {
        let stderr = "Input #0, hls, from 'x':\n  Stream #0:0: Video: h264 (Main), yuv420p, 1920x1080 [SAR 1:1], 25 fps\n";
        assert_eq!(
            parse_ffmpeg_banner(stderr),
            Some(Resolution {
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(parse_ffmpeg_banner("Audio: aac, 44100 Hz"), None);
    }
}

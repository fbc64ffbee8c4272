//! ffmpeg-backed assembly.
//!
//! Preferred path: the downloader leaves a local playlist
//! (`raw.m3u8`/`index.m3u8`) in the workspace and ffmpeg remuxes it
//! directly. Fallback: collect every `.ts` file recursively into a
//! concat list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::config::AssembleConfig;
use super::error::AssembleError;
use super::types::AssembleRequest;
use super::Assembler;

const PLAYLIST_NAMES: &[&str] = &["raw.m3u8", "index.m3u8"];

pub struct FfmpegAssembler {
    config: AssembleConfig,
}

impl FfmpegAssembler {
    pub fn new(config: AssembleConfig) -> Self {
        Self { config }
    }

    /// Checks the ffmpeg binary responds at all.
    pub async fn validate(&self) -> Result<(), AssembleError> {
        let result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .kill_on_drop(true)
            .output()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(AssembleError::FfmpegUnavailable(format!(
                "{}: {e}",
                self.config.ffmpeg_path
            ))),
        }
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<(), AssembleError> {
        debug!(?args, "running ffmpeg");
        let fut = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .kill_on_drop(true)
            .output();
        let output =
            match tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), fut).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(AssembleError::FfmpegUnavailable(format!(
                        "{}: {e}",
                        self.config.ffmpeg_path
                    )))
                }
                Err(_) => return Err(AssembleError::Timeout(self.config.timeout_secs)),
            };
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AssembleError::FfmpegFailed(
                stderr.lines().last().unwrap_or("unknown").trim().to_string(),
            ))
        }
    }

    async fn check_artifact(&self, output: &Path) -> Result<(), AssembleError> {
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(AssembleError::EmptyArtifact(output.display().to_string())),
        }
    }
}

#[async_trait]
impl Assembler for FfmpegAssembler {
    async fn assemble(&self, request: &AssembleRequest) -> Result<(), AssembleError> {
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let Some(playlist) = find_playlist(&request.workspace) {
            info!(
                playlist = %playlist.display(),
                output = %request.output.display(),
                "assembling via playlist remux"
            );
            let args = build_remux_args(&playlist, &request.output);
            self.run_ffmpeg(&args).await?;
            return self.check_artifact(&request.output).await;
        }

        let segments = collect_segments(&request.workspace);
        if segments.is_empty() {
            return Err(AssembleError::NoSegments(
                request.workspace.display().to_string(),
            ));
        }
        info!(
            segments = segments.len(),
            output = %request.output.display(),
            "assembling via concat list"
        );
        let list_path = request.workspace.join("concat.txt");
        tokio::fs::write(&list_path, concat_list(&segments)).await?;
        let args = build_concat_args(&list_path, &request.output);
        self.run_ffmpeg(&args).await?;
        self.check_artifact(&request.output).await
    }
}

/// First known playlist file found under the workspace, searched
/// breadth-first so a top-level playlist wins over nested ones.
fn find_playlist(workspace: &Path) -> Option<PathBuf> {
    let mut queue = vec![workspace.to_path_buf()];
    while !queue.is_empty() {
        let mut next = Vec::new();
        for dir in queue {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut subdirs = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    subdirs.push(path);
                } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if PLAYLIST_NAMES.contains(&name) {
                        return Some(path);
                    }
                }
            }
            next.extend(subdirs);
        }
        queue = next;
    }
    None
}

/// All `.ts` files under the workspace, recursively, sorted by path so
/// numbered segments concatenate in order.
fn collect_segments(workspace: &Path) -> Vec<PathBuf> {
    let mut segments = Vec::new();
    let mut stack = vec![workspace.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("ts") {
                segments.push(path);
            }
        }
    }
    segments.sort();
    segments
}

fn concat_list(segments: &[PathBuf]) -> String {
    let mut list = String::new();
    for segment in segments {
        let escaped = segment.display().to_string().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    list
}

fn build_remux_args(playlist: &Path, output: &Path) -> Vec<String> {
    vec![
        "-allowed_extensions".to_string(),
        "ALL".to_string(),
        "-i".to_string(),
        playlist.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-bsf:a".to_string(),
        "aac_adtstoasc".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

fn build_concat_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-bsf:a".to_string(),
        "aac_adtstoasc".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remux_args() {
        let args = build_remux_args(Path::new("/ws/raw.m3u8"), Path::new("/out/e1.mp4"));
        assert_eq!(args[0], "-allowed_extensions");
        assert!(args.contains(&"aac_adtstoasc".to_string()));
        assert_eq!(args.last().unwrap(), "/out/e1.mp4");
    }

    #[test]
    fn test_concat_args() {
        let args = build_concat_args(Path::new("/ws/concat.txt"), Path::new("/out/e1.mp4"));
        assert!(args.starts_with(&["-f".to_string(), "concat".to_string()]));
        assert!(args.contains(&"-safe".to_string()));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/ws/a's.ts"), PathBuf::from("/ws/b.ts")]);
        assert!(list.contains(r#"file '/ws/a'\''s.ts'"#));
        assert!(list.ends_with("file '/ws/b.ts'\n"));
    }

    #[test]
    fn test_find_playlist_prefers_shallow() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/raw.m3u8"), "x").unwrap();
        std::fs::write(dir.path().join("index.m3u8"), "x").unwrap();
        let found = find_playlist(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("index.m3u8"));
    }

    #[test]
    fn test_collect_segments_sorted_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/seg002.ts"), "x").unwrap();
        std::fs::write(dir.path().join("sub/seg001.ts"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let segments = collect_segments(dir.path());
        assert_eq!(segments.len(), 2);
        assert!(segments[0].ends_with("seg001.ts"));
    }

    #[tokio::test]
    async fn test_empty_workspace_is_no_segments() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = FfmpegAssembler::new(AssembleConfig::default());
        let err = assembler
            .assemble(&AssembleRequest {
                workspace: dir.path().to_path_buf(),
                output: dir.path().join("out.mp4"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AssembleError::NoSegments(_)));
    }
}

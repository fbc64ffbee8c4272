//! Run summary, cleanup, and the re-acquisition report.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::orchestrator::{ItemRecord, ItemState};
use crate::probe::Resolution;

/// Final outcome of one item, as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Done {
        resolution: Resolution,
        artifact: PathBuf,
        source_label: Option<String>,
    },
    Abandoned {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub index: u32,
    pub label: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemReport {
    /// One human-readable summary line, original-tool style.
    pub fn summary_line(&self) -> String {
        match &self.outcome {
            ItemOutcome::Done {
                resolution,
                source_label,
                ..
            } => format!(
                "  ✓ {:>3} {} [{}] via {}",
                self.index,
                self.label,
                resolution,
                source_label.as_deref().unwrap_or("?")
            ),
            ItemOutcome::Abandoned { reason } => {
                format!("  ✗ {:>3} {} ({reason})", self.index, self.label)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub done: usize,
    pub items: Vec<ItemReport>,
    /// Item indices that need another run, ascending.
    pub reacquire: Vec<u32>,
    /// Same list, compressed (`3-5,8,11-13`).
    pub reacquire_ranges: String,
}

/// Compresses sorted indices into contiguous ranges: `[3,4,5,8,11,12,13]`
/// becomes `"3-5,8,11-13"`.
pub fn compress_ranges(indices: &[u32]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut i = 0;
    while i < indices.len() {
        let start = indices[i];
        let mut end = start;
        while i + 1 < indices.len() && indices[i + 1] == end + 1 {
            i += 1;
            end = indices[i];
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
        i += 1;
    }
    parts.join(",")
}

pub struct Reporter {
    quality_floor_width: u32,
    workspace_root: PathBuf,
    report_path: PathBuf,
}

impl Reporter {
    pub fn new(quality_floor_width: u32, workspace_root: PathBuf, report_path: PathBuf) -> Self {
        Self {
            quality_floor_width,
            workspace_root,
            report_path,
        }
    }

    /// Builds the run summary from the orchestrator's final records.
    pub fn summarize(&self, records: &[ItemRecord]) -> RunSummary {
        let mut items = Vec::with_capacity(records.len());
        let mut reacquire = Vec::new();
        let mut done = 0;
        for record in records {
            let report = match &record.state {
                ItemState::Done => {
                    let resolution = record.resolution.unwrap_or(Resolution {
                        width: 0,
                        height: 0,
                    });
                    if resolution.width < self.quality_floor_width {
                        reacquire.push(record.item.index);
                    } else {
                        done += 1;
                    }
                    ItemReport {
                        index: record.item.index,
                        label: record.item.label.clone(),
                        outcome: ItemOutcome::Done {
                            resolution,
                            artifact: record.artifact.clone().unwrap_or_default(),
                            source_label: record.source_label.clone(),
                        },
                    }
                }
                ItemState::Abandoned(reason) => {
                    reacquire.push(record.item.index);
                    ItemReport {
                        index: record.item.index,
                        label: record.item.label.clone(),
                        outcome: ItemOutcome::Abandoned {
                            reason: reason.clone(),
                        },
                    }
                }
                other => {
                    // Non-terminal records at summary time mean the
                    // drain was cut short; count them as needing
                    // another run.
                    reacquire.push(record.item.index);
                    ItemReport {
                        index: record.item.index,
                        label: record.item.label.clone(),
                        outcome: ItemOutcome::Abandoned {
                            reason: format!("still {} at shutdown", other.name()),
                        },
                    }
                }
            };
            items.push(report);
        }
        reacquire.sort_unstable();
        let reacquire_ranges = compress_ranges(&reacquire);
        RunSummary {
            total: records.len(),
            done,
            items,
            reacquire,
            reacquire_ranges,
        }
    }

    /// Removes below-floor leftovers and the scratch workspace root.
    /// Every step is fail-soft; cleanup must never fail the run.
    pub async fn cleanup(&self, records: &[ItemRecord]) {
        for record in records {
            let below_floor = record
                .resolution
                .map(|r| r.width < self.quality_floor_width)
                .unwrap_or(false);
            if below_floor {
                if let Some(artifact) = &record.artifact {
                    if let Err(e) = tokio::fs::remove_file(artifact).await {
                        warn!(
                            artifact = %artifact.display(),
                            error = %e,
                            "could not remove below-floor artifact"
                        );
                    } else {
                        info!(artifact = %artifact.display(), "removed below-floor artifact");
                    }
                }
            }
        }
        if self.workspace_root.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&self.workspace_root).await {
                warn!(
                    workspace = %self.workspace_root.display(),
                    error = %e,
                    "could not remove workspace root"
                );
            }
        }
    }

    /// Writes the summary (including the re-acquisition list) as JSON.
    pub async fn write_report(&self, summary: &RunSummary) -> std::io::Result<()> {
        if let Some(parent) = self.report_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(&self.report_path, json).await?;
        info!(report = %self.report_path.display(), "report written");
        Ok(())
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Item;

    fn done_record(index: u32, width: u32) -> ItemRecord {
        let mut record = ItemRecord::new(Item::numbered(index, format!("EP{index:02}"), "Show", 1));
        record.state = ItemState::Done;
        record.resolution = Some(Resolution {
            width,
            height: width * 9 / 16,
        });
        record.artifact = Some(PathBuf::from(format!("/out/e{index}.mp4")));
        record.source_label = Some("A".to_string());
        record
    }

    fn abandoned_record(index: u32) -> ItemRecord {
        let mut record = ItemRecord::new(Item::numbered(index, format!("EP{index:02}"), "Show", 1));
        record.state = ItemState::Abandoned("all sources exhausted".to_string());
        record
    }

    #[test]
    fn test_compress_ranges() {
        assert_eq!(compress_ranges(&[3, 4, 5, 8, 11, 12, 13]), "3-5,8,11-13");
        assert_eq!(compress_ranges(&[1]), "1");
        assert_eq!(compress_ranges(&[]), "");
        assert_eq!(compress_ranges(&[2, 4, 6]), "2,4,6");
        assert_eq!(compress_ranges(&[1, 2]), "1-2");
    }

    #[test]
    fn test_summary_counts_and_reacquire() {
        let reporter = Reporter::new(1920, PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/r.json"));
        let records = vec![
            done_record(1, 1920),
            abandoned_record(2),
            abandoned_record(3),
            done_record(4, 1920),
        ];
        let summary = reporter.summarize(&records);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.done, 2);
        assert_eq!(summary.reacquire, vec![2, 3]);
        assert_eq!(summary.reacquire_ranges, "2-3");
    }

    #[test]
    fn test_below_floor_done_is_reacquired() {
        let reporter = Reporter::new(1920, PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/r.json"));
        let summary = reporter.summarize(&[done_record(1, 1280)]);
        assert_eq!(summary.done, 0);
        assert_eq!(summary.reacquire, vec![1]);
    }

    #[test]
    fn test_summary_lines() {
        let reporter = Reporter::new(1920, PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/r.json"));
        let summary = reporter.summarize(&[done_record(1, 1920), abandoned_record(2)]);
        assert!(summary.items[0].summary_line().contains('✓'));
        assert!(summary.items[0].summary_line().contains("1920x1080"));
        assert!(summary.items[1].summary_line().contains('✗'));
    }

    #[tokio::test]
    async fn test_cleanup_removes_workspace_and_below_floor_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(workspace.join("item001")).unwrap();
        let artifact = dir.path().join("e1.mp4");
        std::fs::write(&artifact, b"x").unwrap();

        let mut record = done_record(1, 1280);
        record.artifact = Some(artifact.clone());

        let reporter = Reporter::new(1920, workspace.clone(), dir.path().join("r.json"));
        reporter.cleanup(&[record]).await;
        assert!(!workspace.exists());
        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn test_write_report_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let reporter = Reporter::new(1920, dir.path().join("ws"), path.clone());
        let summary = reporter.summarize(&[abandoned_record(7)]);
        reporter.write_report(&summary).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: RunSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.reacquire_ranges, "7");
    }
}

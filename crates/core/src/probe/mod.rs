//! Quality verification.
//!
//! Two checkpoints guard the pipeline: a cheap pre-transfer manifest
//! check and an authoritative post-assembly artifact check. Both are
//! fail-open and report outcomes rather than errors; a probe that
//! cannot reach a verdict never takes the whole run down.

mod ffprobe;
mod manifest;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use ffprobe::{FfprobeInspector, InspectorConfig, MediaInspector};
pub use manifest::{parse_manifest, ParsedManifest, Variant};
pub use types::{InconclusivePolicy, ManifestProbe, ProbeOutcome, Resolution};

use crate::metrics;

/// Quality checkpoints as seen by search and the orchestrator.
#[async_trait]
pub trait QualityGate: Send + Sync {
    /// Pre-transfer manifest check. Cheap, advisory.
    async fn cheap_check(&self, manifest_url: &str) -> ManifestProbe;

    /// Post-assembly artifact check. Ground truth.
    async fn authoritative_check(&self, artifact: &Path) -> ProbeOutcome;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Minimum acceptable width in pixels.
    #[serde(default = "default_quality_floor_width")]
    pub quality_floor_width: u32,
    /// Timeout for each manifest or segment fetch.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Handling of manifests without a resolution hint.
    #[serde(default)]
    pub inconclusive: InconclusivePolicy,
    /// Segments sampled by the `sample_probe` policy.
    #[serde(default = "default_sample_segments")]
    pub sample_segments: usize,
}

fn default_quality_floor_width() -> u32 {
    1920
}

fn default_fetch_timeout_ms() -> u64 {
    2000
}

fn default_sample_segments() -> usize {
    3
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            quality_floor_width: default_quality_floor_width(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            inconclusive: InconclusivePolicy::default(),
            sample_segments: default_sample_segments(),
        }
    }
}

/// Real [`QualityGate`] combining manifest fetching with a
/// [`MediaInspector`] for payload and artifact inspection.
pub struct QualityProbe {
    config: ProbeConfig,
    client: reqwest::Client,
    inspector: Arc<dyn MediaInspector>,
    scratch_dir: PathBuf,
}

impl QualityProbe {
    /// `scratch_dir` receives short-lived sample payloads; it is
    /// created lazily and the pipeline's cleanup removes it.
    pub fn new(
        config: ProbeConfig,
        inspector: Arc<dyn MediaInspector>,
        scratch_dir: PathBuf,
    ) -> Result<Self, reqwest::Error> {
        // Upstream hosts routinely present self-signed certificates.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()?;
        Ok(Self {
            config,
            client,
            inspector,
            scratch_dir,
        })
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response.text().await.ok(),
            Ok(response) => {
                debug!(url, status = %response.status(), "manifest fetch rejected");
                None
            }
            Err(e) => {
                debug!(url, error = %e, "manifest fetch failed");
                None
            }
        }
    }

    /// Downloads up to `sample_segments` segments into one scratch file
    /// and inspects it. Used when the manifest itself is silent about
    /// resolution.
    async fn sample_probe(&self, segments: &[String]) -> Option<Resolution> {
        if segments.is_empty() {
            return None;
        }
        let mut payload = Vec::new();
        for url in segments.iter().take(self.config.sample_segments) {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.bytes().await {
                        Ok(bytes) => payload.extend_from_slice(&bytes),
                        Err(e) => debug!(url, error = %e, "sample segment body failed"),
                    }
                }
                Ok(response) => debug!(url, status = %response.status(), "sample segment rejected"),
                Err(e) => debug!(url, error = %e, "sample segment fetch failed"),
            }
        }
        if payload.is_empty() {
            return None;
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.scratch_dir).await {
            warn!(error = %e, "could not create sample scratch dir");
            return None;
        }
        let sample_path = self
            .scratch_dir
            .join(format!("sample-{}.ts", chrono::Utc::now().timestamp_millis()));
        if let Err(e) = tokio::fs::write(&sample_path, &payload).await {
            warn!(error = %e, "could not write sample payload");
            return None;
        }
        let resolution = self.inspector.inspect_file(&sample_path).await;
        let _ = tokio::fs::remove_file(&sample_path).await;
        resolution
    }

    async fn resolve_inconclusive(&self, source_url: &str, segments: &[String]) -> ProbeOutcome {
        match self.config.inconclusive {
            InconclusivePolicy::Reject => ProbeOutcome::inconclusive(),
            InconclusivePolicy::SampleProbe => {
                // The inspector can often read the playlist directly;
                // downloading sample segments is the fallback.
                let resolution = match self.inspector.inspect_url(source_url).await {
                    Some(resolution) => Some(resolution),
                    None => self.sample_probe(segments).await,
                };
                match resolution {
                    Some(resolution) => {
                        ProbeOutcome::from_resolution(resolution, self.config.quality_floor_width)
                    }
                    None => ProbeOutcome::inconclusive(),
                }
            }
        }
    }
}

fn outcome_label(outcome: &ProbeOutcome) -> &'static str {
    if outcome.passes {
        "pass"
    } else if outcome.resolution().is_some() {
        "reject"
    } else {
        "inconclusive"
    }
}

#[async_trait]
impl QualityGate for QualityProbe {
    async fn cheap_check(&self, manifest_url: &str) -> ManifestProbe {
        let inconclusive = ManifestProbe {
            outcome: ProbeOutcome::inconclusive(),
            variant_url: None,
        };
        let Some(text) = self.fetch_text(manifest_url).await else {
            metrics::CHEAP_CHECKS.with_label_values(&["fetch_failed"]).inc();
            return inconclusive;
        };
        let parsed = parse_manifest(manifest_url, &text);

        if parsed.is_master {
            if let Some(best) = parsed.best_variant() {
                let resolution = best.resolution.unwrap_or(Resolution { width: 0, height: 0 });
                let outcome =
                    ProbeOutcome::from_resolution(resolution, self.config.quality_floor_width);
                metrics::CHEAP_CHECKS
                    .with_label_values(&[if outcome.passes { "pass" } else { "reject" }])
                    .inc();
                return ManifestProbe {
                    outcome,
                    variant_url: Some(best.url.clone()),
                };
            }
            // Master with no resolution hints: look inside the first
            // variant's media playlist for segments to sample.
            let variant_url = parsed.variants.first().map(|v| v.url.clone());
            let segments = match &variant_url {
                Some(url) => match self.fetch_text(url).await {
                    Some(text) => parse_manifest(url, &text).segments,
                    None => Vec::new(),
                },
                None => Vec::new(),
            };
            let probe_url = variant_url.as_deref().unwrap_or(manifest_url);
            let outcome = self.resolve_inconclusive(probe_url, &segments).await;
            metrics::CHEAP_CHECKS
                .with_label_values(&[outcome_label(&outcome)])
                .inc();
            return ManifestProbe {
                outcome,
                variant_url,
            };
        }

        let outcome = self.resolve_inconclusive(manifest_url, &parsed.segments).await;
        metrics::CHEAP_CHECKS
            .with_label_values(&[outcome_label(&outcome)])
            .inc();
        ManifestProbe {
            outcome,
            variant_url: None,
        }
    }

    async fn authoritative_check(&self, artifact: &Path) -> ProbeOutcome {
        match self.inspector.inspect_file(artifact).await {
            Some(resolution) => {
                ProbeOutcome::from_resolution(resolution, self.config.quality_floor_width)
            }
            None => {
                warn!(artifact = %artifact.display(), "could not inspect artifact");
                ProbeOutcome::inconclusive()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Scripted inspector recording every call.
    struct ScriptedInspector {
        url_result: Option<Resolution>,
        file_result: Option<Resolution>,
        url_calls: Mutex<Vec<String>>,
        file_calls: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedInspector {
        fn new(url_result: Option<Resolution>, file_result: Option<Resolution>) -> Arc<Self> {
            Arc::new(Self {
                url_result,
                file_result,
                url_calls: Mutex::new(Vec::new()),
                file_calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MediaInspector for ScriptedInspector {
        async fn inspect_url(&self, url: &str) -> Option<Resolution> {
            self.url_calls.lock().unwrap().push(url.to_string());
            self.url_result
        }

        async fn inspect_file(&self, path: &Path) -> Option<Resolution> {
            self.file_calls.lock().unwrap().push(path.to_path_buf());
            self.file_result
        }
    }

    /// Serves canned bodies by path on an ephemeral port and returns
    /// the base URL.
    async fn serve(routes: HashMap<&'static str, String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let response = match routes.get(path.as_str()) {
                        Some(body) => format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ),
                        None => {
                            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                                .to_string()
                        }
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn probe_with(
        inconclusive: InconclusivePolicy,
        inspector: Arc<ScriptedInspector>,
        scratch: &Path,
    ) -> QualityProbe {
        let config = ProbeConfig {
            inconclusive,
            ..ProbeConfig::default()
        };
        QualityProbe::new(config, inspector, scratch.to_path_buf()).unwrap()
    }

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=1280x720\n\
        720p.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1920x1080\n\
        1080p.m3u8\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:10\n\
        #EXTINF:9.6,\n\
        seg000.ts\n";

    #[tokio::test]
    async fn test_cheap_check_master_picks_best_variant() {
        let base = serve(HashMap::from([("/master.m3u8", MASTER.to_string())])).await;
        let scratch = tempfile::tempdir().unwrap();
        let inspector = ScriptedInspector::new(None, None);
        let probe = probe_with(InconclusivePolicy::Reject, inspector.clone(), scratch.path());

        let result = probe.cheap_check(&format!("{base}/master.m3u8")).await;
        assert!(result.outcome.passes);
        assert_eq!(result.outcome.width, 1920);
        assert_eq!(result.variant_url, Some(format!("{base}/1080p.m3u8")));
        // An advertised resolution settles it without the inspector.
        assert!(inspector.url_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cheap_check_master_below_floor_rejected() {
        let low = "#EXTM3U\n#EXT-X-STREAM-INF:RESOLUTION=1280x720\n720p.m3u8\n";
        let base = serve(HashMap::from([("/master.m3u8", low.to_string())])).await;
        let scratch = tempfile::tempdir().unwrap();
        let probe = probe_with(
            InconclusivePolicy::Reject,
            ScriptedInspector::new(None, None),
            scratch.path(),
        );

        let result = probe.cheap_check(&format!("{base}/master.m3u8")).await;
        assert!(!result.outcome.passes);
        assert_eq!(result.outcome.width, 1280);
    }

    #[tokio::test]
    async fn test_cheap_check_master_without_hints_reports_variant() {
        let nohint = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nv.m3u8\n";
        let base = serve(HashMap::from([
            ("/master.m3u8", nohint.to_string()),
            ("/v.m3u8", MEDIA.to_string()),
        ]))
        .await;
        let scratch = tempfile::tempdir().unwrap();
        let probe = probe_with(
            InconclusivePolicy::Reject,
            ScriptedInspector::new(None, None),
            scratch.path(),
        );

        let result = probe.cheap_check(&format!("{base}/master.m3u8")).await;
        assert!(!result.outcome.passes);
        assert_eq!(result.outcome.resolution(), None);
        // The variant is still surfaced so a later transfer can use it.
        assert_eq!(result.variant_url, Some(format!("{base}/v.m3u8")));
    }

    #[tokio::test]
    async fn test_cheap_check_fetch_failure_is_inconclusive() {
        let scratch = tempfile::tempdir().unwrap();
        let probe = probe_with(
            InconclusivePolicy::Reject,
            ScriptedInspector::new(None, None),
            scratch.path(),
        );
        // Nothing listens on port 9; connection is refused immediately.
        let result = probe.cheap_check("http://127.0.0.1:9/x.m3u8").await;
        assert!(!result.outcome.passes);
        assert_eq!(result.outcome.resolution(), None);
        assert_eq!(result.variant_url, None);
    }

    #[tokio::test]
    async fn test_reject_policy_never_consults_inspector() {
        let base = serve(HashMap::from([("/media.m3u8", MEDIA.to_string())])).await;
        let scratch = tempfile::tempdir().unwrap();
        let inspector = ScriptedInspector::new(
            Some(Resolution {
                width: 1920,
                height: 1080,
            }),
            None,
        );
        let probe = probe_with(InconclusivePolicy::Reject, inspector.clone(), scratch.path());

        let result = probe.cheap_check(&format!("{base}/media.m3u8")).await;
        assert!(!result.outcome.passes);
        assert!(inspector.url_calls.lock().unwrap().is_empty());
        assert!(inspector.file_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sample_probe_inspects_stream_url_first() {
        let base = serve(HashMap::from([("/media.m3u8", MEDIA.to_string())])).await;
        let scratch = tempfile::tempdir().unwrap();
        let inspector = ScriptedInspector::new(
            Some(Resolution {
                width: 1920,
                height: 1080,
            }),
            None,
        );
        let probe = probe_with(
            InconclusivePolicy::SampleProbe,
            inspector.clone(),
            scratch.path(),
        );

        let url = format!("{base}/media.m3u8");
        let result = probe.cheap_check(&url).await;
        assert!(result.outcome.passes);
        assert_eq!(result.outcome.width, 1920);
        assert_eq!(*inspector.url_calls.lock().unwrap(), vec![url]);
        // Direct inspection succeeded; no segments were sampled.
        assert!(inspector.file_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sample_probe_falls_back_to_segment_sampling() {
        let base = serve(HashMap::from([
            ("/media.m3u8", MEDIA.to_string()),
            ("/seg000.ts", "fake segment payload".to_string()),
        ]))
        .await;
        let scratch = tempfile::tempdir().unwrap();
        let inspector = ScriptedInspector::new(
            None,
            Some(Resolution {
                width: 1920,
                height: 1080,
            }),
        );
        let probe = probe_with(
            InconclusivePolicy::SampleProbe,
            inspector.clone(),
            scratch.path(),
        );

        let result = probe.cheap_check(&format!("{base}/media.m3u8")).await;
        assert!(result.outcome.passes);
        assert_eq!(inspector.url_calls.lock().unwrap().len(), 1);
        let file_calls = inspector.file_calls.lock().unwrap();
        assert_eq!(file_calls.len(), 1);
        assert!(file_calls[0].starts_with(scratch.path()));
        // The sample payload is scratch, removed after inspection.
        assert!(!file_calls[0].exists());
    }

    #[tokio::test]
    async fn test_sample_probe_without_any_signal_is_inconclusive() {
        let base = serve(HashMap::from([("/media.m3u8", MEDIA.to_string())])).await;
        let scratch = tempfile::tempdir().unwrap();
        let inspector = ScriptedInspector::new(None, None);
        let probe = probe_with(
            InconclusivePolicy::SampleProbe,
            inspector.clone(),
            scratch.path(),
        );

        let result = probe.cheap_check(&format!("{base}/media.m3u8")).await;
        assert!(!result.outcome.passes);
        assert_eq!(result.outcome.resolution(), None);
        assert_eq!(inspector.url_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_authoritative_check_uses_inspector() {
        let scratch = tempfile::tempdir().unwrap();
        let inspector = ScriptedInspector::new(
            None,
            Some(Resolution {
                width: 1920,
                height: 1080,
            }),
        );
        let probe = probe_with(InconclusivePolicy::Reject, inspector.clone(), scratch.path());

        let outcome = probe.authoritative_check(Path::new("/out/e1.mp4")).await;
        assert!(outcome.passes);
        assert_eq!(
            *inspector.file_calls.lock().unwrap(),
            vec![PathBuf::from("/out/e1.mp4")]
        );

        let blind = probe_with(
            InconclusivePolicy::Reject,
            ScriptedInspector::new(None, None),
            scratch.path(),
        );
        let outcome = blind.authoritative_check(Path::new("/out/e1.mp4")).await;
        assert!(!outcome.passes);
        assert_eq!(outcome.resolution(), None);
    }
}

//! HLS manifest text parsing.
//!
//! Deliberately shallow: resolution hints and segment/variant URIs are
//! all the pipeline needs. Full playlist grammar handling belongs to
//! the external downloader.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Url;

use super::types::Resolution;

static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"RESOLUTION=(\d+)x(\d+)").expect("valid regex"));

/// One variant entry of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub url: String,
    pub resolution: Option<Resolution>,
}

/// The parts of a playlist the pipeline cares about.
#[derive(Debug, Clone, Default)]
pub struct ParsedManifest {
    pub variants: Vec<Variant>,
    pub segments: Vec<String>,
    pub is_master: bool,
}

impl ParsedManifest {
    /// The variant with the largest advertised width, if any variant
    /// carries a resolution hint.
    pub fn best_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .filter(|v| v.resolution.is_some())
            .max_by_key(|v| v.resolution.map(|r| r.width).unwrap_or(0))
    }
}

/// Parses manifest text, resolving relative URIs against `base_url`.
pub fn parse_manifest(base_url: &str, text: &str) -> ParsedManifest {
    let base = Url::parse(base_url).ok();
    let mut parsed = ParsedManifest::default();
    let mut pending_resolution: Option<Resolution> = None;
    let mut expecting_variant = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF") {
            parsed.is_master = true;
            expecting_variant = true;
            pending_resolution = RESOLUTION_RE.captures(rest).and_then(|caps| {
                let width = caps.get(1)?.as_str().parse().ok()?;
                let height = caps.get(2)?.as_str().parse().ok()?;
                Some(Resolution { width, height })
            });
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        let url = resolve(base.as_ref(), line);
        if expecting_variant {
            parsed.variants.push(Variant {
                url,
                resolution: pending_resolution.take(),
            });
            expecting_variant = false;
        } else {
            parsed.segments.push(url);
        }
    }
    parsed
}

fn resolve(base: Option<&Url>, uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    match base.and_then(|b| b.join(uri).ok()) {
        Some(joined) => joined.to_string(),
        None => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=1280x720\n\
        720p/index.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1920x1080\n\
        1080p/index.m3u8\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-TARGETDURATION:10\n\
        #EXTINF:9.6,\n\
        seg000.ts\n\
        #EXTINF:9.6,\n\
        seg001.ts\n";

    #[test]
    fn test_master_playlist_variants_resolved() {
        let parsed = parse_manifest("https://cdn.example/show/index.m3u8", MASTER);
        assert!(parsed.is_master);
        assert_eq!(parsed.variants.len(), 2);
        assert_eq!(
            parsed.variants[1].url,
            "https://cdn.example/show/1080p/index.m3u8"
        );
        let best = parsed.best_variant().unwrap();
        assert_eq!(best.resolution.unwrap().width, 1920);
    }

    #[test]
    fn test_media_playlist_segments() {
        let parsed = parse_manifest("https://cdn.example/show/1080p/index.m3u8", MEDIA);
        assert!(!parsed.is_master);
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(
            parsed.segments[0],
            "https://cdn.example/show/1080p/seg000.ts"
        );
    }

    #[test]
    fn test_absolute_uris_untouched() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:RESOLUTION=1920x1080\nhttps://other.example/v.m3u8\n";
        let parsed = parse_manifest("https://cdn.example/index.m3u8", text);
        assert_eq!(parsed.variants[0].url, "https://other.example/v.m3u8");
    }

    #[test]
    fn test_master_without_resolution_hint() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n";
        let parsed = parse_manifest("https://cdn.example/index.m3u8", text);
        assert!(parsed.is_master);
        assert!(parsed.best_variant().is_none());
    }

    #[test]
    fn test_garbage_base_url_keeps_relative_uris() {
        let parsed = parse_manifest("not a url", MEDIA);
        assert_eq!(parsed.segments[0], "seg000.ts");
    }
}

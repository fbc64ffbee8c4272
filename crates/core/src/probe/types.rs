use std::fmt;

use serde::{Deserialize, Serialize};

/// Video dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of a quality check. Probes never error; anything that
/// prevents a verdict comes back as an inconclusive outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Width meets the configured quality floor.
    pub passes: bool,
    pub width: u32,
    pub height: u32,
}

impl ProbeOutcome {
    pub fn inconclusive() -> Self {
        Self {
            passes: false,
            width: 0,
            height: 0,
        }
    }

    pub fn from_resolution(resolution: Resolution, floor_width: u32) -> Self {
        Self {
            passes: resolution.width >= floor_width,
            width: resolution.width,
            height: resolution.height,
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        if self.width == 0 && self.height == 0 {
            None
        } else {
            Some(Resolution {
                width: self.width,
                height: self.height,
            })
        }
    }
}

/// Outcome of a cheap pre-transfer manifest check. When the manifest is
/// a master playlist, `variant_url` points at the winning variant so
/// the transfer can fetch it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestProbe {
    pub outcome: ProbeOutcome,
    pub variant_url: Option<String>,
}

/// What to do when a cheap check cannot reach a verdict (no resolution
/// hint in the manifest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconclusivePolicy {
    /// Treat the candidate as failing and move on.
    #[default]
    Reject,
    /// Download a small payload prefix and inspect it.
    SampleProbe,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_display() {
        let r = Resolution {
            width: 1920,
            height: 1080,
        };
        assert_eq!(r.to_string(), "1920x1080");
    }

    #[test]
    fn test_outcome_against_floor() {
        let hd = Resolution {
            width: 1920,
            height: 1080,
        };
        let sd = Resolution {
            width: 1280,
            height: 720,
        };
        assert!(ProbeOutcome::from_resolution(hd, 1920).passes);
        assert!(!ProbeOutcome::from_resolution(sd, 1920).passes);
    }

    #[test]
    fn test_inconclusive_has_no_resolution() {
        assert_eq!(ProbeOutcome::inconclusive().resolution(), None);
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let p: InconclusivePolicy = serde_json::from_str(r#""sample_probe""#).unwrap();
        assert_eq!(p, InconclusivePolicy::SampleProbe);
        let p: InconclusivePolicy = serde_json::from_str(r#""reject""#).unwrap();
        assert_eq!(p, InconclusivePolicy::Reject);
    }
}

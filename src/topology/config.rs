//! Checker configuration
//!
//! Tunables for progress reporting and gap detection, loadable from JSON.

use serde::Deserialize;
use std::path::Path;

/// Checker settings. Missing JSON fields fall back to the defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckerConfig {
    /// Emit a progress count every N primary features (0 disables)
    pub progress_interval: usize,
    /// Outward margin of the frame subtracted from the union in the gap check
    pub gap_frame_margin: f64,
    /// Segments per quarter circle on the frame's rounded corners
    pub gap_frame_quadrant_segments: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            gap_frame_margin: 2.0,
            gap_frame_quadrant_segments: 3,
        }
    }
}

impl CheckerConfig {
    /// Load settings from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config {}: {}", path.as_ref().display(), e)
        })?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }
}

//! Viewer settings that steer marker placement and colormap defaults,
//! loadable from JSON. Every field is optional in the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::VoxelViewError;

/// Whether tracking follows bright spots or dark ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    #[default]
    Maximum,
    Minimum,
}

impl TrackMode {
    /// Factor applied to values so that the tracked extreme is the largest.
    #[inline]
    pub fn sign(&self) -> f64 {
        match self {
            TrackMode::Maximum => 1.0,
            TrackMode::Minimum => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Axis along which tracks advance, 0..=4 for x, y, z, element, time.
    pub track_direction : usize,
    /// Full width at half maximum of a spot, in pixels.
    pub fwhm : f64,
    /// Half-widths of the centre-of-intensity box.
    pub coi_box : [i64; 3],
    /// Half-widths of the closest-maximum search box.
    pub search_box : [i64; 3],
    /// Snap new markers to the closest maximum.
    pub marker_to_max : bool,
    /// Move new markers to the centre of intensity.
    pub use_coi : bool,
    /// Penalize maxima already claimed by other tracks.
    pub repulsion : bool,
    pub track_mode : TrackMode,
    pub default_gamma : f64,
    pub default_model : usize,
    pub show_over_under : bool,
    /// Seed for the random colormap.
    pub random_seed : u64,
    /// `env_logger` filter used by the command line tools.
    pub log_level : String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            track_direction : 4,
            fwhm : 2.0,
            coi_box : [3, 3, 1],
            search_box : [3, 3, 1],
            marker_to_max : false,
            use_coi : false,
            repulsion : false,
            track_mode : TrackMode::Maximum,
            default_gamma : 1.0,
            default_model : 0,
            show_over_under : false,
            random_seed : 0,
            log_level : "info".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json : &str) -> Result<Self, VoxelViewError> {
        let config : ViewerConfig = serde_json::from_str(json)?;
        config.validated()
    }

    pub fn load<P : AsRef<Path>>(path : P) -> Result<Self, VoxelViewError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loading viewer configuration from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, VoxelViewError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validated(self) -> Result<Self, VoxelViewError> {
        if self.track_direction > 4 {
            return Err(VoxelViewError::Parse(format!(
                "track_direction must be 0..=4, got {}", self.track_direction
            )));
        }
        if self.fwhm <= 0.0 {
            return Err(VoxelViewError::Parse(format!("fwhm must be positive, got {}", self.fwhm)));
        }
        if self.coi_box.iter().chain(self.search_box.iter()).any(|&h| h < 0) {
            return Err(VoxelViewError::Parse("box half-widths must not be negative".to_string()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ViewerConfig::from_json_str(r#"{ "fwhm": 3.5, "track_mode": "minimum" }"#).unwrap();
        assert_eq!(config.fwhm, 3.5);
        assert_eq!(config.track_mode, TrackMode::Minimum);
        assert_eq!(config.track_direction, 4);
        assert_eq!(config.coi_box, [3, 3, 1]);
        assert_eq!(ViewerConfig::from_json_str("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ViewerConfig::from_json_str(r#"{ "track_direction": 7 }"#),
            Err(VoxelViewError::Parse(_))
        ));
        assert!(ViewerConfig::from_json_str(r#"{ "fwhm": 0 }"#).is_err());
        assert!(matches!(
            ViewerConfig::from_json_str("{ not json"),
            Err(VoxelViewError::Config(_))
        ));
    }

    #[test]
    fn survives_a_json_trip() {
        let mut config = ViewerConfig::default();
        config.search_box = [5, 5, 2];
        config.repulsion = true;
        let back = ViewerConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
        assert_eq!(TrackMode::Minimum.sign(), -1.0);
    }
}

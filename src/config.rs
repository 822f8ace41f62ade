//! Run configuration.
//!
//! A run is configured once and the values stay fixed for every image. The
//! configuration can be built programmatically, loaded from JSON, or
//! assembled by the command line front end.
//!
//! ```no_run
//! use region_morphometry::AnalysisConfig;
//! use std::path::Path;
//!
//! let config = AnalysisConfig::from_json_file(Path::new("analysis.json"))?;
//! assert!(config.pixels_per_mm > 0.0);
//! # Ok::<(), region_morphometry::AnalysisError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

pub const DEFAULT_PIXELS_PER_MM: f64 = 19.0;

fn default_pixels_per_mm() -> f64 {
    DEFAULT_PIXELS_PER_MM
}

fn default_results_file_name() -> String {
    "parathyroid_analysis_results.csv".to_string()
}

fn default_visualization_dir_name() -> String {
    "visualizations".to_string()
}

/// Parameters of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Pixels per millimetre; every physical-unit field depends on it.
    #[serde(default = "default_pixels_per_mm")]
    pub pixels_per_mm: f64,

    /// TrueType font for text overlays. Without one, text is omitted.
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Name of the result table inside the output directory.
    #[serde(default = "default_results_file_name")]
    pub results_file_name: String,

    /// Directory for annotated rasters, relative to the output directory.
    #[serde(default = "default_visualization_dir_name")]
    pub visualization_dir_name: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pixels_per_mm: DEFAULT_PIXELS_PER_MM,
            font_path: None,
            results_file_name: default_results_file_name(),
            visualization_dir_name: default_visualization_dir_name(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_pixels_per_mm(pixels_per_mm: f64) -> Self {
        Self {
            pixels_per_mm,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json).map_err(|e| AnalysisError::InvalidParameter {
            parameter: "config".to_string(),
            value: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a non-positive or non-finite scale.
    pub fn validate(&self) -> Result<()> {
        if !(self.pixels_per_mm.is_finite() && self.pixels_per_mm > 0.0) {
            return Err(AnalysisError::InvalidParameter {
                parameter: "pixels_per_mm".to_string(),
                value: self.pixels_per_mm.to_string(),
            });
        }
        Ok(())
    }

    /// Millimetres per pixel.
    pub fn px_to_mm(&self) -> f64 {
        1.0 / self.pixels_per_mm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.pixels_per_mm, 19.0);
        assert_eq!(config.px_to_mm(), 1.0 / 19.0);
        assert_eq!(config.results_file_name, "parathyroid_analysis_results.csv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_scale() {
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let err = AnalysisConfig::with_pixels_per_mm(bad).validate().unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"pixels_per_mm": 20}"#).unwrap();
        assert_eq!(config.pixels_per_mm, 20.0);
        assert_eq!(config.font_path, None);
        assert_eq!(config.visualization_dir_name, "visualizations");
    }
}

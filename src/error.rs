//! Error types for region analysis.
//!
//! [`AnalysisError`] covers run and image level failures, while
//! [`FeatureError`] marks a single feature family as not computable for one
//! region.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Run and image level failures.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Image file could not be opened or decoded.
    #[error("Cannot read image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Annotated raster could not be written.
    #[error("Cannot save visualization {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Annotation file could not be read or parsed.
    #[error("Cannot parse annotation {path}: {source}")]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Annotation file parsed but violates the expected layout.
    #[error("Invalid annotation {path}: {reason}")]
    InvalidAnnotation { path: PathBuf, reason: String },

    /// Required input directory does not exist.
    #[error("Directory does not exist: {path}")]
    MissingDirectory { path: PathBuf },

    /// Font file could not be loaded for text overlays.
    #[error("Cannot load font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    /// Invalid configuration value.
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl AnalysisError {
    /// Whether the batch may continue after this error.
    ///
    /// Only configuration and directory problems stop a run; everything else
    /// concerns a single image.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AnalysisError::MissingDirectory { .. } | AnalysisError::InvalidParameter { .. }
        )
    }
}

/// Reason a feature family is undefined for a region.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("not enough samples: {found} (need {required})")]
    InsufficientSamples { required: usize, found: usize },

    #[error("not enough contour points: {found} (need {required})")]
    TooFewPoints { required: usize, found: usize },

    #[error("degenerate region: {0}")]
    Degenerate(&'static str),

    #[error("fit failed: {0}")]
    FitFailed(String),

    #[error("non-finite result for {0}")]
    NonFinite(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_setup_errors_are_fatal() {
        let missing = AnalysisError::MissingDirectory {
            path: PathBuf::from("nope"),
        };
        let bad_scale = AnalysisError::InvalidParameter {
            parameter: "pixels_per_mm".to_string(),
            value: "0".to_string(),
        };
        let invalid = AnalysisError::InvalidAnnotation {
            path: PathBuf::from("a.json"),
            reason: "polygon with 2 points".to_string(),
        };
        assert!(!missing.is_recoverable());
        assert!(!bad_scale.is_recoverable());
        assert!(invalid.is_recoverable());
    }

    #[test]
    fn feature_error_messages() {
        let err = FeatureError::InsufficientSamples {
            required: 26,
            found: 4,
        };
        assert_eq!(err.to_string(), "not enough samples: 4 (need 26)");
    }
}

//! LabelMe-style region annotations.

use std::path::Path;

use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Shape kind processed by the analyzer.
pub const POLYGON: &str = "polygon";

/// Vertex coordinates are clamped to `±MAX_PIXEL_COORDINATE`, far beyond any
/// raster, so differences of pixel coordinates always fit in `i32`.
pub const MAX_PIXEL_COORDINATE: i32 = 1 << 24;

/// One annotated shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAnnotation {
    #[serde(default)]
    pub label: Option<String>,
    pub points: Vec<[f64; 2]>,
    pub shape_type: String,
}

impl ShapeAnnotation {
    pub fn polygon(points: Vec<[f64; 2]>) -> Self {
        Self {
            label: None,
            points,
            shape_type: POLYGON.to_string(),
        }
    }

    pub fn is_polygon(&self) -> bool {
        self.shape_type == POLYGON
    }

    /// Vertices in integer pixel coordinates, truncated toward zero and
    /// clamped to [`MAX_PIXEL_COORDINATE`].
    pub fn pixel_points(&self) -> Vec<Point<i32>> {
        let to_pixel = |v: f64| {
            (v as i32).clamp(-MAX_PIXEL_COORDINATE, MAX_PIXEL_COORDINATE)
        };
        self.points
            .iter()
            .map(|&[x, y]| Point::new(to_pixel(x), to_pixel(y)))
            .collect()
    }
}

/// Contents of one annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFile {
    pub shapes: Vec<ShapeAnnotation>,
    #[serde(rename = "imagePath", default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

impl AnnotationFile {
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| AnalysisError::AnnotationParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Reads, parses and validates an annotation file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let annotation = Self::from_json_str(&json, path)?;
        annotation.validate(path)?;
        Ok(annotation)
    }

    /// Checks that every polygon has at least three vertices.
    pub fn validate(&self, origin: &Path) -> Result<()> {
        for (i, shape) in self.shapes.iter().enumerate() {
            if shape.is_polygon() && shape.points.len() < 3 {
                return Err(AnalysisError::InvalidAnnotation {
                    path: origin.to_path_buf(),
                    reason: format!(
                        "shape {} is a polygon with {} points",
                        i + 1,
                        shape.points.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

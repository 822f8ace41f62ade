//! Per-region feature extraction for polygon annotations on micrograph images.
//!
//! Each annotated polygon yields one flat [`FeatureRecord`] of morphometric,
//! intensity, texture and ellipse descriptors, and every image yields an
//! annotated copy drawn with [imageproc]. Feature families degrade
//! independently: a family that cannot be computed for a region leaves its
//! fields undefined instead of failing the region.
//!
//! The modules follow the pipeline order: [`geometry`] and [`shape`] measure
//! the outline, [`intensity`] and [`texture`] the pixels under its mask,
//! [`ellipse`] fits the outline, [`record`] assembles a row, [`render`] draws
//! the overlays and [`analyzer`] / [`batch`] drive whole images and
//! directories.

mod colors;
pub mod analyzer;
pub mod annotation;
pub mod batch;
pub mod config;
pub mod ellipse;
pub mod error;
pub mod export;
pub mod geometry;
pub mod intensity;
pub mod record;
pub mod render;
pub mod shape;
pub mod texture;

pub use analyzer::{Analyzer, ImageAnalysis, ImageJob, NoProgress, ProgressObserver, ResultSet};
pub use annotation::{AnnotationFile, ShapeAnnotation};
pub use batch::{BatchReport, run_batch};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, FeatureError, Result};
pub use record::{FeatureRecord, measure_region};
pub use render::Renderer;

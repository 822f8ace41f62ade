//! Feature records and the per-region feature assembler.
//!
//! A [`FeatureRecord`] is one flat row of the result table. Each of the four
//! feature families is computed independently; a family that fails leaves all
//! of its fields `None` without affecting the others.

use image::GrayImage;
use imageproc::point::Point;
use log::debug;
use serde::Serialize;

use crate::{
    ellipse::{EllipseFeatures, EllipseFit, fit_ellipse},
    error::FeatureError,
    geometry::{mask_area, perimeter, rasterize},
    intensity::{IntensityFeatures, intensity_features, masked_samples, otsu_binarize},
    shape::{ShapeFeatures, shape_features},
    texture::{TextureFeatures, texture_features},
};

/// Column names of the result table, in serialization order.
pub const FIELD_NAMES: [&str; 35] = [
    "Image",
    "Tumor_ID",
    "Area_Pixels",
    "Area_mm2",
    "Perimeter_Pixels",
    "Perimeter_mm",
    "Mean_Intensity",
    "Median_Intensity",
    "Min_Intensity",
    "Max_Intensity",
    "Std_Intensity",
    "Binary_Mean_Intensity",
    "Skewness",
    "Kurtosis",
    "Circularity",
    "Aspect_Ratio",
    "Irregularity_Index",
    "Convexity",
    "Solidity",
    "Ferets_Diameter",
    "Area_Fraction",
    "Ellipse_Area",
    "Ellipse_Perimeter",
    "Ellipse_MajorAxis",
    "Ellipse_MajorAxis_mm",
    "Ellipse_MinorAxis",
    "Ellipse_MajorAxis_Angle",
    "Ellipse_MinorAxis_Angle",
    "GLCM_Contrast",
    "GLCM_Homogeneity",
    "GLCM_Energy",
    "GLCM_Correlation",
    "GLCM_Dissimilarity",
    "GLCM_ASM",
    "GLCM_Entropy",
];

/// Descriptors of one annotated region.
///
/// `None` marks a value that could not be computed for this region; it is
/// exported as an empty cell, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Tumor_ID")]
    pub region_id: String,
    #[serde(rename = "Area_Pixels")]
    pub area_pixels: u32,
    #[serde(rename = "Area_mm2")]
    pub area_mm2: f64,
    #[serde(rename = "Perimeter_Pixels")]
    pub perimeter_pixels: f64,
    #[serde(rename = "Perimeter_mm")]
    pub perimeter_mm: f64,

    #[serde(rename = "Mean_Intensity")]
    pub mean_intensity: Option<f64>,
    #[serde(rename = "Median_Intensity")]
    pub median_intensity: Option<f64>,
    #[serde(rename = "Min_Intensity")]
    pub min_intensity: Option<f64>,
    #[serde(rename = "Max_Intensity")]
    pub max_intensity: Option<f64>,
    #[serde(rename = "Std_Intensity")]
    pub std_intensity: Option<f64>,
    #[serde(rename = "Binary_Mean_Intensity")]
    pub binary_mean_intensity: Option<f64>,
    #[serde(rename = "Skewness")]
    pub skewness: Option<f64>,
    #[serde(rename = "Kurtosis")]
    pub kurtosis: Option<f64>,

    #[serde(rename = "Circularity")]
    pub circularity: Option<f64>,
    #[serde(rename = "Aspect_Ratio")]
    pub aspect_ratio: Option<f64>,
    #[serde(rename = "Irregularity_Index")]
    pub irregularity_index: Option<f64>,
    #[serde(rename = "Convexity")]
    pub convexity: Option<f64>,
    #[serde(rename = "Solidity")]
    pub solidity: Option<f64>,
    #[serde(rename = "Ferets_Diameter")]
    pub ferets_diameter: Option<f64>,
    #[serde(rename = "Area_Fraction")]
    pub area_fraction: Option<f64>,

    #[serde(rename = "Ellipse_Area")]
    pub ellipse_area: Option<f64>,
    #[serde(rename = "Ellipse_Perimeter")]
    pub ellipse_perimeter: Option<f64>,
    #[serde(rename = "Ellipse_MajorAxis")]
    pub ellipse_major_axis: Option<f64>,
    #[serde(rename = "Ellipse_MajorAxis_mm")]
    pub ellipse_major_axis_mm: Option<f64>,
    #[serde(rename = "Ellipse_MinorAxis")]
    pub ellipse_minor_axis: Option<f64>,
    #[serde(rename = "Ellipse_MajorAxis_Angle")]
    pub ellipse_major_axis_angle: Option<f64>,
    #[serde(rename = "Ellipse_MinorAxis_Angle")]
    pub ellipse_minor_axis_angle: Option<f64>,

    #[serde(rename = "GLCM_Contrast")]
    pub glcm_contrast: Option<f64>,
    #[serde(rename = "GLCM_Homogeneity")]
    pub glcm_homogeneity: Option<f64>,
    #[serde(rename = "GLCM_Energy")]
    pub glcm_energy: Option<f64>,
    #[serde(rename = "GLCM_Correlation")]
    pub glcm_correlation: Option<f64>,
    #[serde(rename = "GLCM_Dissimilarity")]
    pub glcm_dissimilarity: Option<f64>,
    #[serde(rename = "GLCM_ASM")]
    pub glcm_asm: Option<f64>,
    #[serde(rename = "GLCM_Entropy")]
    pub glcm_entropy: Option<f64>,
}

/// Region identifier as used in the result table.
pub fn region_id(image_id: &str, region_index: usize) -> String {
    format!("{image_id}_tumor_{region_index}")
}

/// The four feature families of one region, each possibly undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBlocks {
    pub intensity: Result<IntensityFeatures, FeatureError>,
    pub shape: ShapeFeatures,
    pub ellipse: Result<EllipseFeatures, FeatureError>,
    pub texture: Result<TextureFeatures, FeatureError>,
}

impl FeatureRecord {
    /// Merges the feature families into one flat record.
    ///
    /// # Arguments
    ///
    /// * `image_id` - Identifier of the source image.
    /// * `region_index` - 1-based position of the region in its annotation.
    /// * `area_pixels`, `perimeter_pixels` - Region size in pixel units.
    /// * `px_to_mm` - Millimetres per pixel.
    pub fn assemble(
        image_id: &str,
        region_index: usize,
        area_pixels: u32,
        perimeter_pixels: f64,
        px_to_mm: f64,
        blocks: &FeatureBlocks,
    ) -> Self {
        let intensity = blocks.intensity.as_ref().ok();
        let ellipse = blocks.ellipse.as_ref().ok();
        let texture = blocks.texture.as_ref().ok();
        let shape = &blocks.shape;

        Self {
            image: image_id.to_string(),
            region_id: region_id(image_id, region_index),
            area_pixels,
            area_mm2: area_pixels as f64 * px_to_mm * px_to_mm,
            perimeter_pixels,
            perimeter_mm: perimeter_pixels * px_to_mm,

            mean_intensity: intensity.map(|f| f.mean),
            median_intensity: intensity.map(|f| f.median),
            min_intensity: intensity.map(|f| f.min),
            max_intensity: intensity.map(|f| f.max),
            std_intensity: intensity.map(|f| f.std_dev),
            binary_mean_intensity: intensity.map(|f| f.binary_mean),
            skewness: intensity.and_then(|f| f.skewness),
            kurtosis: intensity.and_then(|f| f.kurtosis),

            circularity: shape.circularity,
            aspect_ratio: shape.aspect_ratio,
            irregularity_index: shape.irregularity,
            convexity: shape.convexity,
            solidity: shape.solidity,
            ferets_diameter: shape.feret_diameter,
            area_fraction: shape.area_fraction,

            ellipse_area: ellipse.map(|f| f.area),
            ellipse_perimeter: ellipse.map(|f| f.perimeter),
            ellipse_major_axis: ellipse.map(|f| f.major_axis),
            ellipse_major_axis_mm: ellipse.map(|f| f.major_axis_mm),
            ellipse_minor_axis: ellipse.map(|f| f.minor_axis),
            ellipse_major_axis_angle: ellipse.map(|f| f.major_axis_angle),
            ellipse_minor_axis_angle: ellipse.map(|f| f.minor_axis_angle),

            glcm_contrast: texture.map(|f| f.contrast),
            glcm_homogeneity: texture.map(|f| f.homogeneity),
            glcm_energy: texture.map(|f| f.energy),
            glcm_correlation: texture.map(|f| f.correlation),
            glcm_dissimilarity: texture.map(|f| f.dissimilarity),
            glcm_asm: texture.map(|f| f.asm),
            glcm_entropy: texture.map(|f| f.entropy),
        }
    }

    /// Whether every ellipse field is undefined.
    pub fn ellipse_undefined(&self) -> bool {
        self.ellipse_major_axis.is_none()
    }

    /// Whether every texture field is undefined.
    pub fn texture_undefined(&self) -> bool {
        self.glcm_contrast.is_none()
    }
}

/// Everything measured for one region: its record plus the geometry the
/// renderer needs.
#[derive(Debug, Clone)]
pub struct RegionMeasurement {
    pub record: FeatureRecord,
    pub ellipse_fit: Option<EllipseFit>,
}

/// Computes all descriptors for one polygon region.
///
/// Builds the region mask, binarizes the in-mask intensities with Otsu's
/// threshold, runs the four feature families and merges them. Families that
/// fail are logged at debug level and left undefined.
pub fn measure_region(
    gray: &GrayImage,
    image_id: &str,
    region_index: usize,
    points: &[Point<i32>],
    px_to_mm: f64,
) -> RegionMeasurement {
    let (width, height) = gray.dimensions();
    let mask = rasterize(points, width, height);
    let area = mask_area(&mask);

    let samples = masked_samples(gray, &mask);
    let binary = otsu_binarize(&samples);

    let fit = fit_ellipse(points);
    let blocks = FeatureBlocks {
        intensity: intensity_features(&samples, &binary),
        shape: shape_features(area, points),
        ellipse: fit.as_ref().map(|f| EllipseFeatures::from_fit(f, px_to_mm)).map_err(|e| e.clone()),
        texture: texture_features(gray, &mask),
    };

    let id = region_id(image_id, region_index);
    if let Err(e) = &blocks.intensity {
        debug!("{id}: intensity features undefined: {e}");
    }
    if let Err(e) = &blocks.ellipse {
        debug!("{id}: ellipse features undefined: {e}");
    }
    if let Err(e) = &blocks.texture {
        debug!("{id}: texture features undefined: {e}");
    }

    let record = FeatureRecord::assemble(
        image_id,
        region_index,
        area,
        perimeter(points, true),
        px_to_mm,
        &blocks,
    );

    RegionMeasurement {
        record,
        ellipse_fit: fit.ok(),
    }
}

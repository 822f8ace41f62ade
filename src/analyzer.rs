//! Analysis orchestrator.
//!
//! Images are processed one at a time and regions in annotation order. For
//! each image the pipeline is: load, then for every polygon region measure
//! and draw, then persist the annotated raster. An image that cannot be
//! processed is reported once and skipped; the batch always continues.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use log::{debug, info, warn};

use crate::{
    annotation::{AnnotationFile, ShapeAnnotation},
    config::AnalysisConfig,
    error::{AnalysisError, Result},
    record::{FeatureRecord, measure_region},
    render::{PanelEntry, Renderer},
};

/// Receives one notification per image.
pub trait ProgressObserver {
    /// `index` is 0-based, `total` is the number of images in the batch.
    fn on_progress(&mut self, index: usize, total: usize, message: &str);
}

impl<F> ProgressObserver for F
where
    F: FnMut(usize, usize, &str),
{
    fn on_progress(&mut self, index: usize, total: usize, message: &str) {
        self(index, total, message)
    }
}

/// Observer that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _index: usize, _total: usize, _message: &str) {}
}

/// One image and its annotation, as found by the collaborator that
/// enumerates inputs.
#[derive(Debug)]
pub struct ImageJob {
    pub image_id: String,
    /// `None` when no image file matched the annotation.
    pub image_path: Option<PathBuf>,
    pub annotation: Result<AnnotationFile>,
}

/// An image that produced no records.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFailure {
    pub image_id: String,
    pub reason: String,
}

/// Output of one image: its records in region order and the annotated raster.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub records: Vec<FeatureRecord>,
    pub visualization: RgbImage,
}

/// Accumulated output of a batch.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub records: Vec<FeatureRecord>,
    pub visualizations: Vec<PathBuf>,
    pub failures: Vec<ImageFailure>,
}

impl ResultSet {
    fn fail(mut self, image_id: &str, reason: impl Into<String>) -> Self {
        self.failures.push(ImageFailure {
            image_id: image_id.to_string(),
            reason: reason.into(),
        });
        self
    }
}

/// Drives feature extraction and rendering over a batch of images.
///
/// The analyzer is owned by one caller for the whole batch; it is not meant
/// to be shared across threads.
pub struct Analyzer<P: ProgressObserver = NoProgress> {
    config: AnalysisConfig,
    renderer: Renderer,
    observer: P,
    visualization_dir: Option<PathBuf>,
}

impl Analyzer<NoProgress> {
    /// Analyzer without progress reporting or persisted rasters.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_observer(config, Renderer::default(), NoProgress)
    }
}

impl<P: ProgressObserver> Analyzer<P> {
    /// Builds an analyzer, rejecting an invalid configuration up front.
    pub fn with_observer(config: AnalysisConfig, renderer: Renderer, observer: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            renderer,
            observer,
            visualization_dir: None,
        })
    }

    /// Saves every annotated raster as `<image_id>_analysis.png` under `dir`.
    pub fn persist_visualizations(mut self, dir: impl Into<PathBuf>) -> Self {
        self.visualization_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn into_observer(self) -> P {
        self.observer
    }

    /// Measures and draws every polygon region of one decoded image.
    ///
    /// Region numbers are 1-based positions in `shapes`; shapes that are not
    /// polygons keep their number but produce no record.
    pub fn analyze_image(
        &self,
        image_id: &str,
        image: &DynamicImage,
        shapes: &[ShapeAnnotation],
    ) -> ImageAnalysis {
        let gray = image.to_luma8();
        let mut visualization = image.to_rgb8();
        let px_to_mm = self.config.px_to_mm();

        let mut records = Vec::new();
        let mut panel = Vec::new();

        for (i, shape) in shapes.iter().enumerate() {
            let region_index = i + 1;
            if !shape.is_polygon() {
                debug!("{image_id}: skipping {} shape {region_index}", shape.shape_type);
                continue;
            }

            let points = shape.pixel_points();
            let measurement = measure_region(&gray, image_id, region_index, &points, px_to_mm);

            self.renderer.draw_region(
                &mut visualization,
                region_index,
                &points,
                measurement.ellipse_fit.as_ref(),
            );
            panel.push(PanelEntry::from_record(region_index, &measurement.record));
            records.push(measurement.record);
        }

        self.renderer.draw_info_panel(&mut visualization, &panel);

        ImageAnalysis {
            records,
            visualization,
        }
    }

    /// Loads the image of a job and analyzes it.
    pub fn analyze_file(
        &self,
        image_id: &str,
        image_path: &Path,
        annotation: &AnnotationFile,
    ) -> Result<ImageAnalysis> {
        let image = image::open(image_path).map_err(|source| AnalysisError::ImageLoad {
            path: image_path.to_path_buf(),
            source,
        })?;
        Ok(self.analyze_image(image_id, &image, &annotation.shapes))
    }

    fn save_visualization(&self, image_id: &str, raster: &RgbImage) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.visualization_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{image_id}_analysis.png"));
        raster.save(&path).map_err(|source| AnalysisError::ImageSave {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }

    /// Processes one job and folds its output into `results`.
    pub fn step(
        &mut self,
        index: usize,
        total: usize,
        job: &ImageJob,
        mut results: ResultSet,
    ) -> ResultSet {
        let id = job.image_id.as_str();

        let annotation = match &job.annotation {
            Ok(annotation) => annotation,
            Err(e) => {
                warn!("{e}");
                self.observer
                    .on_progress(index, total, &format!("Error loading annotation: {id}"));
                return results.fail(id, e.to_string());
            }
        };

        let Some(image_path) = &job.image_path else {
            warn!("No image file found for {id}");
            self.observer
                .on_progress(index, total, &format!("Image file not found: {id}"));
            return results.fail(id, "image file not found");
        };

        self.observer
            .on_progress(index, total, &format!("Processing image: {id}"));

        let analysis = match self.analyze_file(id, image_path, annotation) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("{e}");
                return results.fail(id, e.to_string());
            }
        };

        info!("{id}: {} region(s) measured", analysis.records.len());
        match self.save_visualization(id, &analysis.visualization) {
            Ok(Some(path)) => results.visualizations.push(path),
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
        results.records.extend(analysis.records);
        results
    }

    /// Processes every job in order and returns the accumulated results.
    pub fn run(&mut self, jobs: &[ImageJob]) -> ResultSet {
        let total = jobs.len();
        info!("Analyzing {total} image(s)");

        let results = jobs
            .iter()
            .enumerate()
            .fold(ResultSet::default(), |results, (index, job)| {
                self.step(index, total, job, results)
            });

        info!(
            "Batch finished: {} record(s), {} failure(s)",
            results.records.len(),
            results.failures.len()
        );
        results
    }
}

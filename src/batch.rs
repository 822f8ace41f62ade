//! Directory-level batch driver.
//!
//! Pairs every `<base>.json` annotation with an image named `<base>` in the
//! image directory, analyzes the pairs in sorted order and persists the
//! annotated rasters and the result table under the output directory.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::{
    analyzer::{Analyzer, ImageJob, ProgressObserver, ResultSet},
    annotation::AnnotationFile,
    config::AnalysisConfig,
    error::{AnalysisError, Result},
    export::write_records,
    render::Renderer,
};

/// Image extensions tried for each annotation, in priority order.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// What a batch run produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: ResultSet,
    /// `None` when no region was measured and no table was written.
    pub results_file: Option<PathBuf>,
    pub visualization_dir: PathBuf,
}

fn require_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(AnalysisError::MissingDirectory {
            path: path.to_path_buf(),
        })
    }
}

/// First existing `<image_dir>/<base>.<ext>` in [`IMAGE_EXTENSIONS`] order.
pub fn find_image(image_dir: &Path, base: &str) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| image_dir.join(format!("{base}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Lists one job per `*.json` file in `annotation_dir`, sorted by file name.
///
/// Jobs are listed even when their image is missing or their annotation is
/// invalid; the orchestrator reports those as failures.
pub fn discover_jobs(image_dir: &Path, annotation_dir: &Path) -> Result<Vec<ImageJob>> {
    let mut annotation_paths = std::fs::read_dir(annotation_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    annotation_paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
    annotation_paths.sort();

    let jobs = annotation_paths
        .into_iter()
        .filter_map(|path| {
            let base = path.file_stem()?.to_string_lossy().into_owned();
            let image_path = find_image(image_dir, &base);
            debug!("{base}: image {image_path:?}");
            Some(ImageJob {
                annotation: AnnotationFile::from_json_file(&path),
                image_path,
                image_id: base,
            })
        })
        .collect();
    Ok(jobs)
}

/// Runs the whole pipeline over two input directories.
///
/// # Arguments
///
/// * `config` - Run configuration, validated before anything is read.
/// * `image_dir` - Directory holding the source images.
/// * `annotation_dir` - Directory holding one JSON annotation per image.
/// * `output_dir` - Receives the result table and the visualization directory.
/// * `observer` - Notified once per image.
///
/// # Returns
///
/// A [`BatchReport`]. Per-image problems are listed in its failures; only a
/// missing input directory, an invalid configuration, an unreadable font or
/// an unwritable output directory abort the run.
pub fn run_batch<P: ProgressObserver>(
    config: &AnalysisConfig,
    image_dir: &Path,
    annotation_dir: &Path,
    output_dir: &Path,
    observer: P,
) -> Result<BatchReport> {
    require_dir(image_dir)?;
    require_dir(annotation_dir)?;
    config.validate()?;

    let renderer = match &config.font_path {
        Some(path) => Renderer::with_font_file(path)?,
        None => {
            debug!("No font configured, text overlays are skipped");
            Renderer::default()
        }
    };

    let visualization_dir = output_dir.join(&config.visualization_dir_name);
    std::fs::create_dir_all(&visualization_dir)?;

    let jobs = discover_jobs(image_dir, annotation_dir)?;
    let mut analyzer = Analyzer::with_observer(config.clone(), renderer, observer)?
        .persist_visualizations(visualization_dir.clone());
    let results = analyzer.run(&jobs);

    let results_file = if results.records.is_empty() {
        info!("No regions measured, result table not written");
        None
    } else {
        let path = output_dir.join(&config.results_file_name);
        write_records(&path, &results.records)?;
        Some(path)
    };

    Ok(BatchReport {
        results,
        results_file,
        visualization_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::NoProgress;

    #[test]
    fn image_extension_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"").unwrap();
        std::fs::write(dir.path().join("b.bmp"), b"").unwrap();

        assert_eq!(find_image(dir.path(), "a"), Some(dir.path().join("a.jpg")));
        assert_eq!(find_image(dir.path(), "b"), Some(dir.path().join("b.bmp")));
        assert_eq!(find_image(dir.path(), "c"), None);
    }

    #[test]
    fn jobs_are_sorted_and_keep_missing_images() {
        let images = tempfile::tempdir().unwrap();
        let annotations = tempfile::tempdir().unwrap();
        let json = r#"{"shapes": []}"#;
        std::fs::write(annotations.path().join("zeta.json"), json).unwrap();
        std::fs::write(annotations.path().join("alpha.json"), json).unwrap();
        std::fs::write(annotations.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(images.path().join("alpha.png"), b"").unwrap();

        let jobs = discover_jobs(images.path(), annotations.path()).unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.image_id.as_str()).collect();
        assert_eq!(ids, ["alpha", "zeta"]);
        assert!(jobs[0].image_path.is_some());
        assert!(jobs[1].image_path.is_none());
        assert!(jobs.iter().all(|j| j.annotation.is_ok()));
    }

    #[test]
    fn missing_input_directory_is_fatal() {
        let out = tempfile::tempdir().unwrap();
        let err = run_batch(
            &AnalysisConfig::default(),
            &out.path().join("no-images"),
            out.path(),
            out.path(),
            NoProgress,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingDirectory { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn empty_batch_writes_no_table() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_batch(
            &AnalysisConfig::default(),
            dir.path(),
            dir.path(),
            &dir.path().join("out"),
            NoProgress,
        )
        .unwrap();
        assert!(report.results_file.is_none());
        assert!(report.visualization_dir.is_dir());
    }
}

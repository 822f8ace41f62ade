//! Intensity statistics over the pixels of a region.

use image::GrayImage;
use imageproc::contrast::otsu_level;

use crate::error::FeatureError;

/// First and higher order statistics of the masked intensities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityFeatures {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Mean of the Otsu-binarized samples (0 or 255 each).
    pub binary_mean: f64,
    /// `None` below 3 samples or for constant intensities.
    pub skewness: Option<f64>,
    /// Excess kurtosis. `None` below 4 samples or for constant intensities.
    pub kurtosis: Option<f64>,
}

/// Collects the intensities under a mask in row-major order.
pub fn masked_samples(gray: &GrayImage, mask: &GrayImage) -> Vec<u8> {
    gray.pixels()
        .zip(mask.pixels())
        .filter(|(_, m)| m.0[0] > 0)
        .map(|(g, _)| g.0[0])
        .collect()
}

/// Binarizes samples with Otsu's threshold computed over those samples only.
///
/// Samples strictly above the threshold map to 255, the rest to 0.
pub fn otsu_binarize(samples: &[u8]) -> Vec<u8> {
    if samples.is_empty() {
        return Vec::new();
    }
    let Some(strip) = GrayImage::from_raw(samples.len() as u32, 1, samples.to_vec()) else {
        return Vec::new();
    };

    let level = otsu_level(&strip);
    samples
        .iter()
        .map(|&v| if v > level { 255 } else { 0 })
        .collect()
}

fn median(sorted: &[u8]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Computes the intensity statistics of one region.
///
/// # Arguments
///
/// * `samples` - Raw intensities under the region mask.
/// * `binary` - The same samples after [`otsu_binarize`].
///
/// # Errors
///
/// Returns [`FeatureError::InsufficientSamples`] for an empty region; the
/// whole family is then undefined.
pub fn intensity_features(samples: &[u8], binary: &[u8]) -> Result<IntensityFeatures, FeatureError> {
    if samples.is_empty() {
        return Err(FeatureError::InsufficientSamples {
            required: 1,
            found: 0,
        });
    }

    let n = samples.len() as f64;
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n;

    // Central moments, biased (divided by n).
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &v in samples {
        let d = v as f64 - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;

    let varies = m2 > 0.0;
    let skewness = (samples.len() >= 3 && varies).then(|| m3 / m2.powf(1.5));
    let kurtosis = (samples.len() >= 4 && varies).then(|| m4 / (m2 * m2) - 3.0);

    let binary_mean = if binary.is_empty() {
        0.0
    } else {
        binary.iter().map(|&v| v as f64).sum::<f64>() / binary.len() as f64
    };

    Ok(IntensityFeatures {
        mean,
        median: median(&sorted),
        min: sorted[0] as f64,
        max: sorted[sorted.len() - 1] as f64,
        std_dev: m2.sqrt(),
        binary_mean,
        skewness,
        kurtosis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "expected {}, got {}", b, a);
    }

    #[test]
    fn basic_statistics() {
        let samples = [10, 20, 30, 40];
        let f = intensity_features(&samples, &[0, 0, 255, 255]).unwrap();
        assert_close(f.mean, 25.0, 1e-12);
        assert_close(f.median, 25.0, 1e-12);
        assert_close(f.min, 10.0, 1e-12);
        assert_close(f.max, 40.0, 1e-12);
        assert_close(f.std_dev, 125.0f64.sqrt(), 1e-12);
        assert_close(f.binary_mean, 127.5, 1e-12);
        // Symmetric distribution.
        assert_close(f.skewness.unwrap(), 0.0, 1e-12);
        // Uniform over four points: m4 / m2^2 = 1.64.
        assert_close(f.kurtosis.unwrap(), 1.64 - 3.0, 1e-12);
    }

    #[test]
    fn skewed_samples() {
        let samples = [0, 0, 0, 0, 100];
        let f = intensity_features(&samples, &samples).unwrap();
        // mean 20, m2 1600, m3 96000
        assert_close(f.skewness.unwrap(), 1.5, 1e-12);
        assert_close(f.median, 0.0, 1e-12);
    }

    #[test]
    fn higher_moments_need_enough_samples() {
        let two = intensity_features(&[1, 9], &[0, 255]).unwrap();
        assert_eq!(two.skewness, None);
        assert_eq!(two.kurtosis, None);

        let three = intensity_features(&[1, 9, 20], &[0, 0, 255]).unwrap();
        assert!(three.skewness.is_some());
        assert_eq!(three.kurtosis, None);

        let four = intensity_features(&[1, 9, 20, 3], &[0, 0, 255, 0]).unwrap();
        assert!(four.skewness.is_some());
        assert!(four.kurtosis.is_some());
    }

    #[test]
    fn constant_region_has_undefined_shape_moments() {
        let f = intensity_features(&[7; 10], &[0; 10]).unwrap();
        assert_eq!(f.std_dev, 0.0);
        assert_eq!(f.skewness, None);
        assert_eq!(f.kurtosis, None);
    }

    #[test]
    fn empty_region_is_undefined() {
        assert!(matches!(
            intensity_features(&[], &[]),
            Err(FeatureError::InsufficientSamples { found: 0, .. })
        ));
    }

    #[test]
    fn masked_samples_follow_mask() {
        let gray = GrayImage::from_fn(4, 2, |x, y| Luma([(x + 10 * y) as u8]));
        let mask = GrayImage::from_fn(4, 2, |x, _| Luma([if x % 2 == 0 { 255 } else { 0 }]));
        assert_eq!(masked_samples(&gray, &mask), vec![0, 2, 10, 12]);
    }

    #[test]
    fn otsu_separates_two_populations() {
        let mut samples = vec![20u8; 50];
        samples.extend(vec![200u8; 30]);
        let binary = otsu_binarize(&samples);
        assert_eq!(binary.iter().filter(|&&v| v == 255).count(), 30);
        assert!(binary[..50].iter().all(|&v| v == 0));
        assert!(otsu_binarize(&[]).is_empty());
    }
}

//! Gray-level co-occurrence texture descriptors.
//!
//! The region is cropped to the tight bounding box of its mask, pixels
//! outside the mask are zeroed, and intensities are quantized to
//! [`GLCM_LEVELS`] levels. Symmetric, normalized co-occurrence matrices are
//! built at unit distance for 0°, 45°, 90° and 135°; each property is the
//! mean over the four angles, except entropy which is taken over all four
//! matrices at once.

use image::GrayImage;

use crate::error::FeatureError;

/// Number of quantized gray levels.
pub const GLCM_LEVELS: usize = 8;

/// Regions with this many pixels or fewer carry no texture information.
pub const MIN_TEXTURE_PIXELS: usize = 25;

/// Minimum number of non-zero quantized pixels after cropping.
const MIN_NONZERO_LEVELS: usize = 4;

/// Unit pixel offsets `(dx, dy)` for 0°, 45°, 90° and 135°.
const OFFSETS: [(i64, i64); 4] = [(1, 0), (1, -1), (0, -1), (-1, -1)];

type Matrix = [[f64; GLCM_LEVELS]; GLCM_LEVELS];

/// Co-occurrence texture descriptors, averaged over the four angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureFeatures {
    pub contrast: f64,
    pub homogeneity: f64,
    pub energy: f64,
    pub correlation: f64,
    pub dissimilarity: f64,
    pub asm: f64,
    pub entropy: f64,
}

/// Quantized crop of a region: row-major levels within the mask's bounding box.
struct QuantizedRoi {
    width: usize,
    height: usize,
    levels: Vec<u8>,
}

impl QuantizedRoi {
    fn from_mask(gray: &GrayImage, mask: &GrayImage) -> Result<Self, FeatureError> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, m) in mask.enumerate_pixels() {
            if m.0[0] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        let (left, top, right, bottom) = bounds.ok_or(FeatureError::Degenerate("empty mask"))?;

        if right - left < 1 || bottom - top < 1 {
            return Err(FeatureError::Degenerate("bounding box thinner than 2 pixels"));
        }

        let width = (right - left + 1) as usize;
        let height = (bottom - top + 1) as usize;
        let step = (256 / GLCM_LEVELS) as u8;

        let mut levels = Vec::with_capacity(width * height);
        for y in top..=bottom {
            for x in left..=right {
                let inside = mask.get_pixel(x, y).0[0] > 0;
                let value = if inside { gray.get_pixel(x, y).0[0] } else { 0 };
                levels.push(value / step);
            }
        }

        Ok(Self {
            width,
            height,
            levels,
        })
    }

    fn nonzero_count(&self) -> usize {
        self.levels.iter().filter(|&&v| v > 0).count()
    }

    /// Symmetric co-occurrence matrix normalized to sum 1 (all zeros if no pairs).
    fn cooccurrence(&self, (dx, dy): (i64, i64)) -> Matrix {
        let mut counts: Matrix = [[0.0; GLCM_LEVELS]; GLCM_LEVELS];
        let (w, h) = (self.width as i64, self.height as i64);

        for y in 0..h {
            for x in 0..w {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let i = self.levels[(y * w + x) as usize] as usize;
                let j = self.levels[(ny * w + nx) as usize] as usize;
                counts[i][j] += 1.0;
                counts[j][i] += 1.0;
            }
        }

        let total: f64 = counts.iter().flatten().sum();
        if total > 0.0 {
            counts.iter_mut().flatten().for_each(|p| *p /= total);
        }
        counts
    }
}

/// Per-angle properties of one normalized matrix.
struct AngleProperties {
    contrast: f64,
    homogeneity: f64,
    asm: f64,
    correlation: f64,
    dissimilarity: f64,
}

impl AngleProperties {
    fn of(p: &Matrix) -> Self {
        let (mut contrast, mut homogeneity, mut asm, mut dissimilarity) = (0.0, 0.0, 0.0, 0.0);
        let (mut mean_i, mut mean_j) = (0.0, 0.0);

        for (i, row) in p.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let d = i as f64 - j as f64;
                contrast += v * d * d;
                dissimilarity += v * d.abs();
                homogeneity += v / (1.0 + d * d);
                asm += v * v;
                mean_i += v * i as f64;
                mean_j += v * j as f64;
            }
        }

        let (mut var_i, mut var_j, mut cov) = (0.0, 0.0, 0.0);
        for (i, row) in p.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let di = i as f64 - mean_i;
                let dj = j as f64 - mean_j;
                var_i += v * di * di;
                var_j += v * dj * dj;
                cov += v * di * dj;
            }
        }
        let (std_i, std_j) = (var_i.sqrt(), var_j.sqrt());
        // Constant matrices are perfectly correlated by convention.
        let correlation = if std_i < 1e-15 || std_j < 1e-15 {
            1.0
        } else {
            cov / (std_i * std_j)
        };

        Self {
            contrast,
            homogeneity,
            asm,
            correlation,
            dissimilarity,
        }
    }
}

fn finite(value: f64, name: &'static str) -> Result<f64, FeatureError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FeatureError::NonFinite(name))
    }
}

/// Computes the co-occurrence texture block for one region.
///
/// # Errors
///
/// The block fails as a whole when the mask has [`MIN_TEXTURE_PIXELS`]
/// pixels or fewer, when its bounding box is thinner than two pixels, when
/// fewer than four pixels have a non-zero quantized level, or when any
/// property comes out non-finite.
pub fn texture_features(gray: &GrayImage, mask: &GrayImage) -> Result<TextureFeatures, FeatureError> {
    let area = mask.pixels().filter(|p| p.0[0] > 0).count();
    if area <= MIN_TEXTURE_PIXELS {
        return Err(FeatureError::InsufficientSamples {
            required: MIN_TEXTURE_PIXELS + 1,
            found: area,
        });
    }

    let roi = QuantizedRoi::from_mask(gray, mask)?;
    let nonzero = roi.nonzero_count();
    if nonzero < MIN_NONZERO_LEVELS {
        return Err(FeatureError::InsufficientSamples {
            required: MIN_NONZERO_LEVELS,
            found: nonzero,
        });
    }

    let matrices: Vec<Matrix> = OFFSETS.iter().map(|&o| roi.cooccurrence(o)).collect();
    let properties: Vec<AngleProperties> = matrices.iter().map(AngleProperties::of).collect();

    let n = properties.len() as f64;
    let mean_of = |f: fn(&AngleProperties) -> f64| properties.iter().map(f).sum::<f64>() / n;

    let entropy: f64 = -matrices
        .iter()
        .flatten()
        .flatten()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>();

    Ok(TextureFeatures {
        contrast: finite(mean_of(|a| a.contrast), "contrast")?,
        homogeneity: finite(mean_of(|a| a.homogeneity), "homogeneity")?,
        energy: finite(mean_of(|a| a.asm.sqrt()), "energy")?,
        correlation: finite(mean_of(|a| a.correlation), "correlation")?,
        dissimilarity: finite(mean_of(|a| a.dissimilarity), "dissimilarity")?,
        asm: finite(mean_of(|a| a.asm), "asm")?,
        entropy: finite(entropy, "entropy")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square_mask(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {}, got {}", b, a);
    }

    #[test]
    fn uniform_region() {
        // Level 4 everywhere: every pair is (4, 4).
        let gray = GrayImage::from_pixel(32, 32, Luma([130]));
        let mask = square_mask(32, 4, 4, 10);
        let t = texture_features(&gray, &mask).unwrap();
        assert_close(t.contrast, 0.0);
        assert_close(t.dissimilarity, 0.0);
        assert_close(t.homogeneity, 1.0);
        assert_close(t.asm, 1.0);
        assert_close(t.energy, 1.0);
        assert_close(t.correlation, 1.0);
        // Each of the four matrices has a single entry of probability 1.
        assert_close(t.entropy, 0.0);
    }

    #[test]
    fn vertical_stripes_have_horizontal_contrast() {
        // Alternating levels 1 and 3 along x.
        let gray = GrayImage::from_fn(32, 32, |x, _| Luma([if x % 2 == 0 { 40 } else { 100 }]));
        let mask = square_mask(32, 0, 0, 8);
        let t = texture_features(&gray, &mask).unwrap();
        // 0°, 45° and 135° pairs always differ by 2, 90° pairs never differ.
        assert_close(t.contrast, 3.0 * 4.0 / 4.0);
        assert_close(t.dissimilarity, 3.0 * 2.0 / 4.0);
        assert!(t.correlation < 0.0);
        assert!(t.entropy > 0.0);
    }

    #[test]
    fn background_pairs_are_counted() {
        // A diagonal band inside its bounding box leaves zeroed corners.
        let gray = GrayImage::from_pixel(40, 40, Luma([255]));
        let mask = GrayImage::from_fn(40, 40, |x, y| {
            Luma([if (x as i32 - y as i32).abs() <= 3 && x < 20 { 255 } else { 0 }])
        });
        let t = texture_features(&gray, &mask).unwrap();
        assert!(t.contrast > 0.0);
        assert!(t.asm < 1.0);
    }

    #[test]
    fn small_region_is_undefined() {
        let gray = GrayImage::from_pixel(16, 16, Luma([200]));
        // 5 x 5 = 25 pixels: not enough.
        let mask = square_mask(16, 2, 2, 5);
        assert!(matches!(
            texture_features(&gray, &mask),
            Err(FeatureError::InsufficientSamples { found: 25, .. })
        ));
    }

    #[test]
    fn dark_region_is_undefined_after_quantization() {
        // Every intensity below 32 quantizes to level 0.
        let gray = GrayImage::from_pixel(16, 16, Luma([31]));
        let mask = square_mask(16, 2, 2, 8);
        assert!(matches!(
            texture_features(&gray, &mask),
            Err(FeatureError::InsufficientSamples { required: 4, found: 0 })
        ));
    }

    #[test]
    fn single_row_region_is_undefined() {
        let gray = GrayImage::from_pixel(64, 4, Luma([200]));
        let mask = GrayImage::from_fn(64, 4, |_, y| Luma([if y == 1 { 255 } else { 0 }]));
        assert!(matches!(
            texture_features(&gray, &mask),
            Err(FeatureError::Degenerate(_))
        ));
    }
}

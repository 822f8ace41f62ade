use image::Rgb;
use palette::{FromColor, Hsl, Srgb};

/// Generates `n` visually distinct, contrasting RGB colors.
///
/// Region outlines cycle through this palette so neighbouring regions stay
/// distinguishable on the annotated raster.
pub(crate) fn generate_contrasting_colors(n: usize) -> Vec<Rgb<u8>> {
    let mut colors = Vec::with_capacity(n);

    for i in 0..n {
        let hue = (i as f32 * 360.0) / n as f32;

        let hsl_color = Hsl::new(hue, 0.9, 0.5);
        let srgb_linear = Srgb::from_color(hsl_color);
        let srgb_u8: Srgb<u8> = srgb_linear.into_format();

        colors.push(Rgb([srgb_u8.red, srgb_u8.green, srgb_u8.blue]));
    }

    colors
}

/// Picks the outline color for a 1-based region index out of a palette of `n`.
pub(crate) fn region_color(palette: &[Rgb<u8>], region_index: usize) -> Rgb<u8> {
    if palette.is_empty() {
        return Rgb([255, 0, 0]);
    }
    palette[region_index.saturating_sub(1) % palette.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_contrasting_colors_works() {
        assert!(generate_contrasting_colors(0).is_empty());
        assert_eq!(generate_contrasting_colors(1), vec![Rgb([242, 13, 13])]);
        assert_eq!(
            generate_contrasting_colors(3),
            vec![Rgb([242, 13, 13]), Rgb([13, 242, 13]), Rgb([13, 13, 242])]
        );
    }

    #[test]
    fn region_color_cycles() {
        let palette = generate_contrasting_colors(3);
        assert_eq!(region_color(&palette, 1), palette[0]);
        assert_eq!(region_color(&palette, 3), palette[2]);
        assert_eq!(region_color(&palette, 4), palette[0]);
        assert_eq!(region_color(&[], 2), Rgb([255, 0, 0]));
    }
}

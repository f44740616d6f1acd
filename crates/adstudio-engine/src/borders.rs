use adstudio_contracts::geometry::BorderInsets;
use image::{Rgba, RgbaImage};

use crate::config::NormalizeConfig;

/// Measures the near-white band along each edge of `image`.
///
/// Each side is scanned inward one line at a time, sampling every
/// `border_sample_stride`-th pixel of the line. A line belongs to the border
/// while at least `border_line_fraction` of its samples are near-white. The
/// scan depth per side is capped at `border_scan_fraction` of the axis, so an
/// all-white image reports a quarter of each axis per side by default.
pub fn detect_borders(image: &RgbaImage, config: &NormalizeConfig) -> BorderInsets {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return BorderInsets::ZERO;
    }

    let stride = config.border_sample_stride.max(1) as usize;
    let row_limit = scan_limit(height, config.border_scan_fraction);
    let column_limit = scan_limit(width, config.border_scan_fraction);

    let row_is_border = |y: u32| {
        line_is_border(
            (0..width).step_by(stride).map(|x| image.get_pixel(x, y)),
            config,
        )
    };
    let column_is_border = |x: u32| {
        line_is_border(
            (0..height).step_by(stride).map(|y| image.get_pixel(x, y)),
            config,
        )
    };

    let insets = BorderInsets {
        top: count_border_lines(row_limit, |step| row_is_border(step)),
        bottom: count_border_lines(row_limit, |step| row_is_border(height - 1 - step)),
        left: count_border_lines(column_limit, |step| column_is_border(step)),
        right: count_border_lines(column_limit, |step| column_is_border(width - 1 - step)),
    };
    insets.clamped_to(width, height)
}

fn scan_limit(extent: u32, fraction: f64) -> u32 {
    let limit = (extent as f64 * fraction.clamp(0.0, 0.5)).floor() as u32;
    limit.min(extent)
}

fn count_border_lines(limit: u32, mut is_border: impl FnMut(u32) -> bool) -> u32 {
    (0..limit).take_while(|step| is_border(*step)).count() as u32
}

fn line_is_border<'a>(
    samples: impl Iterator<Item = &'a Rgba<u8>>,
    config: &NormalizeConfig,
) -> bool {
    let mut sampled = 0usize;
    let mut light = 0usize;
    for pixel in samples {
        sampled += 1;
        if is_near_white(pixel, config.border_brightness) {
            light += 1;
        }
    }
    sampled > 0 && light as f64 / sampled as f64 >= config.border_line_fraction
}

fn is_near_white(pixel: &Rgba<u8>, brightness: u8) -> bool {
    let [r, g, b, _] = pixel.0;
    r > brightness && g > brightness && b > brightness
}

#[cfg(test)]
mod tests {
    use adstudio_contracts::geometry::BorderInsets;
    use image::{Rgba, RgbaImage};

    use super::detect_borders;
    use crate::config::NormalizeConfig;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const INK: Rgba<u8> = Rgba([40, 60, 90, 255]);

    fn banded(width: u32, height: u32, bands: BorderInsets) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let in_band = y < bands.top
                || y >= height - bands.bottom
                || x < bands.left
                || x >= width - bands.right;
            if in_band {
                WHITE
            } else {
                INK
            }
        })
    }

    #[test]
    fn full_bleed_image_has_no_borders() {
        let image = RgbaImage::from_pixel(200, 120, INK);
        assert_eq!(
            detect_borders(&image, &NormalizeConfig::default()),
            BorderInsets::ZERO
        );
    }

    #[test]
    fn measures_each_side_independently() {
        let bands = BorderInsets {
            top: 12,
            bottom: 7,
            left: 20,
            right: 3,
        };
        let image = banded(300, 200, bands);
        assert_eq!(detect_borders(&image, &NormalizeConfig::default()), bands);
    }

    #[test]
    fn all_white_image_is_capped_at_a_quarter_per_side() {
        let image = RgbaImage::from_pixel(400, 202, WHITE);
        let insets = detect_borders(&image, &NormalizeConfig::default());
        assert_eq!(
            insets,
            BorderInsets {
                top: 50,
                bottom: 50,
                left: 100,
                right: 100,
            }
        );
        assert!(insets.top + insets.bottom < 202);
        assert!(insets.left + insets.right < 400);
    }

    #[test]
    fn light_grey_below_threshold_is_not_border() {
        let mut image = RgbaImage::from_pixel(100, 100, INK);
        for x in 0..100 {
            image.put_pixel(x, 0, Rgba([230, 230, 230, 255]));
        }
        assert_eq!(detect_borders(&image, &NormalizeConfig::default()).top, 0);
    }

    #[test]
    fn a_line_needs_eighty_percent_light_samples() {
        // Samples land on x = 0, 5, ..., 95: twenty per row.
        let mut mostly = RgbaImage::from_pixel(100, 100, INK);
        let mut barely = RgbaImage::from_pixel(100, 100, INK);
        for x in 0..100 {
            if x < 80 {
                mostly.put_pixel(x, 0, WHITE);
            }
            if x < 75 {
                barely.put_pixel(x, 0, WHITE);
            }
        }
        let config = NormalizeConfig::default();
        assert_eq!(detect_borders(&mostly, &config).top, 1);
        assert_eq!(detect_borders(&barely, &config).top, 0);
    }

    #[test]
    fn tiny_images_never_report_borders() {
        let image = RgbaImage::from_pixel(3, 3, WHITE);
        assert_eq!(
            detect_borders(&image, &NormalizeConfig::default()),
            BorderInsets::ZERO
        );
    }
}

use adstudio_contracts::geometry::OutputDimensions;

use crate::config::NormalizeConfig;
use crate::error::NormalizeError;

/// Output canvas for a `width / height` ratio.
///
/// The longer side is pinned to `max_dimension`; if that would leave the
/// shorter side under `min_dimension`, the shorter side is pinned to the
/// minimum instead and the longer one follows the ratio.
pub fn compute_output_dimensions(
    ratio: f64,
    config: &NormalizeConfig,
) -> Result<OutputDimensions, NormalizeError> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(NormalizeError::InvalidDimensions {
            width: ratio,
            height: 1.0,
        });
    }
    let max = config.max_dimension as f64;
    let min = config.min_dimension as f64;

    let (width, height) = if ratio >= 1.0 {
        let height = (max / ratio).round();
        if height < min {
            ((min * ratio).round(), min)
        } else {
            (max, height)
        }
    } else {
        let width = (max * ratio).round();
        if width < min {
            (min, (min / ratio).round())
        } else {
            (width, max)
        }
    };

    if width < 1.0 || height < 1.0 || width > u32::MAX as f64 || height > u32::MAX as f64 {
        return Err(NormalizeError::InvalidDimensions { width, height });
    }
    let pixels = width * height;
    if pixels > config.max_output_pixels as f64 {
        return Err(NormalizeError::ResourceLimit(format!(
            "output canvas {width}x{height} exceeds {} pixels",
            config.max_output_pixels
        )));
    }

    Ok(OutputDimensions {
        width: width as u32,
        height: height as u32,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::compute_output_dimensions;
    use crate::config::NormalizeConfig;
    use crate::error::NormalizeError;

    fn dims(ratio: f64) -> (u32, u32) {
        let out = compute_output_dimensions(ratio, &NormalizeConfig::default()).unwrap();
        (out.width, out.height)
    }

    #[test]
    fn preset_ratios_hit_the_expected_canvases() {
        assert_eq!(dims(1.0), (2048, 2048));
        assert_eq!(dims(16.0 / 9.0), (2048, 1152));
        assert_eq!(dims(9.0 / 16.0), (1152, 2048));
        assert_eq!(dims(4.0 / 3.0), (2048, 1536));
        assert_eq!(dims(3.0 / 4.0), (1536, 2048));
    }

    #[test]
    fn very_wide_ratio_pins_the_short_side_to_the_floor() {
        // 2048 / (21/9) = 878 < 1024
        assert_eq!(dims(21.0 / 9.0), (2389, 1024));
        assert_eq!(dims(9.0 / 21.0), (1024, 2389));
    }

    #[test]
    fn degenerate_ratios_are_rejected() {
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                compute_output_dimensions(ratio, &NormalizeConfig::default()),
                Err(NormalizeError::InvalidDimensions { .. })
            ));
        }
    }

    #[test]
    fn absurd_ratios_trip_the_canvas_limit() {
        assert!(matches!(
            compute_output_dimensions(1000.0, &NormalizeConfig::default()),
            Err(NormalizeError::ResourceLimit(_))
        ));
    }

    #[test]
    fn canvas_limit_sits_between_61_and_64_to_1() {
        // 62464 x 1024 is just under 64M pixels; 65536 x 1024 is over.
        assert_eq!(dims(61.0), (62464, 1024));
        assert_eq!(dims(1.0 / 61.0), (1024, 62464));
        for ratio in [64.0, 1.0 / 64.0] {
            assert!(matches!(
                compute_output_dimensions(ratio, &NormalizeConfig::default()),
                Err(NormalizeError::ResourceLimit(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn output_respects_cap_and_floor(w in 1u32..=32, h in 1u32..=32) {
            let ratio = w as f64 / h as f64;
            let (width, height) = dims(ratio);
            let (long, short) = (width.max(height), width.min(height));
            prop_assert!(short >= 1024);
            if short == 1024 && long != 2048 {
                let expected = (1024.0 * ratio.max(1.0 / ratio)).round() as u32;
                prop_assert_eq!(long, expected);
            } else {
                prop_assert_eq!(long, 2048);
            }
            let relative = ((width as f64 / height as f64) - ratio).abs() / ratio;
            prop_assert!(relative <= 0.01);
        }
    }
}

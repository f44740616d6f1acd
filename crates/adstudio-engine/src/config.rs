use std::env;

use fast_image_resize as fr;

/// Tunables for border detection, cropping and output sizing.
///
/// Defaults are the empirically chosen values the studio ships with; every
/// field can be overridden from the environment via [`NormalizeConfig::from_env`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeConfig {
    /// A channel must be strictly above this to count as near-white.
    pub border_brightness: u8,
    /// Every n-th pixel along a scan line is sampled.
    pub border_sample_stride: u32,
    /// Share of near-white samples that makes a line part of a border.
    pub border_line_fraction: f64,
    /// Scan depth per side, as a share of that axis.
    pub border_scan_fraction: f64,
    /// Insets are applied only if some side exceeds this share of its axis.
    pub border_significance: f64,
    /// Relative ratio deviation tolerated before cropping.
    pub ratio_tolerance: f64,
    pub max_dimension: u32,
    pub min_dimension: u32,
    pub resample_filter: ResampleFilter,
    /// Upper bound on `width * height` of decoded input.
    pub max_decoded_pixels: u64,
    /// Upper bound on `width * height` of the output canvas.
    pub max_output_pixels: u64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            border_brightness: 230,
            border_sample_stride: 5,
            border_line_fraction: 0.8,
            border_scan_fraction: 0.25,
            border_significance: 0.03,
            ratio_tolerance: 0.01,
            max_dimension: 2048,
            min_dimension: 1024,
            resample_filter: ResampleFilter::CatmullRom,
            max_decoded_pixels: 100_000_000,
            max_output_pixels: 64_000_000,
        }
    }
}

impl NormalizeConfig {
    /// Defaults with `ADSTUDIO_*` overrides applied; out-of-range values are
    /// clamped and unparsable ones ignored.
    pub fn from_env() -> Self {
        let base = Self::default();
        let mut config = Self {
            border_brightness: env_f64(
                "ADSTUDIO_BORDER_BRIGHTNESS",
                base.border_brightness as f64,
                0.0,
                254.0,
            )
            .round() as u8,
            border_sample_stride: env_f64(
                "ADSTUDIO_BORDER_SAMPLE_STRIDE",
                base.border_sample_stride as f64,
                1.0,
                64.0,
            )
            .round() as u32,
            border_line_fraction: env_f64(
                "ADSTUDIO_BORDER_LINE_FRACTION",
                base.border_line_fraction,
                0.05,
                1.0,
            ),
            border_scan_fraction: env_f64(
                "ADSTUDIO_BORDER_SCAN_FRACTION",
                base.border_scan_fraction,
                0.0,
                0.45,
            ),
            border_significance: env_f64(
                "ADSTUDIO_BORDER_SIGNIFICANCE",
                base.border_significance,
                0.0,
                0.45,
            ),
            ratio_tolerance: env_f64("ADSTUDIO_RATIO_TOLERANCE", base.ratio_tolerance, 0.0, 0.1),
            max_dimension: env_f64(
                "ADSTUDIO_MAX_DIMENSION",
                base.max_dimension as f64,
                16.0,
                16384.0,
            )
            .round() as u32,
            min_dimension: env_f64(
                "ADSTUDIO_MIN_DIMENSION",
                base.min_dimension as f64,
                16.0,
                16384.0,
            )
            .round() as u32,
            resample_filter: non_empty_env("ADSTUDIO_RESAMPLE_FILTER")
                .and_then(|raw| parse_filter(&raw))
                .unwrap_or(base.resample_filter),
            ..base
        };
        if config.min_dimension > config.max_dimension {
            log::warn!(
                "min dimension {} exceeds max dimension {}; using max for both",
                config.min_dimension,
                config.max_dimension
            );
            config.min_dimension = config.max_dimension;
        }
        config
    }
}

/// Convolution filters only; nearest-neighbour and box sampling alias badly
/// at the scale factors the normalizer works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleFilter {
    Bilinear,
    CatmullRom,
    Mitchell,
    Lanczos3,
}

impl ResampleFilter {
    pub(crate) fn to_fast_filter(self) -> fr::FilterType {
        match self {
            Self::Bilinear => fr::FilterType::Bilinear,
            Self::CatmullRom => fr::FilterType::CatmullRom,
            Self::Mitchell => fr::FilterType::Mitchell,
            Self::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}

pub fn parse_filter(raw: &str) -> Option<ResampleFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "bilinear" | "triangle" => Some(ResampleFilter::Bilinear),
        "bicubic" | "catmullrom" | "catmull-rom" => Some(ResampleFilter::CatmullRom),
        "mitchell" => Some(ResampleFilter::Mitchell),
        "lanczos" | "lanczos3" => Some(ResampleFilter::Lanczos3),
        _ => None,
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn env_f64(key: &str, default: f64, min: f64, max: f64) -> f64 {
    non_empty_env(key)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::{env_f64, parse_filter, NormalizeConfig, ResampleFilter};

    #[test]
    fn defaults_match_shipped_constants() {
        let config = NormalizeConfig::default();
        assert_eq!(config.border_brightness, 230);
        assert_eq!(config.border_sample_stride, 5);
        assert_eq!(config.border_line_fraction, 0.8);
        assert_eq!(config.border_scan_fraction, 0.25);
        assert_eq!(config.border_significance, 0.03);
        assert_eq!(config.ratio_tolerance, 0.01);
        assert_eq!((config.max_dimension, config.min_dimension), (2048, 1024));
    }

    #[test]
    fn filter_names_exclude_nearest() {
        assert_eq!(parse_filter("Lanczos3"), Some(ResampleFilter::Lanczos3));
        assert_eq!(parse_filter("bicubic"), Some(ResampleFilter::CatmullRom));
        assert_eq!(parse_filter("nearest"), None);
        assert_eq!(parse_filter("box"), None);
    }

    #[test]
    fn env_values_are_clamped_and_validated() {
        std::env::set_var("ADSTUDIO_TEST_CLAMP_HIGH", "9000");
        std::env::set_var("ADSTUDIO_TEST_CLAMP_BAD", "lots");
        assert_eq!(env_f64("ADSTUDIO_TEST_CLAMP_HIGH", 5.0, 1.0, 64.0), 64.0);
        assert_eq!(env_f64("ADSTUDIO_TEST_CLAMP_BAD", 5.0, 1.0, 64.0), 5.0);
        assert_eq!(env_f64("ADSTUDIO_TEST_CLAMP_MISSING", 5.0, 1.0, 64.0), 5.0);
    }
}

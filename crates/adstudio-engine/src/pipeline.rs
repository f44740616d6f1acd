use std::thread;

use adstudio_contracts::aspect::AspectRatio;
use adstudio_contracts::geometry::{BorderInsets, CropRect, OutputDimensions};
use image::RgbaImage;
use serde::Serialize;

use crate::borders::detect_borders;
use crate::config::NormalizeConfig;
use crate::crop::{compute_crop_rect, significant_insets};
use crate::dimensions::compute_output_dimensions;
use crate::error::NormalizeError;
use crate::raster::{decode_data_url, decode_rgba, encode_data_url, encode_png, resample, PNG_MIME};

/// Geometry decided for one image before any pixels are resampled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationPlan {
    pub source_width: u32,
    pub source_height: u32,
    /// Raw detector output.
    pub insets: BorderInsets,
    /// Insets after the significance cutoff; zero when ignored.
    pub insets_applied: BorderInsets,
    pub crop: CropRect,
    pub output: OutputDimensions,
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub bytes: Vec<u8>,
    pub plan: NormalizationPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Bypassed,
    Normalized(NormalizationPlan),
    FellBack(String),
}

/// Result of [`Normalizer::normalize_or_original`]: always carries usable bytes.
#[derive(Debug, Clone)]
pub struct BestEffort {
    pub bytes: Vec<u8>,
    pub outcome: NormalizeOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Geometry for `image` at `target`, or `None` when `target` is Auto.
    pub fn plan(
        &self,
        image: &RgbaImage,
        target: &AspectRatio,
    ) -> Result<Option<NormalizationPlan>, NormalizeError> {
        let Some(ratio) = target.value() else {
            return Ok(None);
        };
        let (width, height) = image.dimensions();
        let insets = detect_borders(image, &self.config);
        let insets_applied = significant_insets(width, height, &insets, &self.config);
        let crop = compute_crop_rect(width, height, &insets, target, &self.config);
        let output = compute_output_dimensions(ratio, &self.config)?;
        log::debug!(
            "plan {width}x{height} -> {target}: insets {insets:?}, crop {crop:?}, output {}x{}",
            output.width,
            output.height
        );
        Ok(Some(NormalizationPlan {
            source_width: width,
            source_height: height,
            insets,
            insets_applied,
            crop,
            output,
            aspect_ratio: *target,
        }))
    }

    /// Crops and resizes a decoded image; Auto returns a copy of the input.
    pub fn normalize_image(
        &self,
        image: &RgbaImage,
        target: &AspectRatio,
    ) -> Result<RgbaImage, NormalizeError> {
        match self.plan(image, target)? {
            Some(plan) => self.render(image, &plan),
            None => Ok(image.clone()),
        }
    }

    /// Encoded image in, PNG out. Auto returns `encoded` untouched without
    /// decoding it.
    pub fn normalize(&self, encoded: &[u8], target: &str) -> Result<Vec<u8>, NormalizeError> {
        let target = AspectRatio::parse(target)?;
        if target.is_auto() {
            return Ok(encoded.to_vec());
        }
        Ok(self.normalize_detailed(encoded, &target)?.bytes)
    }

    pub fn normalize_detailed(
        &self,
        encoded: &[u8],
        target: &AspectRatio,
    ) -> Result<Normalized, NormalizeError> {
        let image = decode_rgba(encoded, &self.config)?;
        let plan = match self.plan(&image, target)? {
            Some(plan) => plan,
            None => {
                // Auto still yields a plan so callers can report the source size.
                let (width, height) = image.dimensions();
                return Ok(Normalized {
                    bytes: encoded.to_vec(),
                    plan: NormalizationPlan {
                        source_width: width,
                        source_height: height,
                        insets: BorderInsets::ZERO,
                        insets_applied: BorderInsets::ZERO,
                        crop: CropRect::full(width, height),
                        output: OutputDimensions { width, height },
                        aspect_ratio: *target,
                    },
                });
            }
        };
        let canvas = self.render(&image, &plan)?;
        let bytes = encode_png(&canvas)?;
        log::info!(
            "normalized {}x{} to {}x{} ({} bytes)",
            plan.source_width,
            plan.source_height,
            plan.output.width,
            plan.output.height,
            bytes.len()
        );
        Ok(Normalized { bytes, plan })
    }

    /// Same as [`Normalizer::normalize`] for `data:` URIs; the result is
    /// always `image/png` unless `target` is Auto.
    pub fn normalize_data_url(
        &self,
        data_url: &str,
        target: &str,
    ) -> Result<String, NormalizeError> {
        let target = AspectRatio::parse(target)?;
        if target.is_auto() {
            return Ok(data_url.to_string());
        }
        let decoded = decode_data_url(data_url)?;
        let normalized = self.normalize_detailed(&decoded.bytes, &target)?;
        Ok(encode_data_url(PNG_MIME, &normalized.bytes))
    }

    /// Never fails: an unsupported ratio behaves like Auto and any pipeline
    /// error hands back the original bytes.
    pub fn normalize_or_original(&self, encoded: &[u8], target: &str) -> BestEffort {
        let target = match AspectRatio::parse(target) {
            Ok(target) => target,
            Err(err) => {
                log::warn!("{err}; keeping the source image");
                return BestEffort {
                    bytes: encoded.to_vec(),
                    outcome: NormalizeOutcome::Bypassed,
                };
            }
        };
        if target.is_auto() {
            return BestEffort {
                bytes: encoded.to_vec(),
                outcome: NormalizeOutcome::Bypassed,
            };
        }
        match self.normalize_detailed(encoded, &target) {
            Ok(normalized) => BestEffort {
                bytes: normalized.bytes,
                outcome: NormalizeOutcome::Normalized(normalized.plan),
            },
            Err(err) => {
                log::warn!("normalization to {target} failed, using original: {err}");
                BestEffort {
                    bytes: encoded.to_vec(),
                    outcome: NormalizeOutcome::FellBack(err.to_string()),
                }
            }
        }
    }

    /// Normalizes independent images on scoped threads. Results keep input
    /// order.
    pub fn normalize_batch(&self, inputs: &[Vec<u8>], target: &str) -> Vec<BestEffort> {
        thread::scope(|scope| {
            let handles: Vec<_> = inputs
                .iter()
                .map(|encoded| scope.spawn(move || self.normalize_or_original(encoded, target)))
                .collect();
            handles
                .into_iter()
                .zip(inputs)
                .map(|(handle, encoded)| {
                    handle.join().unwrap_or_else(|_| BestEffort {
                        bytes: encoded.clone(),
                        outcome: NormalizeOutcome::FellBack("worker panicked".to_string()),
                    })
                })
                .collect()
        })
    }

    fn render(
        &self,
        image: &RgbaImage,
        plan: &NormalizationPlan,
    ) -> Result<RgbaImage, NormalizeError> {
        resample(image, &plan.crop, plan.output, self.config.resample_filter)
    }
}

use adstudio_contracts::events::{EventPayload, EventWriter};
use adstudio_contracts::geometry::{CropRect, OutputDimensions};
use adstudio_contracts::upscale::{upscale_dimensions, QuotaLedger, QuotaStatus, UpscaleScale};
use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::config::{non_empty_env, NormalizeConfig, ResampleFilter};
use crate::error::{NormalizeError, UpscaleError};
use crate::generate::{GeneratedImage, InlineImage};
use crate::raster::{decode_rgba, encode_png, probe_dimensions, resample, PNG_MIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpscaleOptions {
    pub scale: UpscaleScale,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
}

impl UpscaleOptions {
    pub fn scale(scale: UpscaleScale) -> Self {
        Self {
            scale,
            target_width: None,
            target_height: None,
        }
    }

    /// Explicit targets win; a missing one falls back to `scale` times the source.
    pub fn target_for(&self, width: u32, height: u32) -> OutputDimensions {
        let scaled = upscale_dimensions(width, height, self.scale);
        OutputDimensions {
            width: self.target_width.filter(|w| *w > 0).unwrap_or(scaled.width),
            height: self.target_height.filter(|h| *h > 0).unwrap_or(scaled.height),
        }
    }
}

pub trait Upscaler: Send + Sync {
    fn name(&self) -> &str;
    fn upscale(&self, image: &InlineImage, target: OutputDimensions) -> Result<InlineImage>;
}

/// Local upscaler for offline runs: Lanczos resampling of the whole frame.
#[derive(Debug, Clone, Copy)]
pub struct ResampleUpscaler {
    pub max_pixels: u64,
}

impl Default for ResampleUpscaler {
    fn default() -> Self {
        Self {
            max_pixels: 128_000_000,
        }
    }
}

impl Upscaler for ResampleUpscaler {
    fn name(&self) -> &str {
        "resample"
    }

    fn upscale(&self, image: &InlineImage, target: OutputDimensions) -> Result<InlineImage> {
        let pixels = u64::from(target.width) * u64::from(target.height);
        if pixels > self.max_pixels {
            return Err(NormalizeError::ResourceLimit(format!(
                "upscale target {}x{} exceeds {} pixels",
                target.width, target.height, self.max_pixels
            ))
            .into());
        }
        let config = NormalizeConfig::default();
        let source = decode_rgba(&image.bytes, &config)?;
        let (width, height) = source.dimensions();
        let canvas = resample(
            &source,
            &CropRect::full(width, height),
            target,
            ResampleFilter::Lanczos3,
        )?;
        Ok(InlineImage::new(PNG_MIME, encode_png(&canvas)?))
    }
}

/// Enabled unless `ADSTUDIO_ENABLE_UPSCALING` is set to something other
/// than `true`.
pub fn upscaling_enabled_from_env() -> bool {
    non_empty_env("ADSTUDIO_ENABLE_UPSCALING")
        .map(|raw| raw.eq_ignore_ascii_case("true"))
        .unwrap_or(true)
}

#[derive(Debug, Clone)]
pub struct Upscaled {
    pub data_url: String,
    pub original_data_url: String,
    pub dimensions: OutputDimensions,
    pub quota: QuotaStatus,
}

/// Gatekeeper around an [`Upscaler`]: feature switch, monthly quota and
/// event logging.
pub struct UpscaleService<U: Upscaler> {
    upscaler: U,
    ledger: QuotaLedger,
    enabled: bool,
    events: EventWriter,
}

impl<U: Upscaler> UpscaleService<U> {
    pub fn new(upscaler: U, ledger: QuotaLedger, enabled: bool, events: EventWriter) -> Self {
        Self {
            upscaler,
            ledger,
            enabled,
            events,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn quota(&self) -> QuotaStatus {
        self.ledger.status()
    }

    pub fn upscale_data_url(&self, data_url: &str, options: &UpscaleOptions) -> Result<Upscaled> {
        if !self.enabled {
            return Err(UpscaleError::Disabled.into());
        }
        let quota = self.ledger.status();
        if quota.is_exhausted() {
            return Err(UpscaleError::QuotaExhausted {
                used: quota.used,
                total: quota.total,
            }
            .into());
        }

        let source = InlineImage::from_data_url(data_url)?;
        let (width, height) = probe_dimensions(&source.bytes)?;
        let target = options.target_for(width, height);
        log::info!(
            "upscaling {width}x{height} to {}x{} with {}",
            target.width,
            target.height,
            self.upscaler.name()
        );
        let upscaled = self
            .upscaler
            .upscale(&source, target)
            .with_context(|| format!("{} upscale failed", self.upscaler.name()))?;
        let quota = self
            .ledger
            .record_use()
            .context("failed to record upscale quota usage")?;

        self.emit(json!({
            "upscaler": self.upscaler.name(),
            "source": [width, height],
            "target": [target.width, target.height],
            "quota_remaining": quota.remaining,
        }));
        Ok(Upscaled {
            data_url: upscaled.to_data_url(),
            original_data_url: data_url.to_string(),
            dimensions: target,
            quota,
        })
    }

    /// Upscales `image` in place of its current data URL, keeping the first
    /// pre-upscale version for comparison.
    pub fn upscale_image(
        &self,
        image: &GeneratedImage,
        options: &UpscaleOptions,
    ) -> Result<GeneratedImage> {
        let upscaled = self.upscale_data_url(&image.image_data_url, options)?;
        let mut out = image.clone();
        out.original_image_data_url = image
            .original_image_data_url
            .clone()
            .or(Some(upscaled.original_data_url));
        out.image_data_url = upscaled.data_url;
        Ok(out)
    }

    fn emit(&self, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = self.events.emit("upscale_finished", payload) {
            log::warn!("failed to record upscale_finished event: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use adstudio_contracts::events::EventWriter;
    use adstudio_contracts::geometry::OutputDimensions;
    use adstudio_contracts::upscale::{QuotaLedger, UpscaleScale};
    use anyhow::{anyhow, Result};
    use image::{Rgba, RgbaImage};

    use super::{ResampleUpscaler, UpscaleOptions, UpscaleService, Upscaler};
    use crate::error::UpscaleError;
    use crate::generate::InlineImage;
    use crate::raster::{decode_data_url, encode_data_url, encode_png, probe_dimensions};

    struct Failing;

    impl Upscaler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn upscale(&self, _: &InlineImage, _: OutputDimensions) -> Result<InlineImage> {
            Err(anyhow!("Invalid ClipDrop API key."))
        }
    }

    fn source_url(width: u32, height: u32) -> String {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]));
        encode_data_url("image/png", &encode_png(&image).unwrap())
    }

    #[test]
    fn explicit_targets_override_scale() {
        let options = UpscaleOptions {
            scale: UpscaleScale::X4,
            target_width: Some(500),
            target_height: None,
        };
        assert_eq!(
            options.target_for(100, 50),
            OutputDimensions {
                width: 500,
                height: 200
            }
        );
    }

    #[test]
    fn successful_upscale_records_quota_and_keeps_original() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = QuotaLedger::new(dir.path().join("quota.json"), 100);
        let service = UpscaleService::new(
            ResampleUpscaler::default(),
            ledger,
            true,
            EventWriter::disabled("test"),
        );
        let original = source_url(30, 20);
        let upscaled =
            service.upscale_data_url(&original, &UpscaleOptions::scale(UpscaleScale::X2))?;

        assert_eq!(upscaled.original_data_url, original);
        assert_eq!(upscaled.quota.used, 1);
        assert_eq!(upscaled.quota.remaining, 99);
        let bytes = decode_data_url(&upscaled.data_url)?.bytes;
        assert_eq!(probe_dimensions(&bytes)?, (60, 40));
        Ok(())
    }

    #[test]
    fn failed_upscale_does_not_consume_quota() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = QuotaLedger::new(dir.path().join("quota.json"), 100);
        let service = UpscaleService::new(Failing, ledger, true, EventWriter::disabled("test"));
        assert!(service
            .upscale_data_url(&source_url(4, 4), &UpscaleOptions::scale(UpscaleScale::X2))
            .is_err());
        assert_eq!(service.quota().used, 0);
        Ok(())
    }

    #[test]
    fn exhausted_quota_is_refused() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ledger = QuotaLedger::new(dir.path().join("quota.json"), 1);
        ledger.record_use()?;
        let service = UpscaleService::new(
            ResampleUpscaler::default(),
            ledger,
            true,
            EventWriter::disabled("test"),
        );
        let err = service
            .upscale_data_url(&source_url(4, 4), &UpscaleOptions::scale(UpscaleScale::X2))
            .err()
            .ok_or_else(|| anyhow!("expected quota error"))?;
        assert!(matches!(
            err.downcast_ref::<UpscaleError>(),
            Some(UpscaleError::QuotaExhausted { used: 1, total: 1 })
        ));
        Ok(())
    }

    #[test]
    fn disabled_service_refuses() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let service = UpscaleService::new(
            ResampleUpscaler::default(),
            QuotaLedger::new(dir.path().join("quota.json"), 100),
            false,
            EventWriter::disabled("test"),
        );
        let err = service
            .upscale_data_url(&source_url(4, 4), &UpscaleOptions::scale(UpscaleScale::X4))
            .err()
            .ok_or_else(|| anyhow!("expected disabled error"))?;
        assert!(matches!(err.downcast_ref::<UpscaleError>(), Some(UpscaleError::Disabled)));
        Ok(())
    }

    #[test]
    fn resample_upscaler_refuses_oversized_targets() {
        let upscaler = ResampleUpscaler { max_pixels: 100 };
        let image = InlineImage::new("image/png", Vec::new());
        let target = OutputDimensions {
            width: 20,
            height: 20,
        };
        assert!(upscaler.upscale(&image, target).is_err());
    }
}

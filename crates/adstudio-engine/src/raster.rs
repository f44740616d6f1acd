//! Decode, resample and encode: the only stages that touch pixel buffers.

use std::io::Cursor;

use adstudio_contracts::geometry::{CropRect, OutputDimensions};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use fast_image_resize as fr;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbaImage};

use crate::config::{NormalizeConfig, ResampleFilter};
use crate::error::NormalizeError;

pub const PNG_MIME: &str = "image/png";

/// Payload of a `data:<mime>;base64,<data>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_url(raw: &str) -> Result<DataUrl, NormalizeError> {
    let trimmed = raw.trim();
    let rest = trimmed
        .strip_prefix("data:")
        .ok_or_else(|| NormalizeError::Decode("not a data URI".to_string()))?;
    let (mime_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| {
            NormalizeError::Decode("data URI is missing the base64 marker".to_string())
        })?;
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| NormalizeError::Decode(format!("data URI base64 is invalid: {e}")))?;
    Ok(DataUrl {
        mime_type: if mime_type.is_empty() {
            PNG_MIME.to_string()
        } else {
            mime_type.to_string()
        },
        bytes,
    })
}

pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// MIME type sniffed from the leading bytes; PNG when unrecognised.
pub fn guess_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(PNG_MIME)
}

/// Reads width and height from the image header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), NormalizeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NormalizeError::Decode(format!("cannot identify image format: {e}")))?
        .into_dimensions()
        .map_err(|e| NormalizeError::Decode(format!("cannot read image dimensions: {e}")))
}

/// Decodes any supported raster format into RGBA8, refusing inputs whose
/// header already exceeds the pixel budget.
pub fn decode_rgba(bytes: &[u8], config: &NormalizeConfig) -> Result<RgbaImage, NormalizeError> {
    let (width, height) = probe_dimensions(bytes)?;
    let pixels = u64::from(width) * u64::from(height);
    if pixels > config.max_decoded_pixels {
        return Err(NormalizeError::ResourceLimit(format!(
            "source image {width}x{height} exceeds {} pixels",
            config.max_decoded_pixels
        )));
    }
    if pixels == 0 {
        return Err(NormalizeError::Decode(format!(
            "source image has empty dimensions {width}x{height}"
        )));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| NormalizeError::Decode(e.to_string()))?;
    Ok(decoded.to_rgba8())
}

/// Samples `crop` of `source` onto a fresh `output`-sized canvas.
pub fn resample(
    source: &RgbaImage,
    crop: &CropRect,
    output: OutputDimensions,
    filter: ResampleFilter,
) -> Result<RgbaImage, NormalizeError> {
    if output.width == 0 || output.height == 0 {
        return Err(NormalizeError::InvalidDimensions {
            width: output.width as f64,
            height: output.height as f64,
        });
    }
    let (src_width, src_height) = source.dimensions();
    if !crop.fits_within(src_width, src_height) {
        return Err(NormalizeError::Resize(format!(
            "crop {:.2},{:.2} {:.2}x{:.2} falls outside {src_width}x{src_height}",
            crop.x, crop.y, crop.width, crop.height
        )));
    }

    let src_view = fr::images::ImageRef::new(
        src_width,
        src_height,
        source.as_raw(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| NormalizeError::Resize(format!("cannot wrap source buffer: {e}")))?;
    let mut dst_image = fr::images::Image::new(output.width, output.height, fr::PixelType::U8x4);

    // Snap sub-epsilon overshoot back inside the source.
    let left = crop.x.max(0.0);
    let top = crop.y.max(0.0);
    let crop_width = crop.width.min(src_width as f64 - left);
    let crop_height = crop.height.min(src_height as f64 - top);
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(filter.to_fast_filter()))
        .crop(left, top, crop_width, crop_height);
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, &options)
        .map_err(|e| NormalizeError::Resize(e.to_string()))?;

    RgbaImage::from_raw(output.width, output.height, dst_image.into_vec())
        .ok_or_else(|| NormalizeError::Resize("resized buffer has unexpected length".to_string()))
}

/// Lossless PNG at the strongest compression setting.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, NormalizeError> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use adstudio_contracts::geometry::{CropRect, OutputDimensions};
    use image::{Rgba, RgbaImage};

    use super::{
        decode_data_url, decode_rgba, encode_data_url, encode_png, guess_mime, probe_dimensions,
        resample,
    };
    use crate::config::{NormalizeConfig, ResampleFilter};
    use crate::error::NormalizeError;

    #[test]
    fn data_url_round_trip_keeps_mime_and_bytes() -> anyhow::Result<()> {
        let url = encode_data_url("image/jpeg", b"\x01\x02\x03");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let parsed = decode_data_url(&url)?;
        assert_eq!(parsed.mime_type, "image/jpeg");
        assert_eq!(parsed.bytes, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn malformed_data_urls_are_decode_errors() {
        for raw in ["hello", "data:image/png,AAAA", "data:image/png;base64,***"] {
            assert!(matches!(decode_data_url(raw), Err(NormalizeError::Decode(_))));
        }
    }

    #[test]
    fn mime_is_sniffed_from_content() -> anyhow::Result<()> {
        let png = encode_png(&RgbaImage::new(2, 2))?;
        assert_eq!(guess_mime(&png), "image/png");
        assert_eq!(guess_mime(b"\xFF\xD8\xFF\xE0rest"), "image/jpeg");
        assert_eq!(guess_mime(b"???"), "image/png");
        Ok(())
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = decode_rgba(b"definitely not an image", &NormalizeConfig::default());
        assert!(matches!(result, Err(NormalizeError::Decode(_))));
    }

    #[test]
    fn decode_enforces_pixel_budget() -> anyhow::Result<()> {
        let png = encode_png(&RgbaImage::new(40, 40))?;
        let config = NormalizeConfig {
            max_decoded_pixels: 1000,
            ..NormalizeConfig::default()
        };
        assert!(matches!(
            decode_rgba(&png, &config),
            Err(NormalizeError::ResourceLimit(_))
        ));
        Ok(())
    }

    #[test]
    fn png_encoding_is_lossless() -> anyhow::Result<()> {
        let image = RgbaImage::from_fn(17, 9, |x, y| Rgba([x as u8 * 13, y as u8 * 27, 99, 255]));
        let png = encode_png(&image)?;
        assert_eq!(probe_dimensions(&png)?, (17, 9));
        let decoded = decode_rgba(&png, &NormalizeConfig::default())?;
        assert_eq!(decoded, image);
        Ok(())
    }

    #[test]
    fn resample_only_reads_the_crop() -> anyhow::Result<()> {
        // Red strip on the left, blue elsewhere; the crop stays clear of the
        // strip by more than the filter support.
        let source = RgbaImage::from_fn(300, 100, |x, _| {
            if x < 100 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let crop = CropRect {
            x: 150.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let out = resample(
            &source,
            &crop,
            OutputDimensions {
                width: 300,
                height: 300,
            },
            ResampleFilter::CatmullRom,
        )?;
        assert_eq!(out.dimensions(), (300, 300));
        assert!(out.pixels().all(|pixel| pixel.0[0] < 8 && pixel.0[2] > 247));
        Ok(())
    }

    #[test]
    fn resample_rejects_out_of_bounds_crop() {
        let source = RgbaImage::new(10, 10);
        let crop = CropRect {
            x: 5.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let result = resample(
            &source,
            &crop,
            OutputDimensions {
                width: 4,
                height: 4,
            },
            ResampleFilter::Bilinear,
        );
        assert!(matches!(result, Err(NormalizeError::Resize(_))));
    }
}

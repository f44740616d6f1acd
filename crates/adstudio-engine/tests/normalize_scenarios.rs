use adstudio_contracts::aspect::{AspectRatio, PRESET_RATIOS};
use adstudio_contracts::geometry::{BorderInsets, CropRect};
use adstudio_engine::raster::{decode_rgba, encode_png, probe_dimensions};
use adstudio_engine::{normalize, NormalizeConfig, NormalizeError, Normalizer};
use anyhow::Result;
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Busy full-bleed content with no channel ever near white.
fn photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 7 % 200) as u8,
            (y * 3 % 190) as u8,
            ((x + 2 * y) % 170) as u8,
            255,
        ])
    })
}

#[test]
fn auto_is_a_byte_for_byte_no_op() -> Result<()> {
    let png = encode_png(&photo(123, 77))?;
    let out = normalize(&png, "Auto")?;
    assert_eq!(out, png);
    let decoded = decode_rgba(&out, &NormalizeConfig::default())?;
    assert_eq!(decoded, photo(123, 77));
    Ok(())
}

#[test]
fn square_source_with_top_band_to_square_target() -> Result<()> {
    let mut image = photo(1000, 1000);
    for y in 0..50 {
        for x in 0..1000 {
            image.put_pixel(x, y, WHITE);
        }
    }
    let normalizer = Normalizer::default();
    let plan = normalizer
        .plan(&image, &AspectRatio::parse("1:1")?)?
        .ok_or_else(|| anyhow::anyhow!("fixed ratio must produce a plan"))?;
    assert_eq!(
        plan.insets,
        BorderInsets {
            top: 50,
            bottom: 0,
            left: 0,
            right: 0,
        }
    );
    assert_eq!(
        plan.crop,
        CropRect {
            x: 25.0,
            y: 50.0,
            width: 950.0,
            height: 950.0,
        }
    );

    let out = normalize(&encode_png(&image)?, "1:1")?;
    assert_eq!(probe_dimensions(&out)?, (2048, 2048));
    // The band is gone: the top row of the output is content, not white.
    let decoded = decode_rgba(&out, &NormalizeConfig::default())?;
    assert!(decoded
        .enumerate_pixels()
        .filter(|(_, y, _)| *y == 0)
        .all(|(_, _, pixel)| pixel.0[0] < 231 || pixel.0[1] < 231 || pixel.0[2] < 231));
    Ok(())
}

#[test]
fn portrait_source_to_landscape_target() -> Result<()> {
    let image = photo(800, 1200);
    let plan = Normalizer::default()
        .plan(&image, &AspectRatio::parse("16:9")?)?
        .ok_or_else(|| anyhow::anyhow!("fixed ratio must produce a plan"))?;
    assert!((plan.crop.height - 450.0).abs() < 1e-6);
    assert!((plan.crop.y - 375.0).abs() < 1e-6);

    let out = normalize(&encode_png(&image)?, "16:9")?;
    assert_eq!(probe_dimensions(&out)?, (2048, 1152));
    Ok(())
}

#[test]
fn malformed_ratio_is_rejected() -> Result<()> {
    let png = encode_png(&photo(10, 10))?;
    assert!(matches!(
        normalize(&png, "abc:def"),
        Err(NormalizeError::UnsupportedRatio(_))
    ));
    Ok(())
}

#[test]
fn extreme_ratio_is_a_resource_limit() -> Result<()> {
    let png = encode_png(&photo(64, 32))?;
    assert!(matches!(
        normalize(&png, "64:1"),
        Err(NormalizeError::ResourceLimit(_))
    ));
    Ok(())
}

#[test]
fn undecodable_input_is_a_decode_error() {
    assert!(matches!(
        normalize(b"GIF89a?", "1:1"),
        Err(NormalizeError::Decode(_))
    ));
}

#[test]
fn second_pass_keeps_output_dimensions() -> Result<()> {
    let first = normalize(&encode_png(&photo(900, 700))?, "21:9")?;
    let second = normalize(&first, "21:9")?;
    let (w1, h1) = probe_dimensions(&first)?;
    let (w2, h2) = probe_dimensions(&second)?;
    assert_eq!((w1, h1), (2389, 1024));
    assert!(w1.abs_diff(w2) <= 1 && h1.abs_diff(h2) <= 1);
    Ok(())
}

#[test]
fn full_bleed_photo_has_no_insets_and_full_content_rect() -> Result<()> {
    let image = photo(640, 480);
    let plan = Normalizer::default()
        .plan(&image, &AspectRatio::parse("4:3")?)?
        .ok_or_else(|| anyhow::anyhow!("fixed ratio must produce a plan"))?;
    assert_eq!(plan.insets, BorderInsets::ZERO);
    assert_eq!(plan.crop, CropRect::full(640, 480));
    Ok(())
}

fn fixed_preset() -> impl Strategy<Value = &'static str> {
    prop::sample::select(PRESET_RATIOS[1..].to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn plans_conform_to_the_target_ratio(
        width in 8u32..400,
        height in 8u32..400,
        band in 0u32..40,
        raw in fixed_preset(),
    ) {
        let mut image = photo(width, height);
        for y in 0..band.min(height) {
            for x in 0..width {
                image.put_pixel(x, y, WHITE);
            }
        }
        let target = AspectRatio::parse(raw).unwrap();
        let ratio = target.value().unwrap();
        let plan = Normalizer::default().plan(&image, &target).unwrap().unwrap();

        prop_assert!(plan.crop.fits_within(width, height));
        let crop_error = (plan.crop.aspect() - ratio).abs() / ratio;
        prop_assert!(crop_error <= 0.01 + 1e-9);

        let output = plan.output;
        let output_error = (output.aspect() - ratio).abs() / ratio;
        prop_assert!(output_error <= 0.01);
        prop_assert!(output.shorter_side() >= 1024);
        prop_assert!(output.longer_side() == 2048 || output.shorter_side() == 1024);
    }
}

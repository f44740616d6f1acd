use adstudio_contracts::aspect::AspectRatio;
use adstudio_contracts::geometry::{BorderInsets, CropRect};

use crate::config::NormalizeConfig;

/// Insets that are worth stripping, or zero when every side is below the
/// significance cutoff.
pub fn significant_insets(
    width: u32,
    height: u32,
    insets: &BorderInsets,
    config: &NormalizeConfig,
) -> BorderInsets {
    let cutoff = config.border_significance;
    let exceeds = |inset: u32, extent: u32| extent > 0 && inset as f64 / extent as f64 > cutoff;
    let significant = exceeds(insets.top, height)
        || exceeds(insets.bottom, height)
        || exceeds(insets.left, width)
        || exceeds(insets.right, width);
    if significant {
        insets.clamped_to(width, height)
    } else {
        BorderInsets::ZERO
    }
}

/// Centered crop inside the content area that matches `target`.
///
/// `Auto` returns the full frame. When the content area is already within
/// `ratio_tolerance` of the target it is returned unchanged.
pub fn compute_crop_rect(
    width: u32,
    height: u32,
    insets: &BorderInsets,
    target: &AspectRatio,
    config: &NormalizeConfig,
) -> CropRect {
    let Some(target_ratio) = target.value() else {
        return CropRect::full(width, height);
    };

    let applied = significant_insets(width, height, insets, config);
    let mut rect = CropRect {
        x: applied.left as f64,
        y: applied.top as f64,
        width: (width - applied.left - applied.right) as f64,
        height: (height - applied.top - applied.bottom) as f64,
    };
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return rect;
    }

    let content_ratio = rect.aspect();
    let deviation = (content_ratio - target_ratio).abs() / target_ratio;
    if deviation <= config.ratio_tolerance {
        return rect;
    }

    if content_ratio > target_ratio {
        let new_width = rect.height * target_ratio;
        rect.x += (rect.width - new_width) / 2.0;
        rect.width = new_width;
    } else {
        let new_height = rect.width / target_ratio;
        rect.y += (rect.height - new_height) / 2.0;
        rect.height = new_height;
    }
    rect
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpscaleScale {
    X2,
    X4,
}

impl UpscaleScale {
    pub fn factor(self) -> u32 {
        match self {
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }

    pub fn from_factor(factor: u32) -> Option<Self> {
        match factor {
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpscaleDimensions {
    pub width: u32,
    pub height: u32,
    /// Rounded to two decimals.
    pub megapixels: f64,
}

pub fn upscale_dimensions(width: u32, height: u32, scale: UpscaleScale) -> UpscaleDimensions {
    let width = width.saturating_mul(scale.factor());
    let height = height.saturating_mul(scale.factor());
    let megapixels = (width as f64 * height as f64) / 1_000_000.0;
    UpscaleDimensions {
        width,
        height,
        megapixels: (megapixels * 100.0).round() / 100.0,
    }
}

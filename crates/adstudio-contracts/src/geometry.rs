use serde::{Deserialize, Serialize};

/// Thickness in pixels of the uniform light band found along each edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BorderInsets {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl BorderInsets {
    pub const ZERO: Self = Self {
        top: 0,
        bottom: 0,
        left: 0,
        right: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Zeroes any axis whose pair of insets would swallow the whole axis.
    pub fn clamped_to(self, width: u32, height: u32) -> Self {
        let mut out = self;
        if u64::from(out.top) + u64::from(out.bottom) >= u64::from(height) {
            out.top = 0;
            out.bottom = 0;
        }
        if u64::from(out.left) + u64::from(out.right) >= u64::from(width) {
            out.left = 0;
            out.right = 0;
        }
        out
    }
}

/// Source region to sample, in fractional pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f64,
            height: height as f64,
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        const EPS: f64 = 1e-6;
        self.x >= -EPS
            && self.y >= -EPS
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= width as f64 + EPS
            && self.y + self.height <= height as f64 + EPS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDimensions {
    pub width: u32,
    pub height: u32,
}

impl OutputDimensions {
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn longer_side(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn shorter_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

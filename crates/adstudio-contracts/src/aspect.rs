use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const AUTO_KEYWORD: &str = "Auto";

/// Ratios offered by the studio's ratio picker, in display order.
pub const PRESET_RATIOS: [&str; 7] = ["Auto", "1:1", "16:9", "9:16", "4:3", "3:4", "21:9"];

const LANDSCAPE_MIN_RATIO: f64 = 1.2;
const PORTRAIT_MAX_RATIO: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported aspect ratio '{input}': expected Auto or <W>:<H>, positive integers")]
pub struct UnsupportedRatioError {
    pub input: String,
}

/// Requested output frame: either a fixed `W:H` ratio or `Auto`, which keeps
/// whatever ratio the generator produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    Auto,
    Fixed { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl AspectRatio {
    pub fn fixed(width: u32, height: u32) -> Result<Self, UnsupportedRatioError> {
        if width == 0 || height == 0 {
            return Err(UnsupportedRatioError {
                input: format!("{width}:{height}"),
            });
        }
        Ok(Self::Fixed { width, height })
    }

    pub fn parse(raw: &str) -> Result<Self, UnsupportedRatioError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(AUTO_KEYWORD) {
            return Ok(Self::Auto);
        }
        let unsupported = || UnsupportedRatioError {
            input: raw.to_string(),
        };
        let (left, right) = trimmed.split_once(':').ok_or_else(unsupported)?;
        let width = parse_ratio_term(left).ok_or_else(unsupported)?;
        let height = parse_ratio_term(right).ok_or_else(unsupported)?;
        Ok(Self::Fixed { width, height })
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// `width / height`, or `None` for `Auto`.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Auto => None,
            Self::Fixed { width, height } => Some(*width as f64 / *height as f64),
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        let ratio = self.value()?;
        Some(if ratio >= LANDSCAPE_MIN_RATIO {
            Orientation::Landscape
        } else if ratio <= PORTRAIT_MAX_RATIO {
            Orientation::Portrait
        } else {
            Orientation::Square
        })
    }
}

fn parse_ratio_term(raw: &str) -> Option<u32> {
    let term = raw.trim();
    if term.is_empty() || !term.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    term.parse::<u32>().ok().filter(|value| *value > 0)
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str(AUTO_KEYWORD),
            Self::Fixed { width, height } => write!(f, "{width}:{height}"),
        }
    }
}

impl FromStr for AspectRatio {
    type Err = UnsupportedRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = UnsupportedRatioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

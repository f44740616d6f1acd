use adstudio_contracts::prompts::Language;
use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use crate::enrich::PromptAssistant;
use crate::generate::{ImageGenerator, InlineImage, ProviderCall};
use crate::raster::{encode_png, PNG_MIME};

/// Offline provider: a solid colour derived from the prompt and seed,
/// optionally framed by white bands the way real models sometimes pad
/// their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryrunGenerator {
    pub width: u32,
    pub height: u32,
    /// Thickness of white bands along the top and bottom edges.
    pub letterbox: Option<u32>,
}

impl Default for DryrunGenerator {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            letterbox: None,
        }
    }
}

impl DryrunGenerator {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("dryrun canvas must be at least 1x1, got {width}x{height}");
        }
        Ok(Self {
            width,
            height,
            letterbox: None,
        })
    }

    pub fn with_letterbox(mut self, band: u32) -> Self {
        self.letterbox = (band > 0).then_some(band);
        self
    }

    pub fn render(&self, call: &ProviderCall) -> RgbaImage {
        let fill = color_from_prompt(&call.composed_prompt, call.seed.unwrap_or_default());
        let band = self.letterbox.unwrap_or(0).min(self.height / 2);
        let height = self.height;
        RgbaImage::from_fn(self.width, height, |_, y| {
            if y < band || y >= height - band {
                Rgba([255, 255, 255, 255])
            } else {
                fill
            }
        })
    }
}

impl ImageGenerator for DryrunGenerator {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, call: &ProviderCall) -> Result<InlineImage> {
        let bytes = encode_png(&self.render(call))?;
        Ok(InlineImage::new(PNG_MIME, bytes))
    }
}

/// Offline prompt assistant: labels each reference by a digest of its bytes
/// and attributes those labels to "Image N" in the rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DryrunAssistant;

impl PromptAssistant for DryrunAssistant {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn describe_subjects(&self, references: &[InlineImage], language: Language) -> Result<String> {
        let noun = match language {
            Language::English => "subject",
            Language::Italian => "soggetto",
        };
        Ok(references
            .iter()
            .enumerate()
            .map(|(idx, image)| format!("{}. {noun} {}", idx + 1, &image.sha256_hex()[..8]))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn rewrite_with_references(
        &self,
        prompt: &str,
        subjects: &str,
        language: Language,
    ) -> Result<String> {
        let from = match language {
            Language::English => "from",
            Language::Italian => "da",
        };
        let attributed = subjects
            .lines()
            .filter_map(|line| line.trim().split_once(". "))
            .map(|(index, subject)| format!("{subject} {from} Image {index}"))
            .collect::<Vec<_>>();
        if attributed.is_empty() {
            return Ok(prompt.to_string());
        }
        Ok(format!("{prompt}: {}", attributed.join(", ")))
    }

    fn describe_style(&self, style: &InlineImage, language: Language) -> Result<String> {
        const PALETTES: [(&str, &str); 4] = [
            ("warm earthy", "calda e terrosa"),
            ("cool pastel", "pastello fredda"),
            ("high-contrast monochrome", "monocromatica ad alto contrasto"),
            ("saturated neon", "neon satura"),
        ];
        const LIGHTING: [(&str, &str); 3] = [
            ("soft diffused", "morbida e diffusa"),
            ("hard directional", "dura e direzionale"),
            ("golden-hour", "da ora d'oro"),
        ];
        let digest = Sha256::digest(&style.bytes);
        let palette = PALETTES[usize::from(digest[0]) % PALETTES.len()];
        let lighting = LIGHTING[usize::from(digest[1]) % LIGHTING.len()];
        Ok(match language {
            Language::English => format!("{} palette, {} lighting.", palette.0, lighting.0),
            Language::Italian => format!("Palette {}, luce {}.", palette.1, lighting.1),
        })
    }
}

fn color_from_prompt(prompt: &str, seed: u64) -> Rgba<u8> {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    // Keep at least one channel dark so the fill never reads as border.
    Rgba([digest[0], digest[1], digest[2] % 200, 255])
}

//! Text-model passes that run before image generation: rewriting a
//! multi-reference prompt so it names each image, and turning a style image
//! into a written style description. Both are optional; any failure falls
//! back to what the user supplied.

use adstudio_contracts::prompts::{accept_enriched_prompt, Language};
use anyhow::Result;

use crate::generate::InlineImage;

pub trait PromptAssistant: Send + Sync {
    fn name(&self) -> &str;

    /// Numbered list (`1. ...`, `2. ...`) naming the main subject of each
    /// reference, in order.
    fn describe_subjects(&self, references: &[InlineImage], language: Language)
        -> Result<String>;

    /// Rewrites `prompt` so subjects are attributed to "Image 1", "Image 2"...
    fn rewrite_with_references(
        &self,
        prompt: &str,
        subjects: &str,
        language: Language,
    ) -> Result<String>;

    /// Palette, lighting and mood of `style`, leaving its subjects out.
    fn describe_style(&self, style: &InlineImage, language: Language) -> Result<String>;
}

/// Result of an assistant pass. `value` is `None` whenever the pass was
/// skipped or its output discarded; `warning` says why when it was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assisted<T> {
    pub value: Option<T>,
    pub warning: Option<String>,
}

impl<T> Assisted<T> {
    fn skipped() -> Self {
        Self {
            value: None,
            warning: None,
        }
    }

    fn discarded(warning: String) -> Self {
        log::warn!("{warning}");
        Self {
            value: None,
            warning: Some(warning),
        }
    }
}

/// Subject analysis followed by a rewrite. Only runs for two or more
/// references; a rewrite that fails [`accept_enriched_prompt`] is dropped.
pub fn enrich_prompt(
    assistant: &dyn PromptAssistant,
    prompt: &str,
    references: &[InlineImage],
    language: Language,
) -> Assisted<String> {
    if references.len() <= 1 {
        return Assisted::skipped();
    }

    let rewrite = assistant
        .describe_subjects(references, language)
        .and_then(|subjects| {
            log::debug!("{} subjects: {}", assistant.name(), subjects.trim());
            assistant.rewrite_with_references(prompt, subjects.trim(), language)
        });
    match rewrite {
        Ok(candidate) => {
            let candidate = candidate.trim();
            if accept_enriched_prompt(candidate) {
                log::info!("prompt enriched with image references: {candidate}");
                Assisted {
                    value: Some(candidate.to_string()),
                    warning: None,
                }
            } else {
                Assisted::discarded(format!(
                    "prompt rewrite rejected ({} chars, no image names); using original prompt",
                    candidate.chars().count()
                ))
            }
        }
        Err(err) => Assisted::discarded(format!(
            "prompt enrichment failed: {err:#}; using original prompt"
        )),
    }
}

/// Style description for `style`; blank answers count as no description.
pub fn extract_style(
    assistant: &dyn PromptAssistant,
    style: &InlineImage,
    language: Language,
) -> Assisted<String> {
    match assistant.describe_style(style, language) {
        Ok(description) => {
            let description = description.trim();
            Assisted {
                value: (!description.is_empty()).then(|| description.to_string()),
                warning: None,
            }
        }
        Err(err) => Assisted::discarded(format!("style extraction failed: {err:#}")),
    }
}

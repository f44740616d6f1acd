use serde::{Deserialize, Serialize};

use super::guidance::{composition_guidance, Language};
use crate::aspect::AspectRatio;

/// Everything the composer needs to turn a user prompt into the text sent
/// to the image model.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub prompt: String,
    /// Assistant rewrite naming references as "Image N"; sent in place of
    /// `prompt` when present.
    pub enriched_prompt: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub reference_count: usize,
    pub style_description: Option<String>,
    pub has_structure_guide: bool,
    pub negative_prompt: Option<String>,
    pub language: Language,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            enriched_prompt: None,
            aspect_ratio,
            reference_count: 0,
            style_description: None,
            has_structure_guide: false,
            negative_prompt: None,
            language: Language::default(),
        }
    }
}

pub const MIN_ENRICHED_PROMPT_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Overlay,
    AddToScene,
    PlaceInContext,
}

pub fn compose_prompt(request: &PromptRequest) -> String {
    let language = request.language;
    let mut parts: Vec<String> =
        vec![composition_guidance(&request.aspect_ratio, language).to_string()];

    if request.reference_count > 1 {
        parts.push(combine_instruction(request.reference_count, language));
        if let Some(relationship) = detect_relationship(&request.prompt) {
            parts.push(relationship_instruction(relationship, language).to_string());
        }
    }

    if let Some(style) = request
        .style_description
        .as_deref()
        .map(str::trim)
        .filter(|style| !style.is_empty())
    {
        parts.push(match language {
            Language::English => format!("Style: {style}"),
            Language::Italian => format!("Stile: {style}"),
        });
    }

    if request.has_structure_guide {
        parts.push(structure_instruction(language).to_string());
    }

    let subject = request
        .enriched_prompt
        .as_deref()
        .filter(|enriched| !enriched.trim().is_empty())
        .unwrap_or(&request.prompt);
    let mut full = format!("{} {}", parts.join(" "), subject);
    if let Some(negative) = request
        .negative_prompt
        .as_deref()
        .map(str::trim)
        .filter(|negative| !negative.is_empty())
    {
        full.push_str(" --no ");
        full.push_str(negative);
    }
    full
}

/// Whether an assistant rewrite is usable: long enough and actually
/// referring to the images by name.
pub fn accept_enriched_prompt(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.chars().count() >= MIN_ENRICHED_PROMPT_CHARS
        && candidate.to_lowercase().contains("image")
}

/// Keyword match on the user prompt; first family wins.
pub fn detect_relationship(prompt: &str) -> Option<Relationship> {
    let lowered = prompt.to_lowercase();
    if ["sulla", "sul", "on the", "on "]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        return Some(Relationship::Overlay);
    }
    if ["con", "with"].iter().any(|needle| lowered.contains(needle)) {
        return Some(Relationship::AddToScene);
    }
    if [" in ", "dentro"].iter().any(|needle| lowered.contains(needle)) {
        return Some(Relationship::PlaceInContext);
    }
    None
}

/// Seeds are forwarded only when they are a plain run of digits.
pub fn parse_seed(raw: Option<&str>) -> Option<u64> {
    let seed = raw?.trim();
    if seed.is_empty() || !seed.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    seed.parse().ok()
}

fn combine_instruction(reference_count: usize, language: Language) -> String {
    let label = match language {
        Language::English => "Image",
        Language::Italian => "Immagine",
    };
    let list = (1..=reference_count)
        .map(|idx| format!("{label} {idx}"))
        .collect::<Vec<String>>()
        .join(", ");
    match language {
        Language::English => format!(
            "⚠️ COMBINE all elements from {list} into one coherent scene. Include the main subject from each image."
        ),
        Language::Italian => format!(
            "⚠️ COMBINA tutti gli elementi da {list} in una scena coerente. Include il soggetto principale di ogni immagine."
        ),
    }
}

fn relationship_instruction(relationship: Relationship, language: Language) -> &'static str {
    match (relationship, language) {
        (Relationship::Overlay, Language::English) => "Apply the element as texture/overlay.",
        (Relationship::Overlay, Language::Italian) => "Applica l'elemento come texture/overlay.",
        (Relationship::AddToScene, Language::English) => "Add the element to the scene.",
        (Relationship::AddToScene, Language::Italian) => "Aggiungi l'elemento nella scena.",
        (Relationship::PlaceInContext, Language::English) => "Place the element in the context.",
        (Relationship::PlaceInContext, Language::Italian) => "Posiziona l'elemento nel contesto.",
    }
}

fn structure_instruction(language: Language) -> &'static str {
    match language {
        Language::English => "🏗️ STRUCTURE: Last image is a structural guide. Maintain the same spatial composition, layout and geometry. Preserve positions, proportions and perspective.",
        Language::Italian => "🏗️ STRUTTURA: L'ultima immagine è una guida strutturale. Mantieni la stessa composizione spaziale, layout e geometria. Preserva posizioni, proporzioni e prospettiva.",
    }
}

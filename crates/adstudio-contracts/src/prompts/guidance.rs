use std::str::FromStr;

use crate::aspect::{AspectRatio, Orientation};

/// Language the prompt templates are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Italian,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Italian => "it",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "it" | "italian" | "italiano" => Ok(Self::Italian),
            other => Err(format!("unknown prompt language '{other}' (expected en or it)")),
        }
    }
}

/// Framing instruction prepended to every generation prompt so the model
/// fills the requested frame instead of letterboxing it.
pub fn composition_guidance(ratio: &AspectRatio, language: Language) -> &'static str {
    match (ratio.orientation(), language) {
        (None, Language::English) => {
            "⚠️ CRITICAL - MAINTAIN REFERENCE IMAGE ASPECT RATIO: Use the same aspect ratio as the uploaded reference image. FILL ENTIRE FRAME: NO white bars, NO empty borders! EXTEND scene edge-to-edge."
        }
        (None, Language::Italian) => {
            "⚠️ IMPORTANTE - MANTIENI LE PROPORZIONI DELL'IMMAGINE DI RIFERIMENTO: Usa le stesse proporzioni (aspect ratio) dell'immagine caricata. RIEMPI TUTTO IL FOTOGRAMMA: NO bande bianche, NO bordi vuoti! ESTENDI la scena da bordo a bordo."
        }
        (Some(Orientation::Landscape), Language::English) => {
            "⚠️ CRITICAL - FILL ENTIRE HORIZONTAL FRAME: NO white bars, NO empty borders, NO letterboxing! EXTEND scene EDGE-TO-EDGE horizontally. WIDE PANORAMIC composition occupying FULL width. Tight crop. Wall-to-wall. ZERO empty space on sides."
        }
        (Some(Orientation::Landscape), Language::Italian) => {
            "⚠️ IMPORTANTE - RIEMPI TUTTO IL FOTOGRAMMA ORIZZONTALE: NO bande bianche, NO bordi vuoti, NO letterboxing! ESTENDI la scena da BORDO A BORDO orizzontalmente. Composizione PANORAMICA AMPIA che occupa TUTTA la larghezza. Crop stretto. Wall-to-wall. Edge-to-edge. ZERO spazio vuoto ai lati."
        }
        (Some(Orientation::Portrait), Language::English) => {
            "⚠️ CRITICAL - FILL ENTIRE VERTICAL FRAME: NO white bars, NO empty borders, NO pillarboxing! EXTEND scene TOP-TO-BOTTOM vertically. TALL VERTICAL composition occupying FULL height. Tight crop. Edge-to-edge. ZERO empty space above/below."
        }
        (Some(Orientation::Portrait), Language::Italian) => {
            "⚠️ IMPORTANTE - RIEMPI TUTTO IL FOTOGRAMMA VERTICALE: NO bande bianche, NO bordi vuoti, NO pillarboxing! ESTENDI la scena da ALTO A BASSO verticalmente. Composizione VERTICALE ALTA che occupa TUTTA l'altezza. Crop stretto. Top-to-bottom. Edge-to-edge. ZERO spazio vuoto sopra/sotto."
        }
        (Some(Orientation::Square), Language::English) => {
            "⚠️ CRITICAL - FILL ENTIRE SQUARE FRAME: NO white bars, NO empty borders! EXTEND scene edge-to-edge in ALL directions. Tight crop. ZERO empty space."
        }
        (Some(Orientation::Square), Language::Italian) => {
            "⚠️ IMPORTANTE - RIEMPI TUTTO IL FOTOGRAMMA QUADRATO: NO bande bianche, NO bordi vuoti! ESTENDI la scena da bordo a bordo in TUTTE le direzioni. Tight crop. Edge-to-edge. ZERO spazio vuoto."
        }
    }
}

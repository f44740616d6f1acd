mod compose;
mod guidance;

pub use compose::{
    accept_enriched_prompt, compose_prompt, detect_relationship, parse_seed, PromptRequest,
    Relationship, MIN_ENRICHED_PROMPT_CHARS,
};
pub use guidance::{composition_guidance, Language};

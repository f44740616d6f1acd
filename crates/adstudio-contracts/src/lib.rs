//! Data contracts shared by the adstudio engine and CLI: aspect ratios,
//! normalization geometry, prompt templates, event logs, upscale quota and
//! run receipts.

pub mod aspect;
pub mod events;
pub mod geometry;
pub mod prompts;
pub mod runs;
pub mod upscale;

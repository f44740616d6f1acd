use adstudio_contracts::aspect::AspectRatio;
use adstudio_contracts::events::{EventPayload, EventWriter};
use adstudio_contracts::prompts::{compose_prompt, parse_seed, Language, PromptRequest};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::enrich::{enrich_prompt, extract_style, PromptAssistant};
use crate::error::NormalizeError;
use crate::pipeline::{NormalizeOutcome, Normalizer};
use crate::raster::{decode_data_url, encode_data_url, guess_mime};
use crate::retry::RetryPolicy;

/// An encoded image travelling to or from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Wraps raw file contents, sniffing the MIME type.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(guess_mime(&bytes), bytes)
    }

    pub fn from_data_url(raw: &str) -> Result<Self, NormalizeError> {
        let decoded = decode_data_url(raw)?;
        Ok(Self {
            mime_type: decoded.mime_type,
            bytes: decoded.bytes,
        })
    }

    pub fn to_data_url(&self) -> String {
        encode_data_url(&self.mime_type, &self.bytes)
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    /// `"Auto"` or `"W:H"`; anything else is treated as Auto.
    pub aspect_ratio: String,
    pub references: Vec<InlineImage>,
    /// Written style; takes precedence over `style_image`.
    pub style_description: Option<String>,
    /// Image whose look is described by the assistant. Never sent to the
    /// image provider.
    pub style_image: Option<InlineImage>,
    pub structure_guide: Option<InlineImage>,
    pub negative_prompt: Option<String>,
    pub seed: Option<String>,
    pub language: Language,
}

/// What a provider receives: reference images first, then the structure
/// guide, then the composed prompt text.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub composed_prompt: String,
    pub images: Vec<InlineImage>,
    pub seed: Option<u64>,
    pub aspect_ratio: AspectRatio,
}

pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, call: &ProviderCall) -> Result<InlineImage>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    pub image_data_url: String,
    pub prompt: String,
    pub aspect_ratio: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    /// Pre-upscale image, set once the image has been upscaled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_image_data_url: Option<String>,
}

/// One finished generation plus the bookkeeping callers persist in receipts.
#[derive(Debug, Clone)]
pub struct Generation {
    pub image: GeneratedImage,
    pub composed_prompt: String,
    /// Assistant rewrite of the user prompt, when one was accepted.
    pub enriched_prompt: Option<String>,
    pub provider: String,
    pub provider_digest: String,
    pub outcome: NormalizeOutcome,
    pub warnings: Vec<String>,
}

impl Generation {
    /// Receipt-ready summary of what the normalizer did.
    pub fn normalization_summary(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(
            "provider_sha256".to_string(),
            Value::String(self.provider_digest.clone()),
        );
        match &self.outcome {
            NormalizeOutcome::Bypassed => {
                out.insert("status".to_string(), json!("bypassed"));
            }
            NormalizeOutcome::Normalized(plan) => {
                out.insert("status".to_string(), json!("normalized"));
                out.insert(
                    "plan".to_string(),
                    serde_json::to_value(plan).unwrap_or(Value::Null),
                );
            }
            NormalizeOutcome::FellBack(reason) => {
                out.insert("status".to_string(), json!("fell_back"));
                out.insert("error".to_string(), json!(reason));
            }
        }
        out
    }
}

pub struct GenerationService<G: ImageGenerator> {
    generator: G,
    assistant: Box<dyn PromptAssistant>,
    normalizer: Normalizer,
    retry: RetryPolicy,
    events: EventWriter,
}

impl<G: ImageGenerator> GenerationService<G> {
    pub fn new(
        generator: G,
        assistant: Box<dyn PromptAssistant>,
        normalizer: Normalizer,
        retry: RetryPolicy,
        events: EventWriter,
    ) -> Self {
        Self {
            generator,
            assistant,
            normalizer,
            retry,
            events,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Enrich, compose, call the provider with retries, then normalize
    /// best-effort.
    pub fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let mut warnings = Vec::new();
        let aspect_ratio = match AspectRatio::parse(&request.aspect_ratio) {
            Ok(ratio) => ratio,
            Err(err) => {
                warnings.push(format!("{err}; generating with Auto"));
                AspectRatio::Auto
            }
        };

        let enriched = enrich_prompt(
            self.assistant.as_ref(),
            &request.prompt,
            &request.references,
            request.language,
        );
        warnings.extend(enriched.warning);
        if request.references.len() > 1 {
            self.emit(
                "prompt_enriched",
                json!({
                    "assistant": self.assistant.name(),
                    "rewritten": enriched.value.is_some(),
                }),
            );
        }
        let style_description = match (&request.style_description, &request.style_image) {
            (Some(style), _) => Some(style.clone()),
            (None, Some(image)) => {
                let style = extract_style(self.assistant.as_ref(), image, request.language);
                warnings.extend(style.warning);
                style.value
            }
            (None, None) => None,
        };

        let call = self.provider_call(
            request,
            aspect_ratio,
            enriched.value.clone(),
            style_description,
        );
        if request.seed.as_deref().is_some_and(|raw| !raw.trim().is_empty()) && call.seed.is_none()
        {
            warnings.push("seed ignored: only digits are accepted".to_string());
        }

        self.emit(
            "generation_started",
            json!({
                "provider": self.generator.name(),
                "aspect_ratio": aspect_ratio.to_string(),
                "reference_count": request.references.len(),
                "has_structure_guide": request.structure_guide.is_some(),
                "prompt_chars": call.composed_prompt.chars().count(),
            }),
        );

        let provider_image = self
            .retry
            .run(
                |_| self.generator.generate(&call),
                |attempt, delay, err| {
                    self.emit(
                        "generation_retry",
                        json!({
                            "attempt": attempt + 1,
                            "max_attempts": self.retry.max_attempts,
                            "delay_ms": delay.as_millis() as u64,
                            "error": format!("{err:#}"),
                        }),
                    );
                },
            )
            .with_context(|| format!("{} generation failed", self.generator.name()))?;
        let provider_digest = provider_image.sha256_hex();

        let (image_data_url, outcome) = if aspect_ratio.is_auto() {
            (provider_image.to_data_url(), NormalizeOutcome::Bypassed)
        } else {
            let best = self
                .normalizer
                .normalize_or_original(&provider_image.bytes, &aspect_ratio.to_string());
            match &best.outcome {
                NormalizeOutcome::Normalized(plan) => {
                    self.emit(
                        "image_normalized",
                        json!({
                            "source": [plan.source_width, plan.source_height],
                            "output": [plan.output.width, plan.output.height],
                            "insets": plan.insets_applied,
                        }),
                    );
                    (encode_data_url("image/png", &best.bytes), best.outcome)
                }
                NormalizeOutcome::FellBack(reason) => {
                    warnings.push(format!("normalization skipped: {reason}"));
                    self.emit("normalization_failed", json!({ "error": reason }));
                    (provider_image.to_data_url(), best.outcome)
                }
                NormalizeOutcome::Bypassed => (provider_image.to_data_url(), best.outcome),
            }
        };

        let image = GeneratedImage {
            id: uuid::Uuid::new_v4().to_string(),
            image_data_url,
            prompt: request.prompt.clone(),
            aspect_ratio: aspect_ratio.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            negative_prompt: request.negative_prompt.clone(),
            seed: request.seed.clone(),
            original_image_data_url: None,
        };
        self.emit(
            "generation_finished",
            json!({
                "image_id": image.id,
                "provider": self.generator.name(),
                "warnings": warnings,
            }),
        );

        Ok(Generation {
            image,
            composed_prompt: call.composed_prompt,
            enriched_prompt: enriched.value,
            provider: self.generator.name().to_string(),
            provider_digest,
            outcome,
            warnings,
        })
    }

    /// `count` independent generations of the same request. The first error
    /// aborts the batch.
    pub fn generate_batch(
        &self,
        request: &GenerationRequest,
        count: usize,
    ) -> Result<Vec<Generation>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..count)
                .map(|_| scope.spawn(|| self.generate(request)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| anyhow::anyhow!("generation worker panicked"))?
                })
                .collect()
        })
    }

    fn provider_call(
        &self,
        request: &GenerationRequest,
        aspect_ratio: AspectRatio,
        enriched_prompt: Option<String>,
        style_description: Option<String>,
    ) -> ProviderCall {
        let prompt_request = PromptRequest {
            prompt: request.prompt.clone(),
            enriched_prompt,
            aspect_ratio,
            reference_count: request.references.len(),
            style_description,
            has_structure_guide: request.structure_guide.is_some(),
            negative_prompt: request.negative_prompt.clone(),
            language: request.language,
        };
        let mut images = request.references.clone();
        images.extend(request.structure_guide.iter().cloned());
        ProviderCall {
            composed_prompt: compose_prompt(&prompt_request),
            images,
            seed: parse_seed(request.seed.as_deref()),
            aspect_ratio,
        }
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Err(err) = self.events.emit(event_type, payload) {
            log::warn!("failed to record {event_type} event: {err:#}");
        }
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    pub negative_prompt: Option<String>,
    pub seed: Option<String>,
    #[serde(default)]
    pub reference_count: usize,
    #[serde(default = "default_language")]
    pub language: String,
    pub provider: String,
}

pub struct ReceiptArtifacts<'a> {
    pub image_path: &'a Path,
    pub receipt_path: &'a Path,
}

/// Receipt for one generated image: what was asked, what was sent, and what
/// the normalizer did to the provider output.
pub fn build_receipt(
    request: &ImageRequest,
    composed_prompt: &str,
    normalization: &Map<String, Value>,
    warnings: &[String],
    artifacts: ReceiptArtifacts<'_>,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert(
        "request".to_string(),
        sanitize_payload(&serde_json::to_value(request).unwrap_or(Value::Null)),
    );
    root.insert(
        "composed_prompt".to_string(),
        Value::String(composed_prompt.to_string()),
    );
    root.insert(
        "normalization".to_string(),
        sanitize_payload(&Value::Object(normalization.clone())),
    );
    root.insert(
        "warnings".to_string(),
        Value::Array(warnings.iter().cloned().map(Value::String).collect()),
    );

    let mut paths = Map::new();
    paths.insert(
        "image_path".to_string(),
        Value::String(artifacts.image_path.to_string_lossy().to_string()),
    );
    paths.insert(
        "receipt_path".to_string(),
        Value::String(artifacts.receipt_path.to_string_lossy().to_string()),
    );
    root.insert("artifacts".to_string(), Value::Object(paths));
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(rows) => Value::Array(rows.iter().map(sanitize_payload).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, row) in map {
                let lowered = key.to_ascii_lowercase();
                if lowered == "data" || lowered.ends_with("data_url") {
                    out.insert(key.clone(), Value::String("<omitted>".to_string()));
                    continue;
                }
                out.insert(key.clone(), sanitize_payload(row));
            }
            Value::Object(out)
        }
    }
}

fn default_aspect_ratio() -> String {
    "Auto".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

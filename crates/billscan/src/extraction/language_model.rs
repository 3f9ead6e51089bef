//! Language-model field extraction over an Ollama-compatible API.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::ExtractionError;
use crate::extraction::fields::FieldDefinition;

/// Confidence assigned to every value the model returns.
pub const LANGUAGE_MODEL_CONFIDENCE: u32 = 92;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Values keyed by field key. `None` means the model reported the field absent.
pub type ModelValues = HashMap<String, Option<String>>;

#[async_trait]
pub trait LanguageModelExtractor: Send + Sync {
    async fn extract_fields(
        &self,
        text: &str,
        fields: &[&'static FieldDefinition],
    ) -> Result<ModelValues, ExtractionError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaExtractor {
    client: Client,
    endpoint: String,
    model: String,
    max_prompt_chars: usize,
}

impl OllamaExtractor {
    pub fn new(config: &LlmConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(Duration::from_secs(config.timeout_secs)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_prompt_chars: config.max_prompt_chars,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModelExtractor for OllamaExtractor {
    async fn extract_fields(
        &self,
        text: &str,
        fields: &[&'static FieldDefinition],
    ) -> Result<ModelValues, ExtractionError> {
        let prompt = build_prompt(text, fields, self.max_prompt_chars);
        let url = format!("{}/api/generate", self.endpoint);
        debug!(
            "Requesting {} fields from model '{}' ({} prompt chars)",
            fields.len(),
            self.model,
            prompt.chars().count()
        );

        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractionError::Status(response.status().as_u16()));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        parse_model_output(&payload.response)
    }
}

/// Prompt listing `key: label` pairs and the leading part of `text`.
pub fn build_prompt(text: &str, fields: &[&FieldDefinition], max_chars: usize) -> String {
    let labels: BTreeMap<&str, &str> = fields.iter().map(|f| (f.key, f.label)).collect();
    let labels = serde_json::to_string_pretty(&labels).unwrap_or_else(|_| "{}".to_string());
    let excerpt: String = text.chars().take(max_chars).collect();

    format!(
        "Extract the following fields from this billing document text. \
         Return ONLY a valid JSON object with field keys and their extracted values. \
         If a field is not found, set its value to null.\n\n\
         Fields to extract:\n{labels}\n\n\
         Document text:\n---\n{excerpt}\n---\n\n\
         Return ONLY valid JSON like: {{\"invoice_number\": \"INV-001\", \"date\": \"2024-01-15\", ...}}"
    )
}

/// Reads the model's reply as a JSON object of field values.
///
/// Non-string values are kept as their JSON text. Null and blank strings
/// count as absent.
pub fn parse_model_output(raw: &str) -> Result<ModelValues, ExtractionError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| ExtractionError::MalformedResponse(format!("not JSON: {}", e)))?;

    let Value::Object(map) = value else {
        return Err(ExtractionError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => None,
                Value::String(s) if s.trim().is_empty() => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            };
            (key, value)
        })
        .collect())
}

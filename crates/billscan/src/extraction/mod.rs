//! Field extraction from recognized text.
//!
//! A configured language model is tried first. Any failure there falls
//! back to the compiled pattern registry for the whole request, so a
//! caller always gets one entry per known requested field.

pub mod fields;
pub mod language_model;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::LlmConfig;
use crate::error::ExtractionError;
use crate::sanitize::preview;

pub use fields::{FieldDefinition, FIELD_DEFINITIONS};
pub use language_model::{LanguageModelExtractor, OllamaExtractor, LANGUAGE_MODEL_CONFIDENCE};
pub use registry::{CompiledField, PatternRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Regex,
    Llm,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Regex => "regex",
            ExtractionMethod::Llm => "llm",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ExtractionMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ExtractionMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "regex" => Ok(ExtractionMethod::Regex),
            "llm" => Ok(ExtractionMethod::Llm),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// One extracted value. `confidence` is 0 exactly when `value` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub key: String,
    pub label: String,
    pub value: Option<String>,
    pub confidence: u32,
    pub method: ExtractionMethod,
}

/// A field offered to callers for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub key: &'static str,
    pub label: &'static str,
}

/// Every built-in field, in definition order.
pub fn available_fields() -> Vec<FieldInfo> {
    FIELD_DEFINITIONS
        .iter()
        .map(|f| FieldInfo {
            key: f.key,
            label: f.label,
        })
        .collect()
}

pub struct FieldExtractor {
    registry: Arc<PatternRegistry>,
    language_model: Option<Arc<dyn LanguageModelExtractor>>,
}

impl FieldExtractor {
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self {
            registry,
            language_model: None,
        }
    }

    pub fn with_language_model(mut self, model: Arc<dyn LanguageModelExtractor>) -> Self {
        self.language_model = Some(model);
        self
    }

    /// Built-in patterns plus the Ollama extractor when it is enabled.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ExtractionError> {
        let extractor = Self::new(Arc::new(PatternRegistry::builtin()?));
        if config.enabled {
            log::info!(
                "Language model extraction enabled ({} at {})",
                config.model,
                config.endpoint
            );
            Ok(extractor.with_language_model(Arc::new(OllamaExtractor::new(config)?)))
        } else {
            Ok(extractor)
        }
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn detect_fields(&self, text: &str) -> Vec<&'static str> {
        self.registry.detect_fields(text)
    }

    /// Extracts the requested fields from `text`.
    ///
    /// Unknown keys are dropped. The result follows request order.
    #[instrument(name = "extraction.extract", skip_all, fields(requested = keys.len()))]
    pub async fn extract<S: AsRef<str> + Sync>(
        &self,
        text: &str,
        keys: &[S],
    ) -> Vec<ExtractedField> {
        let requested: Vec<&'static FieldDefinition> = self
            .registry
            .resolve(keys)
            .into_iter()
            .map(|f| f.definition)
            .collect();

        if requested.is_empty() {
            return Vec::new();
        }

        if let Some(model) = &self.language_model {
            match model.extract_fields(text, &requested).await {
                Ok(mut values) => {
                    tracing::debug!(fields = requested.len(), "Language model extraction succeeded");
                    return requested
                        .iter()
                        .map(|def| {
                            let value = values.remove(def.key).flatten();
                            let confidence = if value.is_some() {
                                LANGUAGE_MODEL_CONFIDENCE
                            } else {
                                0
                            };
                            ExtractedField {
                                key: def.key.to_string(),
                                label: def.label.to_string(),
                                value,
                                confidence,
                                method: ExtractionMethod::Llm,
                            }
                        })
                        .collect();
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        text = %preview(text, 40),
                        "Language model extraction failed, using patterns"
                    );
                }
            }
        }

        self.registry.extract(text, keys)
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Defaults to `~/.billscan/data/billscan.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_export_directory")]
    pub export_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_export_directory() -> String {
    "exports".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            upload_directory: default_upload_directory(),
            export_directory: default_export_directory(),
            worker_count: default_worker_count(),
            ocr: OcrConfig::default(),
            llm: LlmConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Native text layers with this many characters or fewer are
    /// treated as scanned.
    #[serde(default = "default_native_text_min_chars")]
    pub native_text_min_chars: usize,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_native_text_min_chars() -> usize {
    50
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dpi: default_dpi(),
            native_text_min_chars: default_native_text_min_chars(),
        }
    }
}

/// Language-model extractor settings (Ollama-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Only this many leading characters of the text are sent.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "mistral".to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_max_prompt_chars() -> usize {
    3000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Capacity of the job event channel before slow receivers lag.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    100
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Configured database path, or the per-user default.
    pub fn resolve_database_path(&self) -> Option<std::path::PathBuf> {
        self.database_path
            .as_ref()
            .map(std::path::PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}

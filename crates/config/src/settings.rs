// Application settings
// Loaded from ~/.config/iter8/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// LLM call settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat-completions model identifier
    pub model: String,

    /// Temperature for JSON replies
    pub temperature: f32,

    /// Temperature for free-text replies
    pub text_temperature: f32,

    pub max_tokens: u32,

    /// Chat-completions URL (OpenAI-compatible)
    pub endpoint: String,

    /// Per-request timeout; unset keeps the HTTP client's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            text_temperature: 0.5,
            max_tokens: 1000,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: None,
        }
    }
}

impl LlmSettings {
    /// Get the effective model (user-specified or default)
    pub fn effective_model(&self) -> &str {
        if self.model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            &self.model
        }
    }

    pub fn effective_endpoint(&self) -> &str {
        if self.endpoint.trim().is_empty() {
            DEFAULT_ENDPOINT
        } else {
            &self.endpoint
        }
    }
}

/// Enrichment pipeline defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Concurrent LLM calls
    pub workers: usize,

    /// Completed rows per sheet write
    pub update_batch_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            update_batch_size: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    /// Google credentials file; None = ~/.config/iter8/google_auth.json
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub pipeline: PipelineSettings,
    pub sheets: SheetsSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("iter8");
        config_dir.join("settings.json")
    }

    /// Load from an explicit path. Missing or unreadable files give defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }
}

//! Enrichment job files.
//!
//! ```toml
//! prompt = """
//! Translate the English word into Chinese. Reply as {"ch": "..."}.
//! Word: {en}
//! """
//! skip_when_filled = ["ch"]
//! workers = 4
//! ```
//!
//! `{record}` expands to the whole row as JSON, `{column}` to one field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichJob {
    /// Prompt template sent once per row
    pub prompt: String,

    /// Rows where all of these columns already hold a value are skipped
    #[serde(default)]
    pub skip_when_filled: Vec<String>,

    /// Overrides `pipeline.workers`
    #[serde(default)]
    pub workers: Option<usize>,

    /// Overrides `pipeline.update_batch_size`
    #[serde(default)]
    pub update_batch_size: Option<usize>,
}

impl EnrichJob {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Invalid(message) => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let job: EnrichJob = toml::from_str(contents).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        job.validate()?;
        Ok(job)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt.trim().is_empty() {
            return Err(ConfigError::Invalid("prompt must not be empty".into()));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.update_batch_size == Some(0) {
            return Err(ConfigError::Invalid("update_batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Fill the template from one row.
    ///
    /// Only the template is scanned, so braces inside substituted values are
    /// never expanded. Placeholders naming no column are left as written,
    /// so literal JSON braces in the prompt survive.
    pub fn render_prompt(&self, record: &serde_json::Map<String, serde_json::Value>) -> String {
        let mut out = String::with_capacity(self.prompt.len());
        let mut rest = self.prompt.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let expanded = after
                .find('}')
                .and_then(|close| placeholder_text(&after[..close], record).map(|text| (text, close)));
            match expanded {
                Some((text, close)) => {
                    out.push_str(&text);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Replacement for `{name}`, if `name` is a placeholder.
fn placeholder_text(name: &str, record: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if name == "record" {
        return Some(serde_json::to_string_pretty(record).unwrap_or_default());
    }
    record.get(name).map(|value| match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

// LLM configuration and secrets management
//
// API keys are looked up in:
// 1. System keychain (with the `keychain` feature)
// 2. Environment variables (CI/headless)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::settings::LlmSettings;

/// Service name for keychain storage
#[cfg_attr(not(feature = "keychain"), allow(dead_code))]
const KEYCHAIN_SERVICE: &str = "iter8";

#[cfg_attr(not(feature = "keychain"), allow(dead_code))]
const KEYCHAIN_ACCOUNT: &str = "llm/openai";

/// Environment variables checked for the OpenAI key, in order.
pub const KEY_ENV_VARS: [&str; 2] = ["OPENAI_API_KEY", "ITER8_OPENAI_KEY"];

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from environment variable
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Get the OpenAI API key: keychain, then `OPENAI_API_KEY`, then
/// `ITER8_OPENAI_KEY`.
pub fn get_api_key() -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    lookup_env(&KEY_ENV_VARS)
}

/// First non-empty variable among `names`.
fn lookup_env(names: &[&str]) -> KeyLookup {
    for name in names {
        if let Ok(key) = env::var(name) {
            if !key.is_empty() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Environment,
                };
            }
        }
    }

    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

/// The effective LLM configuration, resolved from settings plus secrets.
#[derive(Clone)]
pub struct ResolvedLlmConfig {
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub text_temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: Option<u64>,
    pub api_key: Option<String>,
    pub key_source: KeySource,
}

impl ResolvedLlmConfig {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let lookup = get_api_key();
        Self::with_key(settings, lookup)
    }

    pub fn with_key(settings: &LlmSettings, lookup: KeyLookup) -> Self {
        Self {
            model: settings.effective_model().to_string(),
            endpoint: settings.effective_endpoint().to_string(),
            temperature: settings.temperature,
            text_temperature: settings.text_temperature,
            max_tokens: settings.max_tokens,
            timeout_secs: settings.timeout_secs,
            api_key: lookup.key,
            key_source: lookup.source,
        }
    }

    /// Human-readable reason the config can't be used, if any.
    pub fn blocking_reason(&self) -> Option<String> {
        if self.api_key.is_none() {
            Some(format!(
                "No API key found. Set via keychain or {}",
                KEY_ENV_VARS.join(" / ")
            ))
        } else {
            None
        }
    }
}

// Keys stay out of Debug output.
impl std::fmt::Debug for ResolvedLlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedLlmConfig")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("text_temperature", &self.text_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("key_source", &self.key_source)
            .finish()
    }
}

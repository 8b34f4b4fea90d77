// LLM client for row enrichment
//
// Sends one prompt per call to an OpenAI-compatible chat-completions
// endpoint and returns either a parsed JSON object or plain text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use iter8_config::secrets::ResolvedLlmConfig;

pub const JSON_SYSTEM_PROMPT: &str = "You are a helpful assistant that always returns valid JSON.";
pub const TEXT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// A JSON reply object.
pub type JsonReply = Map<String, Value>;

/// Error from an LLM call
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API key not configured")]
    MissingKey,
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    /// Provider returned an unexpected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// Blocking chat-completions client. Cheap to clone; share one across
/// worker threads.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    text_temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    /// Build a client from resolved settings. Fails without an API key.
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingKey)?;
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(format!("iter8/{}", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            text_temperature: config.text_temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Ask for a JSON object. The prompt should describe the shape wanted.
    pub fn complete_json(&self, prompt: &str) -> Result<JsonReply, LlmError> {
        let content = self.chat(JSON_SYSTEM_PROMPT, prompt, self.temperature, true)?;
        parse_json_reply(&content)
    }

    /// Ask for free text.
    pub fn complete_text(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(TEXT_SYSTEM_PROMPT, prompt, self.text_temperature, false)
    }

    /// [`complete_json`](Self::complete_json) that never fails: errors come
    /// back as `{"error": "...", "success": false}`. Check with
    /// [`is_error_reply`].
    pub fn llm_json(&self, prompt: &str) -> JsonReply {
        self.complete_json(prompt).unwrap_or_else(|e| {
            log::warn!("Error in llm_json: {}", e);
            error_reply(&e.to_string())
        })
    }

    /// [`complete_text`](Self::complete_text) that never fails: errors come
    /// back as `"Error generating response: ..."`.
    pub fn llm_text(&self, prompt: &str) -> String {
        self.complete_text(prompt).unwrap_or_else(|e| {
            log::warn!("Error in llm_text: {}", e);
            format!("Error generating response: {}", e)
        })
    }

    fn chat(&self, system: &str, prompt: &str, temperature: f32, json: bool) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature,
            max_tokens: self.max_tokens,
            response_format: json.then_some(ResponseFormat { format_type: "json_object" }),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))
    }
}

/// `{"error": message, "success": false}`
pub fn error_reply(message: &str) -> JsonReply {
    let mut map = Map::new();
    map.insert("error".into(), Value::String(message.to_string()));
    map.insert("success".into(), Value::Bool(false));
    map
}

/// True for the error shape produced by [`LlmClient::llm_json`].
pub fn is_error_reply(reply: &JsonReply) -> bool {
    reply.get("success") == Some(&Value::Bool(false)) && reply.get("error").is_some_and(Value::is_string)
}

/// Parse model output as a JSON object, tolerating text around the braces.
fn parse_json_reply(content: &str) -> Result<JsonReply, LlmError> {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            let extracted = content
                .find('{')
                .zip(content.rfind('}'))
                .filter(|(start, end)| start < end)
                .and_then(|(start, end)| serde_json::from_str(&content[start..=end]).ok());
            match extracted {
                Some(v) => {
                    log::debug!("Response contained extra text around JSON");
                    v
                }
                None => {
                    return Err(LlmError::Parse(format!(
                        "Failed to parse JSON: {}. Raw: {}",
                        e, content
                    )))
                }
            }
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(LlmError::InvalidResponse(format!("expected a JSON object, got {}", other))),
    }
}

//! Chat-completions client used by the enrichment pipeline.
//!
//! One blocking request per prompt. JSON mode asks the model for a JSON
//! object and parses it; text mode returns the reply as-is.

mod client;

pub use client::{
    error_reply, is_error_reply, JsonReply, LlmClient, LlmError, JSON_SYSTEM_PROMPT, TEXT_SYSTEM_PROMPT,
};

use serde::{Deserialize, Serialize};

use crate::chat::ChatReply;
use crate::responses::TROUBLE_MESSAGE;

pub const PROCESSING_ERROR: &str = "processing_error";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn processing_error() -> Self {
        Self {
            response: TROUBLE_MESSAGE.to_string(),
            suggestions: None,
            urgent: None,
            error: Some(PROCESSING_ERROR.to_string()),
        }
    }
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            suggestions: reply.suggestions,
            urgent: reply.urgent.then_some(true),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}

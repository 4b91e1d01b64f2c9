use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatMessage;

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
}

// GraphQL-style data/errors envelope
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<ErrorEntry>>,
}

impl QueryResponse {
    pub fn success(text: String) -> Self {
        Self {
            data: Some(text),
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: Some(vec![ErrorEntry {
                message: message.into(),
            }]),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Absent when the message was answered without starting a session.
    pub session_id: Option<Uuid>,
    pub reply: ChatMessage,
    pub transcript_len: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

pub mod dispatcher;
pub mod remote;
pub mod sessions;

use serde::{Deserialize, Serialize};

pub use dispatcher::{ClientError, Dispatcher, LocalQueryClient, QueryClient};
pub use remote::HttpQueryClient;
pub use sessions::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "bot")]
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Bot,
            text: text.into(),
        }
    }
}

/// Append-only chat log; insertion order is display order.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

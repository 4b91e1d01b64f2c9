use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use thiserror::Error;

use crate::chat::{ChatMessage, Transcript};
use crate::query::QueryHandler;

pub const EMPTY_QUERY_NOTICE: &str = "Query cannot be empty.";
pub const NO_RESPONSE_TEXT: &str = "No response from AI";
const ERROR_PREFIX: &str = "Error fetching data: ";
const UNKNOWN_ERROR_TEXT: &str = "Error fetching data.";

/// Failure of the remote query call, as seen from the chat front end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Error from Bedrock: {0}")]
    Remote(String),
    #[error("{0}")]
    Unknown(String),
}

impl ClientError {
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            ClientError::Unknown(UNKNOWN_ERROR_TEXT.to_string())
        } else {
            ClientError::Unknown(message)
        }
    }
}

/// Typed boundary between the chat front end and the query operation.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<Option<String>, ClientError>;
}

/// Calls a query handler living in the same process.
pub struct LocalQueryClient {
    handler: Arc<QueryHandler>,
}

impl LocalQueryClient {
    pub fn new(handler: Arc<QueryHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl QueryClient for LocalQueryClient {
    async fn query(&self, prompt: &str) -> Result<Option<String>, ClientError> {
        self.handler
            .answer_query(prompt)
            .await
            .map(Some)
            .map_err(|e| ClientError::Remote(e.client_message()))
    }
}

/// Owns one chat session's transcript and turns submissions into bot messages.
pub struct Dispatcher {
    client: Arc<dyn QueryClient>,
    transcript: Transcript,
    echo_user: bool,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn QueryClient>) -> Self {
        Self {
            client,
            transcript: Transcript::new(),
            echo_user: false,
        }
    }

    pub fn with_user_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Handles one raw input and returns the bot message it produced.
    pub async fn submit(&mut self, raw_input: &str) -> &ChatMessage {
        let query = raw_input.trim();
        if query.is_empty() {
            return self.transcript.append(ChatMessage::bot(EMPTY_QUERY_NOTICE));
        }

        if self.echo_user {
            self.transcript.append(ChatMessage::user(query));
        }

        let text = match self.client.query(query).await {
            Ok(Some(answer)) => answer,
            Ok(None) => NO_RESPONSE_TEXT.to_string(),
            Err(e) => {
                warn!("Query failed: {}", e);
                format!("{}{}", ERROR_PREFIX, e)
            }
        };

        info!("Transcript now holds {} messages", self.transcript.len() + 1);
        self.transcript.append(ChatMessage::bot(text))
    }
}

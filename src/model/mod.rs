pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

pub use types::{RetrievalRequest, RetrieveAndGenerateBody, RetrieveAndGenerateResponse};

#[derive(Error, Debug)]
pub enum KnowledgeBaseError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("status error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl KnowledgeBaseError {
    /// The most specific message the service gave us, for display to the caller.
    pub fn upstream_message(&self) -> String {
        match self {
            KnowledgeBaseError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// The external retrieve-and-generate capability.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn retrieve_and_generate(
        &self,
        request: &RetrievalRequest,
    ) -> Result<RetrieveAndGenerateResponse, KnowledgeBaseError>;
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

fn service_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(ServiceErrorBody { message: Some(m) }) if !m.is_empty() => m,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}

// A wrapper for the Bedrock agent runtime RetrieveAndGenerate API
pub struct BedrockKnowledgeBase {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl BedrockKnowledgeBase {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, KnowledgeBaseError> {
        info!("Using knowledge base endpoint at: {}", endpoint);

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl KnowledgeBase for BedrockKnowledgeBase {
    async fn retrieve_and_generate(
        &self,
        request: &RetrievalRequest,
    ) -> Result<RetrieveAndGenerateResponse, KnowledgeBaseError> {
        let url = format!("{}/retrieveAndGenerate", self.endpoint);
        let body = RetrieveAndGenerateBody::from(request);

        info!(
            "Sending retrieve-and-generate request to knowledge base {} (results: {}, max_tokens: {})",
            request.knowledge_base_id, request.number_of_results, request.max_tokens
        );
        debug!("Payload: {}", serde_json::to_string(&body)?);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(KnowledgeBaseError::Status {
                status: status.as_u16(),
                message: service_error_message(status, &text),
            });
        }

        debug!("Response JSON: {}", text);
        let parsed: RetrieveAndGenerateResponse = serde_json::from_str(&text)?;
        if let Some(session_id) = &parsed.session_id {
            debug!("Knowledge base session: {}", session_id);
        }
        Ok(parsed)
    }
}

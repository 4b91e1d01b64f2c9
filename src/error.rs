use thiserror::Error;

use crate::model::KnowledgeBaseError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures of a single `answer_query` call.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("knowledge base request failed: {0}")]
    Upstream(#[from] KnowledgeBaseError),
}

impl QueryError {
    // Message handed to callers; upstream failures expose the service's own text.
    pub fn client_message(&self) -> String {
        match self {
            QueryError::EmptyQuery => self.to_string(),
            QueryError::Upstream(e) => e.upstream_message(),
        }
    }
}

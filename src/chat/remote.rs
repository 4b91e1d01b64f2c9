use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};

use crate::chat::dispatcher::{ClientError, QueryClient};
use crate::web::models::{QueryRequest, QueryResponse};

// Calls a query endpoint deployed in another process
pub struct HttpQueryClient {
    url: String,
    client: Client,
}

impl HttpQueryClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        info!("Forwarding chat queries to: {}", url);
        Ok(Self {
            url: url.to_string(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

fn interpret_response(status: StatusCode, body: &str) -> Result<Option<String>, ClientError> {
    let parsed: QueryResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if !status.is_success() => {
            return Err(ClientError::unknown(format!("query endpoint returned {}", status)))
        }
        Err(e) => return Err(ClientError::unknown(e.to_string())),
    };

    if let Some(first) = parsed.errors.as_ref().and_then(|errors| errors.first()) {
        return Err(ClientError::Remote(first.message.clone()));
    }
    if !status.is_success() {
        return Err(ClientError::unknown(format!("query endpoint returned {}", status)));
    }
    Ok(parsed.data.filter(|data| !data.is_empty()))
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn query(&self, prompt: &str) -> Result<Option<String>, ClientError> {
        let request = QueryRequest {
            prompt: prompt.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::unknown(e.to_string()))?;
        debug!("Query endpoint replied {}: {}", status, body);

        interpret_response(status, &body)
    }
}

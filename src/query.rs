//! Turns a user query into a single citation-annotated answer string.
//!
//! The handler is stateless: every call builds a fresh [`RetrievalRequest`],
//! awaits the knowledge base once and formats whatever comes back.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::QueryError;
use crate::model::types::{DEFAULT_MAX_TOKENS, DEFAULT_NUMBER_OF_RESULTS, DEFAULT_TEMPERATURE};
use crate::model::{KnowledgeBase, RetrievalRequest, RetrieveAndGenerateResponse};
use crate::prompt::PromptTemplate;

pub const NO_RESULTS_TEXT: &str = "The query does not match any known results.";
pub const NO_CITATIONS_TEXT: &str = "No citations available";
pub const CITATIONS_SEPARATOR: &str = "\n\nCitations:\n";

/// Deployment-level parameters shared by every request.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub kms_key_arn: String,
    pub number_of_results: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub template: PromptTemplate,
}

impl GenerationSettings {
    pub fn new(knowledge_base_id: &str, model_arn: &str, kms_key_arn: &str) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.to_string(),
            model_arn: model_arn.to_string(),
            kms_key_arn: kms_key_arn.to_string(),
            number_of_results: DEFAULT_NUMBER_OF_RESULTS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            template: PromptTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// 1-based position in the response's citation list.
    pub index: usize,
    pub source_locator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub generated_text: String,
    pub citations: Vec<Citation>,
}

impl AnswerResult {
    pub fn from_response(response: RetrieveAndGenerateResponse) -> Self {
        let generated_text = response
            .output
            .and_then(|output| output.text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_RESULTS_TEXT.to_string());

        let citations = response
            .citations
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, citation)| Citation {
                index: i + 1,
                source_locator: citation.first_locator().map(str::to_string),
            })
            .collect();

        Self {
            generated_text,
            citations,
        }
    }

    pub fn citation_block(&self) -> String {
        if self.citations.is_empty() {
            return NO_CITATIONS_TEXT.to_string();
        }

        self.citations
            .iter()
            .map(|citation| match &citation.source_locator {
                Some(locator) => format!("{}. {}", citation.index, locator),
                None => format!("{}.", citation.index),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render(&self) -> String {
        format!(
            "{}{}{}",
            self.generated_text,
            CITATIONS_SEPARATOR,
            self.citation_block()
        )
    }
}

pub struct QueryHandler {
    knowledge_base: Arc<dyn KnowledgeBase>,
    settings: GenerationSettings,
    prompt_template: String,
}

impl QueryHandler {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>, settings: GenerationSettings) -> Self {
        let prompt_template = settings.template.render();
        Self {
            knowledge_base,
            settings,
            prompt_template,
        }
    }

    pub fn build_request(&self, query: &str) -> RetrievalRequest {
        RetrievalRequest {
            query_text: query.to_string(),
            prompt_template: self.prompt_template.clone(),
            knowledge_base_id: self.settings.knowledge_base_id.clone(),
            model_arn: self.settings.model_arn.clone(),
            number_of_results: self.settings.number_of_results,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            kms_key_arn: self.settings.kms_key_arn.clone(),
        }
    }

    pub async fn answer(&self, query: &str) -> Result<AnswerResult, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        info!("Answering query ({} characters)", query.len());
        debug!("Query: {}", query);

        let request = self.build_request(query);
        let response = self
            .knowledge_base
            .retrieve_and_generate(&request)
            .await
            .map_err(|e| {
                warn!("Knowledge base call failed: {}", e);
                QueryError::from(e)
            })?;

        let result = AnswerResult::from_response(response);
        info!(
            "Answer ready: {} characters, {} citations",
            result.generated_text.len(),
            result.citations.len()
        );
        Ok(result)
    }

    pub async fn answer_query(&self, query: &str) -> Result<String, QueryError> {
        self.answer(query).await.map(|result| result.render())
    }
}

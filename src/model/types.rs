use serde::{Deserialize, Serialize};

// Deployment defaults for the generation parameters.
pub const DEFAULT_NUMBER_OF_RESULTS: u32 = 10;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// One retrieve-and-generate call, built per query and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query_text: String,
    pub prompt_template: String,
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub number_of_results: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub kms_key_arn: String,
}

// Request body of the RetrieveAndGenerate API.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateBody<'a> {
    input: TextInput<'a>,
    retrieve_and_generate_configuration: GenerateConfiguration<'a>,
    session_configuration: SessionConfiguration<'a>,
}

#[derive(Debug, Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateConfiguration<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    knowledge_base_configuration: KnowledgeBaseConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseConfiguration<'a> {
    knowledge_base_id: &'a str,
    model_arn: &'a str,
    retrieval_configuration: RetrievalConfiguration,
    generation_configuration: GenerationConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfiguration<'a> {
    prompt_template: PromptTemplateBody<'a>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptTemplateBody<'a> {
    text_prompt_template: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    text_inference_config: TextInferenceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInferenceConfig {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionConfiguration<'a> {
    kms_key_arn: &'a str,
}

impl<'a> From<&'a RetrievalRequest> for RetrieveAndGenerateBody<'a> {
    fn from(req: &'a RetrievalRequest) -> Self {
        Self {
            input: TextInput {
                text: &req.query_text,
            },
            retrieve_and_generate_configuration: GenerateConfiguration {
                kind: "KNOWLEDGE_BASE",
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: &req.knowledge_base_id,
                    model_arn: &req.model_arn,
                    retrieval_configuration: RetrievalConfiguration {
                        vector_search_configuration: VectorSearchConfiguration {
                            number_of_results: req.number_of_results,
                        },
                    },
                    generation_configuration: GenerationConfiguration {
                        prompt_template: PromptTemplateBody {
                            text_prompt_template: &req.prompt_template,
                        },
                        inference_config: InferenceConfig {
                            text_inference_config: TextInferenceConfig {
                                temperature: req.temperature,
                                max_tokens: req.max_tokens,
                            },
                        },
                    },
                },
            },
            session_configuration: SessionConfiguration {
                kms_key_arn: &req.kms_key_arn,
            },
        }
    }
}

// Response body. Every field is optional; absent parts are normalized by the query handler.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateResponse {
    pub output: Option<GeneratedOutput>,
    pub citations: Option<Vec<CitationPayload>>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationPayload {
    pub retrieved_references: Option<Vec<RetrievedReference>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedReference {
    pub location: Option<ReferenceLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLocation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub s3_location: Option<S3Location>,
    pub web_location: Option<WebLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Location {
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebLocation {
    pub url: Option<String>,
}

impl ReferenceLocation {
    pub fn locator(&self) -> Option<&str> {
        let s3 = self.s3_location.as_ref().and_then(|l| l.uri.as_deref());
        let web = self.web_location.as_ref().and_then(|l| l.url.as_deref());
        s3.filter(|uri| !uri.is_empty())
            .or_else(|| web.filter(|url| !url.is_empty()))
    }
}

impl CitationPayload {
    // Only the first retrieved reference of a citation is considered.
    pub fn first_locator(&self) -> Option<&str> {
        self.retrieved_references
            .as_ref()
            .and_then(|refs| refs.first())
            .and_then(|r| r.location.as_ref())
            .and_then(|l| l.locator())
    }
}

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use log::info;

use crate::chat::sessions::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
use crate::error::ConfigError;
use crate::model::types::{DEFAULT_MAX_TOKENS, DEFAULT_NUMBER_OF_RESULTS, DEFAULT_TEMPERATURE};
use crate::prompt::{PromptStyle, PromptTemplate, DEFAULT_SUBJECT};
use crate::query::GenerationSettings;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TITLE: &str = "Insurance Enrollment Search";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct KnowledgeBaseConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model_id: String,
    pub settings: GenerationSettings,
}

/// Where chat queries are answered.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Answer in this process against a Bedrock knowledge base.
    KnowledgeBase(KnowledgeBaseConfig),
    /// Forward to a query endpoint served elsewhere.
    Remote { query_url: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub title: String,
    pub echo_user_messages: bool,
    pub request_timeout: Duration,
    pub session_ttl: Duration,
    pub max_sessions: usize,
    pub backend: Backend,
}

fn optional<F>(lookup: &F, var: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, var).ok_or(ConfigError::Missing(var))
}

fn at_least_one<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + From<u8> + Display,
    T::Err: Display,
{
    let value = parsed(lookup, var, default)?;
    if value < T::from(1) {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

fn parsed<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match optional(lookup, var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match optional(&lookup, "QUERY_API_URL") {
            Some(query_url) => Backend::Remote { query_url },
            None => Backend::KnowledgeBase(Self::knowledge_base(&lookup)?),
        };

        let timeout_secs: u64 =
            at_least_one(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let session_ttl_secs: u64 =
            at_least_one(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL.as_secs())?;
        let max_sessions: usize = at_least_one(&lookup, "MAX_SESSIONS", DEFAULT_MAX_SESSIONS)?;

        Ok(Self {
            host: optional(&lookup, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parsed(&lookup, "PORT", DEFAULT_PORT)?,
            title: optional(&lookup, "APP_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            echo_user_messages: parsed(&lookup, "ECHO_USER_MESSAGES", false)?,
            request_timeout: Duration::from_secs(timeout_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
            max_sessions,
            backend,
        })
    }

    fn knowledge_base<F>(lookup: &F) -> Result<KnowledgeBaseConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kms_key_arn = required(lookup, "KMS_KEY")?;
        let knowledge_base_id = required(lookup, "KNOWLEDGE_BASE_ID")?;
        let model_id = required(lookup, "MODEL_ID")?;
        let model_arn = required(lookup, "MODEL_ARN")?;

        // Requests are not SigV4-signed here; the endpoint must be a signing proxy or gateway.
        let endpoint = required(lookup, "BEDROCK_ENDPOINT")?;

        let temperature: f32 = parsed(lookup, "TEMPERATURE", DEFAULT_TEMPERATURE)?;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                var: "TEMPERATURE",
                value: temperature.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        let number_of_results: u32 =
            at_least_one(lookup, "NUMBER_OF_RESULTS", DEFAULT_NUMBER_OF_RESULTS)?;

        let style: PromptStyle = parsed(lookup, "PROMPT_STYLE", PromptStyle::default())?;
        let subject =
            optional(lookup, "PROMPT_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        let mut settings = GenerationSettings::new(&knowledge_base_id, &model_arn, &kms_key_arn);
        settings.number_of_results = number_of_results;
        settings.temperature = temperature;
        settings.max_tokens = parsed(lookup, "MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        settings.template = PromptTemplate::new(style, subject);

        Ok(KnowledgeBaseConfig {
            endpoint,
            api_key: optional(lookup, "BEDROCK_API_KEY"),
            model_id,
            settings,
        })
    }

    pub fn log_summary(&self) {
        info!("Listening on {}:{}", self.host, self.port);
        info!(
            "Chat sessions expire after {}s idle, at most {} kept",
            self.session_ttl.as_secs(),
            self.max_sessions
        );
        match &self.backend {
            Backend::KnowledgeBase(kb) => {
                info!(
                    "Knowledge base {} via {} with model {} ({} results, temperature {}, max_tokens {}, prompt style {})",
                    kb.settings.knowledge_base_id,
                    kb.endpoint,
                    kb.model_id,
                    kb.settings.number_of_results,
                    kb.settings.temperature,
                    kb.settings.max_tokens,
                    kb.settings.template.style
                );
            }
            Backend::Remote { query_url } => info!("Queries answered by {}", query_url),
        }
    }
}

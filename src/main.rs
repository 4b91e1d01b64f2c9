mod chat;
mod config;
mod error;
mod model;
mod prompt;
mod query;
mod web;

use actix_web::{App, HttpServer, web::Data};
use actix_files as fs;
use anyhow::Context as _;
use dotenv::dotenv;
use log::{info, error};
use std::sync::{Arc, Mutex};
use tera::Tera;

use chat::{Dispatcher, HttpQueryClient, LocalQueryClient, QueryClient, SessionStore};
use config::{AppConfig, Backend};
use model::BedrockKnowledgeBase;
use query::QueryHandler;
use web::routes;

// App state structure
pub struct AppState {
    tera: Tera,
    title: String,
    query_handler: Option<Arc<QueryHandler>>,
    query_client: Arc<dyn QueryClient>,
    echo_user_messages: bool,
    sessions: Mutex<SessionStore>,
}

impl AppState {
    fn new_dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.query_client.clone()).with_user_echo(self.echo_user_messages)
    }
}

fn build_backend(config: &AppConfig) -> anyhow::Result<(Option<Arc<QueryHandler>>, Arc<dyn QueryClient>)> {
    match &config.backend {
        Backend::KnowledgeBase(kb) => {
            let knowledge_base = BedrockKnowledgeBase::new(
                &kb.endpoint,
                kb.api_key.clone(),
                config.request_timeout,
            )
            .context("failed to build knowledge base client")?;
            let handler = Arc::new(QueryHandler::new(Arc::new(knowledge_base), kb.settings.clone()));
            let client: Arc<dyn QueryClient> = Arc::new(LocalQueryClient::new(handler.clone()));
            Ok((Some(handler), client))
        }
        Backend::Remote { query_url } => {
            let client = HttpQueryClient::new(query_url, config.request_timeout)
                .context("failed to build query client")?;
            Ok((None, Arc::new(client)))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting knowledge base search assistant");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    config.log_summary();

    let (query_handler, query_client) = match build_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to initialize query backend: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize template engine
    let mut tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    tera.autoescape_on(vec![".html"]);

    let app_state = Data::new(AppState {
        tera,
        title: config.title.clone(),
        query_handler,
        query_client,
        echo_user_messages: config.echo_user_messages,
        sessions: Mutex::new(SessionStore::new(config.session_ttl, config.max_sessions)),
    });

    // Start web server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

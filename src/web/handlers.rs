use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use tera::Context;
use uuid::Uuid;
use log::{info, error, warn};

use crate::chat::dispatcher::EMPTY_QUERY_NOTICE;
use crate::chat::{sessions, ChatMessage};
use crate::error::QueryError;
use crate::web::models::{ChatRequest, ChatResponse, QueryRequest, QueryResponse, TranscriptResponse};
use crate::AppState;

// Index page handler
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let mut context = Context::new();
    context.insert("title", &data.title);
    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Query API endpoint: one prompt in, one answer string out
pub async fn query(
    data: web::Data<AppState>,
    req: web::Json<QueryRequest>,
) -> impl Responder {
    let handler = match &data.query_handler {
        Some(handler) => handler,
        None => {
            return HttpResponse::ServiceUnavailable()
                .json(QueryResponse::error("Query handler is not configured on this server"))
        }
    };

    match handler.answer_query(&req.prompt).await {
        Ok(answer) => HttpResponse::Ok().json(QueryResponse::success(answer)),
        Err(e @ QueryError::EmptyQuery) => {
            HttpResponse::BadRequest().json(QueryResponse::error(e.client_message()))
        }
        Err(e) => {
            error!("Query error: {}", e);
            HttpResponse::BadGateway().json(QueryResponse::error(e.client_message()))
        }
    }
}

// Chat API endpoint
pub async fn chat(
    data: web::Data<AppState>,
    req: web::Json<ChatRequest>,
) -> impl Responder {
    let anonymous_empty = req.session_id.is_none() && req.message.trim().is_empty();
    if anonymous_empty {
        return HttpResponse::Ok().json(ChatResponse {
            session_id: None,
            reply: ChatMessage::bot(EMPTY_QUERY_NOTICE),
            transcript_len: 0,
        });
    }

    let (session_id, session) = {
        let mut store = match data.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Failed to lock sessions mutex: {}", e);
                return HttpResponse::InternalServerError().json(json!({
                    "error": "Internal server error"
                }));
            }
        };
        match req.session_id {
            Some(id) => match store.get(&id) {
                Some(session) => (id, session),
                None => {
                    warn!("Unknown or expired chat session {}", id);
                    return HttpResponse::NotFound().json(json!({ "error": "Session not found" }));
                }
            },
            None => {
                let (id, session) = store.insert(data.new_dispatcher());
                info!("Started chat session {} ({} active)", id, store.len());
                (id, session)
            }
        }
    };

    info!("Chat message for session {} ({} characters)", session_id, req.message.len());

    let (reply, transcript_len) = sessions::submit(&session, &req.message).await;

    HttpResponse::Ok().json(ChatResponse {
        session_id: Some(session_id),
        reply,
        transcript_len,
    })
}

// Full transcript of one chat session
pub async fn transcript(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> impl Responder {
    let session_id = path.into_inner();

    let session = match data.sessions.lock() {
        Ok(mut store) => store.get(&session_id),
        Err(e) => {
            error!("Failed to lock sessions mutex: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }));
        }
    };

    match session {
        Some(session) => {
            let dispatcher = session.lock().await;
            HttpResponse::Ok().json(TranscriptResponse {
                session_id,
                messages: dispatcher.transcript().messages().to_vec(),
            })
        }
        None => {
            warn!("Unknown chat session {}", session_id);
            HttpResponse::NotFound().json(json!({ "error": "Session not found" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use actix_web::{test, web::Data, App};
    use tera::Tera;

    use super::*;
    use crate::chat::{LocalQueryClient, QueryClient, SessionStore};
    use crate::chat::dispatcher::mock::ScriptedClient;
    use crate::model::mock::{response, MockKnowledgeBase};
    use crate::query::{GenerationSettings, QueryHandler};
    use crate::web::routes;

    fn state_with_handler(kb: Arc<MockKnowledgeBase>) -> Data<AppState> {
        let handler = Arc::new(QueryHandler::new(
            kb,
            GenerationSettings::new("KB12345", "arn:model", "arn:key"),
        ));
        let client: Arc<dyn QueryClient> = Arc::new(LocalQueryClient::new(handler.clone()));
        state(Some(handler), client)
    }

    fn state(
        query_handler: Option<Arc<QueryHandler>>,
        query_client: Arc<dyn QueryClient>,
    ) -> Data<AppState> {
        Data::new(AppState {
            tera: Tera::new("templates/**/*").unwrap(),
            title: "Insurance Enrollment Search".to_string(),
            query_handler,
            query_client,
            echo_user_messages: false,
            sessions: Mutex::new(SessionStore::new(Duration::from_secs(60), 2)),
        })
    }

    fn lambda_kb() -> Arc<MockKnowledgeBase> {
        Arc::new(MockKnowledgeBase::replying(response(
            Some("Lambda is serverless..."),
            &[Some("s3://docs/a"), Some("s3://docs/b")],
        )))
    }

    #[actix_web::test]
    async fn test_query_success() {
        let app = test::init_service(
            App::new().app_data(state_with_handler(lambda_kb())).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "prompt": "What are Lambda's key features?" }))
            .to_request();
        let resp: QueryResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(
            resp.data.as_deref(),
            Some("Lambda is serverless...\n\nCitations:\n1. s3://docs/a\n2. s3://docs/b")
        );
        assert!(resp.errors.is_none());
    }

    #[actix_web::test]
    async fn test_query_empty_prompt_is_bad_request() {
        let kb = lambda_kb();
        let app = test::init_service(
            App::new().app_data(state_with_handler(kb.clone())).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "prompt": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: QueryResponse = test::read_body_json(resp).await;
        assert_eq!(body.errors.unwrap()[0].message, "query cannot be empty");
        assert_eq!(kb.calls(), 0);
    }

    #[actix_web::test]
    async fn test_query_upstream_failure_is_bad_gateway() {
        let kb = Arc::new(MockKnowledgeBase::failing(429, "Rate exceeded"));
        let app = test::init_service(
            App::new().app_data(state_with_handler(kb)).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "prompt": "dental plans" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 502);

        let body: QueryResponse = test::read_body_json(resp).await;
        assert!(body.data.is_none());
        assert_eq!(body.errors.unwrap()[0].message, "Rate exceeded");
    }

    #[actix_web::test]
    async fn test_query_without_handler_is_unavailable() {
        let client = Arc::new(ScriptedClient::new(Ok(None)));
        let app = test::init_service(
            App::new().app_data(state(None, client)).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/query")
            .set_json(json!({ "prompt": "dental plans" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);
    }

    #[actix_web::test]
    async fn test_chat_session_transcript() {
        let kb = lambda_kb();
        let app = test::init_service(
            App::new().app_data(state_with_handler(kb.clone())).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "What are Lambda's key features?" }))
            .to_request();
        let first: ChatResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            first.reply,
            ChatMessage::bot("Lambda is serverless...\n\nCitations:\n1. s3://docs/a\n2. s3://docs/b")
        );
        assert_eq!(first.transcript_len, 1);

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "  ", "session_id": first.session_id }))
            .to_request();
        let second: ChatResponse = test::call_and_read_body_json(&app, req).await;
        assert!(first.session_id.is_some());
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.reply, ChatMessage::bot(EMPTY_QUERY_NOTICE));
        assert_eq!(second.transcript_len, 2);
        assert_eq!(kb.calls(), 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", first.session_id.unwrap()))
            .to_request();
        let transcript: TranscriptResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.messages[1].text, EMPTY_QUERY_NOTICE);
    }

    #[actix_web::test]
    async fn test_chat_failure_adds_one_message() {
        let kb = Arc::new(MockKnowledgeBase::failing(403, "Access denied"));
        let app = test::init_service(
            App::new().app_data(state_with_handler(kb)).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "dental plans" }))
            .to_request();
        let resp: ChatResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            resp.reply.text,
            "Error fetching data: Error from Bedrock: Access denied"
        );
        assert_eq!(resp.transcript_len, 1);
    }

    #[actix_web::test]
    async fn test_unknown_session_is_not_found() {
        let app = test::init_service(
            App::new().app_data(state_with_handler(lambda_kb())).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_chat_rejects_session_ids_not_issued_here() {
        let kb = lambda_kb();
        let app = test::init_service(
            App::new().app_data(state_with_handler(kb.clone())).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({ "message": "dental plans", "session_id": Uuid::new_v4() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(kb.calls(), 0);
    }

    #[actix_web::test]
    async fn test_anonymous_empty_message_starts_no_session() {
        let kb = lambda_kb();
        let state = state_with_handler(kb.clone());
        let app = test::init_service(
            App::new().app_data(state.clone()).configure(routes::configure),
        )
        .await;

        for _ in 0..5 {
            let req = test::TestRequest::post()
                .uri("/api/chat")
                .set_json(json!({ "message": "   " }))
                .to_request();
            let resp: ChatResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(resp.session_id, None);
            assert_eq!(resp.reply, ChatMessage::bot(EMPTY_QUERY_NOTICE));
            assert_eq!(resp.transcript_len, 0);
        }
        assert_eq!(state.sessions.lock().unwrap().len(), 0);
        assert_eq!(kb.calls(), 0);
    }

    #[actix_web::test]
    async fn test_session_cap_evicts_oldest_session() {
        let state = state_with_handler(lambda_kb());
        let app = test::init_service(
            App::new().app_data(state.clone()).configure(routes::configure),
        )
        .await;

        let mut ids = Vec::new();
        for _ in 0..3 {
            let req = test::TestRequest::post()
                .uri("/api/chat")
                .set_json(json!({ "message": "lambda" }))
                .to_request();
            let resp: ChatResponse = test::call_and_read_body_json(&app, req).await;
            ids.push(resp.session_id.unwrap());
        }
        assert_eq!(state.sessions.lock().unwrap().len(), 2);

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", ids[0]))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", ids[2]))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    #[actix_web::test]
    async fn test_index_and_health() {
        let app = test::init_service(
            App::new().app_data(state_with_handler(lambda_kb())).configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("Insurance Enrollment Search"));
    }
}

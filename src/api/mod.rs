use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::ChatService;

pub mod handlers;
pub mod page;
pub mod types;

use handlers::{chat, health, home};
use page::HomePage;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub page: Arc<HomePage>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/chat", post(chat))
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chance::{Chance, SeededChance};
    use crate::classifier::KeywordTable;
    use crate::inference::{GenerationError, Generator, ModelHandle};
    use crate::responses::{ResponsePool, FOLLOW_UP_SUGGESTIONS, TROUBLE_MESSAGE};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct ForceTopic;

    impl Chance for ForceTopic {
        fn draw(&self) -> f64 {
            0.1
        }

        fn pick(&self, _len: usize) -> usize {
            0
        }
    }

    struct Panicking;

    impl Generator for Panicking {
        fn complete(&self, _text: &str) -> Result<String, GenerationError> {
            panic!("generator blew up");
        }
    }

    struct Friendly;

    impl Generator for Friendly {
        fn complete(&self, _text: &str) -> Result<String, GenerationError> {
            Ok("</s> That sounds like a lot to carry".into())
        }
    }

    fn app(model: ModelHandle, chance: Arc<dyn Chance>) -> Router {
        let chat = ChatService::new(
            KeywordTable::standard().clone(),
            ResponsePool::standard(),
            model,
            chance,
        );
        router(AppState {
            chat: Arc::new(chat),
            page: Arc::new(HomePage::builtin()),
        })
    }

    async fn post_raw(app: Router, body: Body, content_type: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", content_type)
            .body(body)
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_chat(app: Router, body: Value) -> (StatusCode, Value) {
        post_raw(app, Body::from(body.to_string()), "application/json").await
    }

    #[tokio::test]
    async fn crisis_message_is_urgent_without_suggestions() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let (status, json) = post_chat(app, json!({ "message": "I want to die" })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["response"]
            .as_str()
            .unwrap()
            .starts_with("I'm deeply concerned"));
        assert_eq!(json["urgent"], true);
        assert!(json.get("suggestions").is_none());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn empty_message_prompts_with_three_suggestions() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let (status, json) = post_chat(app, json!({ "message": "" })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["response"]
            .as_str()
            .unwrap()
            .starts_with("I notice you're being quiet"));
        assert_eq!(json["suggestions"].as_array().unwrap().len(), 3);
        assert!(json.get("urgent").is_none());
    }

    #[tokio::test]
    async fn missing_message_field_counts_as_empty() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let (_, json) = post_chat(app, json!({})).await;
        assert!(json["response"]
            .as_str()
            .unwrap()
            .starts_with("I notice you're being quiet"));
    }

    #[tokio::test]
    async fn forced_topic_path_uses_anxiety_reply() {
        let app = app(ModelHandle::Unavailable, Arc::new(ForceTopic));
        let (_, json) = post_chat(app, json!({ "message": "I feel anxious about work" })).await;
        let pool = ResponsePool::standard();
        let anxiety = pool.for_topic(crate::classifier::Topic::Anxiety);
        assert!(anxiety.iter().any(|s| json["response"] == s.as_str()));
        assert_eq!(json["suggestions"][0], "More about my anxiety");
    }

    #[tokio::test]
    async fn generated_reply_is_cleaned_up() {
        let app = app(
            ModelHandle::Available(Arc::new(Friendly)),
            Arc::new(SeededChance::new(1)),
        );
        let (_, json) = post_chat(app, json!({ "message": "long week" })).await;
        assert_eq!(json["response"], "That sounds like a lot to carry.");
        let expected: Vec<Value> = FOLLOW_UP_SUGGESTIONS.iter().map(|s| json!(s)).collect();
        assert_eq!(json["suggestions"], Value::Array(expected));
    }

    #[tokio::test]
    async fn malformed_body_degrades_gracefully() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let (status, json) =
            post_raw(app, Body::from("{not json"), "application/json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], TROUBLE_MESSAGE);
        assert_eq!(json["error"], "processing_error");
        assert!(json.get("suggestions").is_none());
    }

    #[tokio::test]
    async fn non_string_message_degrades_gracefully() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let (_, json) = post_chat(app, json!({ "message": 42 })).await;
        assert_eq!(json["error"], "processing_error");
    }

    #[tokio::test]
    async fn orchestrator_panic_degrades_gracefully() {
        let app = app(
            ModelHandle::Available(Arc::new(Panicking)),
            Arc::new(SeededChance::new(1)),
        );
        let (status, json) = post_chat(app, json!({ "message": "hello" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response"], TROUBLE_MESSAGE);
        assert_eq!(json["error"], "processing_error");
    }

    #[tokio::test]
    async fn root_serves_chat_page() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("<title>Companion Chat</title>"));
    }

    #[tokio::test]
    async fn health_reports_model_state() {
        let app = app(ModelHandle::Unavailable, Arc::new(SeededChance::new(1)));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, json!({ "status": "ok", "model_loaded": false }));
    }
}

//! HTTP API server for integration with other front ends.
//!
//! Exposes thread listing, thread history and turn submission as JSON.

use super::GENERATION_FAILED_NOTICE;
use crate::agent::{ConversationState, GraphRunner, Message};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::threads::{new_thread_id, ThreadSummary};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

type TurnLock = tokio::sync::Mutex<()>;

/// Shared application state.
struct AppState {
    runner: Arc<GraphRunner>,
    thread_locks: ThreadLocks,
}

impl AppState {
    fn new(runner: Arc<GraphRunner>) -> Self {
        Self {
            runner,
            thread_locks: ThreadLocks::default(),
        }
    }
}

/// Turns on the same thread run one at a time.
///
/// An entry exists only while some request holds or waits for it.
#[derive(Default)]
struct ThreadLocks {
    table: Mutex<HashMap<String, Arc<TurnLock>>>,
}

impl ThreadLocks {
    fn enter(&self, thread_id: &str) -> ThreadTurn<'_> {
        let lock = self
            .table()
            .entry(thread_id.to_string())
            .or_default()
            .clone();

        ThreadTurn {
            locks: self,
            thread_id: thread_id.to_string(),
            lock,
        }
    }

    fn len(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<TurnLock>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A request's claim on a thread lock. Dropping the last claim removes the
/// entry.
struct ThreadTurn<'a> {
    locks: &'a ThreadLocks,
    thread_id: String,
    lock: Arc<TurnLock>,
}

impl ThreadTurn<'_> {
    async fn wait(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for ThreadTurn<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        // Clones are only made under the table lock, so two means the table's
        // copy and ours.
        let unused = table
            .get(&self.thread_id)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
        if unused {
            table.remove(&self.thread_id);
        }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'doctorbot doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings, None)?;
    let app = router(Arc::new(AppState::new(orchestrator.runner())));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("DoctorBot API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("List threads", "GET  /threads");
    Output::kv("New thread", "POST /threads");
    Output::kv("Get thread", "GET  /threads/:thread_id");
    Output::kv("Send message", "POST /threads/:thread_id/messages");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/threads", get(list_threads).post(create_thread))
        .route("/threads/{thread_id}", get(get_thread))
        .route("/threads/{thread_id}/messages", post(post_message))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Serialize)]
struct ThreadListResponse {
    threads: Vec<ThreadSummary>,
    total: usize,
}

#[derive(Serialize)]
struct NewThreadResponse {
    thread_id: String,
}

#[derive(Serialize)]
struct ThreadResponse {
    thread_id: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

#[derive(Serialize)]
struct MessageResponse {
    thread_id: String,
    answer: String,
    /// Messages added by this turn.
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    max_turns_exceeded: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_threads(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.runner.list_threads().await {
        Ok(threads) => Json(ThreadListResponse {
            total: threads.len(),
            threads,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Hand out a fresh id. The thread is stored with its first message.
async fn create_thread() -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(NewThreadResponse {
            thread_id: new_thread_id(),
        }),
    )
}

async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> impl IntoResponse {
    match state.runner.find_conversation(&thread_id).await {
        Ok(Some(conversation)) => Json(ThreadResponse {
            thread_id,
            messages: into_messages(conversation),
        })
        .into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Thread not found: {}", thread_id),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> impl IntoResponse {
    let message = req.message.trim();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message must not be empty");
    }

    let turn = state.thread_locks.enter(&thread_id);
    let _held = turn.wait().await;

    info!("Turn requested on thread {}", thread_id);

    match state.runner.run_turn(&thread_id, message).await {
        Ok(result) => Json(MessageResponse {
            thread_id: result.thread_id,
            answer: result.answer,
            messages: result.new_messages,
            max_turns_exceeded: result.max_turns_exceeded,
        })
        .into_response(),
        Err(e) => {
            error!("Turn failed on thread {}: {}", thread_id, e);
            error_response(StatusCode::BAD_GATEWAY, GENERATION_FAILED_NOTICE)
        }
    }
}

fn into_messages(conversation: ConversationState) -> Vec<Message> {
    conversation.messages().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::embedding::Embedder;
    use crate::error::{DoctorBotError, Result};
    use crate::llm::Generator;
    use crate::threads::MemoryThreadStore;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;

    struct FixedGenerator(Option<&'static str>);

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| DoctorBotError::Generation("upstream 500".to_string()))
        }
    }

    struct ZeroEmbedder;

    #[async_trait]
    impl Embedder for ZeroEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 3])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    fn state_with(reply: Option<&'static str>) -> Arc<AppState> {
        let mut settings = Settings::default();
        settings.web_search.enabled = false;

        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(FixedGenerator(reply)),
            Arc::new(ZeroEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryThreadStore::new()),
        )
        .unwrap();

        Arc::new(AppState::new(orchestrator.runner()))
    }

    fn request(message: &str) -> Json<MessageRequest> {
        Json(MessageRequest {
            message: message.to_string(),
        })
    }

    #[tokio::test]
    async fn test_post_message_then_get_thread() {
        let state = state_with(Some("Final Answer: Stay hydrated."));

        let response = post_message(State(state.clone()), Path("t1".to_string()), request("fever"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_thread(State(state.clone()), Path("t1".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let threads = state.runner.list_threads().await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].message_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_thread_is_not_found() {
        let state = state_with(Some("Final Answer: ok"));

        let response = get_thread(State(state), Path("missing".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generation_failure_is_bad_gateway() {
        let state = state_with(None);

        let response = post_message(State(state.clone()), Path("t1".to_string()), request("fever"))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(state.runner.thread_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let state = state_with(Some("Final Answer: ok"));

        let response = post_message(State(state), Path("t1".to_string()), request("   "))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_same_thread_shares_lock() {
        let locks = ThreadLocks::default();

        let a = locks.enter("t1");
        let b = locks.enter("t1");
        let c = locks.enter("t2");

        assert!(Arc::ptr_eq(&a.lock, &b.lock));
        assert!(!Arc::ptr_eq(&a.lock, &c.lock));
        assert_eq!(locks.len(), 2);

        drop(a);
        assert_eq!(locks.len(), 2);
        drop(b);
        drop(c);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_thread_locks_released_after_turns() {
        let state = state_with(Some("Final Answer: ok"));

        for i in 0..50 {
            let response = post_message(State(state.clone()), Path(format!("u{}", i)), request("hi"))
                .await
                .into_response();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = post_message(State(state.clone()), Path("u0".to_string()), request(" "))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(state.thread_locks.len(), 0);
        assert_eq!(state.runner.thread_ids().await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_thread() {
        let state = state_with(Some("Final Answer: ok"));

        let turns = (0..4).map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                post_message(State(state), Path("shared".to_string()), request("hi"))
                    .await
                    .into_response()
                    .status()
            })
        });
        for status in futures::future::join_all(turns).await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        let conversation = state.runner.load_conversation("shared").await.unwrap();
        assert_eq!(conversation.len(), 8);
        assert_eq!(state.thread_locks.len(), 0);
    }

    #[tokio::test]
    async fn test_waiting_request_dropped_releases_entry() {
        let locks = ThreadLocks::default();
        let holder = locks.enter("t1");
        let held = holder.wait().await;

        {
            let waiter = locks.enter("t1");
            let pending = waiter.wait();
            drop(pending);
        }
        assert_eq!(locks.len(), 1);

        drop(held);
        drop(holder);
        assert_eq!(locks.len(), 0);
    }
}

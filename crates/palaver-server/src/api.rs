//! HTTP API and shared application state.
//!
//! The REST surface persists messages and serves conversation history; the
//! live path (relay, presence, call signaling) runs over the `/ws`
//! endpoint mounted on the same router.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use palaver_shared::{ChatMessage, MessageBody, PeerRef, UserId};
use palaver_store::Database;

use crate::auth::{bearer_token, AuthedUser, TokenVerifier};
use crate::calls::CallRegistry;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::presence::Directory;
use crate::relay::Relay;
use crate::ws::ws_handler;

#[derive(Clone)]
pub struct AppState {
    pub directory: Directory,
    pub relay: Relay,
    pub calls: CallRegistry,
    pub store: Arc<Mutex<Database>>,
    pub auth: Arc<TokenVerifier>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Database) -> Self {
        let directory = Directory::new();
        let relay = Relay::new(directory.clone());
        let calls = CallRegistry::new(config.ring_timeout);
        let auth = Arc::new(TokenVerifier::new(&config.jwt_secret));
        Self {
            directory,
            relay,
            calls,
            store: Arc::new(Mutex::new(store)),
            auth,
            config: Arc::new(config),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let store = Database::open_in_memory().expect("in-memory database");
        Self::new(ServerConfig::default(), store)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/ws", get(ws_handler))
        .route("/online", get(get_online))
        .route("/messages", post(post_message))
        .route("/messages/{peer}", get(get_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

/// Body of `POST /messages`. The sender comes from the verified token,
/// never from the body; `to` accepts a bare identity or a `group:` tag.
#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    to: String,
    #[serde(flatten)]
    body: MessageBody,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn authed(state: &AppState, headers: &HeaderMap) -> Result<AuthedUser, ServerError> {
    let token = bearer_token(headers)?;
    state.auth.verify(token)
}

/// Snapshot of currently registered identities, for clients that want
/// presence without holding a live connection open.
async fn get_online(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserId>>, ServerError> {
    authed(&state, &headers)?;
    Ok(Json(state.directory.snapshot().await))
}

/// Persist a message and return its canonical record. The id and
/// timestamp are assigned here; clients relay the returned record over
/// the live channel themselves.
async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ChatMessage>, ServerError> {
    let user = authed(&state, &headers)?;
    if request.to.is_empty() {
        return Err(ServerError::BadRequest("empty recipient".to_string()));
    }

    let message = ChatMessage {
        id: Uuid::new_v4(),
        from: user.id,
        to: PeerRef::from_wire(&request.to),
        body: request.body,
        created_at: Utc::now(),
    };

    let store = state.store.lock().await;
    store.insert_message(&message)?;
    info!(id = %message.id, from = %message.from, "message persisted");

    Ok(Json(message))
}

/// Full conversation history with a peer, oldest first. For a group peer
/// the requester must be a current member.
async fn get_history(
    State(state): State<AppState>,
    Path(peer): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatMessage>>, ServerError> {
    let user = authed(&state, &headers)?;
    let peer = PeerRef::from_wire(&peer);

    let store = state.store.lock().await;
    let messages = store.resolve_history(&user.id, &peer)?;
    Ok(Json(messages))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

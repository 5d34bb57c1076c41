//! Gateway HTTP + WebSocket server (single port).

use crate::composer::Composer;
use crate::config::{self, Config};
use crate::gateway::dispatch;
use crate::gateway::protocol::ConversationRequest;
use crate::llm::HuggingFaceClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 400 body for the synchronous path when `input.text` is missing.
pub const INVALID_REQUEST_TEXT: &str =
    "Invalid request. Please provide a valid ConversationRequest with input text.";
/// 500 body for the synchronous path when generation failed.
pub const LLM_ERROR_TEXT: &str = "Error calling LLM API.";

/// Shared, read-only state: nothing here changes after startup.
#[derive(Clone)]
struct RelayState {
    port: u16,
    composer: Composer,
}

/// Run the relay server; binds to config.server.bind:config.server.port.
/// Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_server(config: Config) -> Result<()> {
    let token = config::resolve_api_token(&config);
    if token.is_none() {
        log::warn!("no generation api token configured (HUGGINGFACE_API_TOKEN or llm.apiToken); requests are sent unauthenticated");
    }
    let generator = HuggingFaceClient::new(config.llm.endpoint.clone(), token);
    log::info!("generation endpoint: {}", generator.endpoint());
    let state = RelayState {
        port: config.server.port,
        composer: Composer::new(Arc::new(generator), config.conversation.generation),
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/ws", get(ws_handler))
        .route("/test-llm", post(test_llm))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server exited")?;

    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("installing Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("installing SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / : WebSocket clients connect here; plain GETs get the health JSON.
async fn root(State(state): State<RelayState>, ws: Option<WebSocketUpgrade>) -> Response {
    match ws {
        Some(ws) => upgrade(ws, state),
        None => health_http(&state).into_response(),
    }
}

fn health_http(state: &RelayState) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}

/// GET /ws upgrades to WebSocket.
async fn ws_handler(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    upgrade(ws, state)
}

fn upgrade(ws: WebSocketUpgrade, state: RelayState) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.composer))
}

/// One client connection. A writer task owns the sink; each inbound frame is dispatched on its
/// own task and its reply is queued for the writer when ready, so replies go out in completion order.
async fn handle_socket(socket: WebSocket, composer: Composer) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    log::info!("ws {}: client connected", conn_id);

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let write_conn_id = conn_id.clone();
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                log::debug!("ws {}: write failed, closing writer", write_conn_id);
                break;
            }
        }
    });

    while let Some(msg) = stream.next().await {
        let payload = match msg {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                log::debug!("ws {}: receive error: {}", conn_id, e);
                break;
            }
        };
        let composer = composer.clone();
        let tx = tx.clone();
        let conn_id = conn_id.clone();
        tokio::spawn(async move {
            let Some(envelope) = dispatch::handle_payload(&composer, &payload).await else {
                return;
            };
            match envelope.to_json() {
                Ok(text) => {
                    if tx.send(text).is_err() {
                        log::debug!("ws {}: client gone before reply was sent", conn_id);
                    }
                }
                Err(e) => log::error!("ws {}: encoding reply: {}", conn_id, e),
            }
        });
    }

    log::info!("ws {}: client disconnected", conn_id);
}

/// POST /test-llm : synchronous path. Body is a bare ConversationRequest (no envelope).
async fn test_llm(State(state): State<RelayState>, body: Bytes) -> Response {
    let req = match serde_json::from_slice::<ConversationRequest>(&body) {
        Ok(req) if !req.input.text.is_empty() => req,
        _ => return (StatusCode::BAD_REQUEST, INVALID_REQUEST_TEXT).into_response(),
    };
    match state.composer.compose(&req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => {
            log::error!("processing LLM request: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, LLM_ERROR_TEXT).into_response()
        }
    }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tilefall::engine::{CollapseEngine, SelectOutcome};
use tilefall::logging::{emit_log, now_ms, LogContext, LogLevel};
use tilefall::server_protocol::{parse_client_message, ParsedClientMessage};
use tilefall::server_utils::{sanitize_name, settings_from_lookup};
use tilefall::types::{MoveReport, ShuffleOutcome};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

const OUTBOUND_QUEUE_SIZE: usize = 256;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    /// Set by `hello`; clients without a name get no broadcasts.
    name: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    session_id: String,
    clients: HashMap<String, ClientContext>,
    engine: CollapseEngine,
    board_seed: u64,
}

impl ServerState {
    fn new(session_id: String, engine: CollapseEngine, board_seed: u64) -> Self {
        Self {
            session_id,
            clients: HashMap::new(),
            engine,
            board_seed,
        }
    }

    fn log(&self, level: LogLevel, event: &str, details: Value) {
        emit_log(
            level,
            event,
            &self.session_id,
            LogContext {
                seed: Some(self.board_seed),
                move_index: Some(self.engine.summary().moves),
                ..LogContext::default()
            },
            details,
        );
    }
}

#[tokio::main]
async fn main() {
    let settings = settings_from_lookup(|key| std::env::var(key).ok());
    let port = settings.port;
    let seed = settings.seed.unwrap_or_else(now_ms);

    let engine = match CollapseEngine::new(settings.board, seed) {
        Ok(engine) => engine,
        Err(error) => {
            eprintln!("[server] invalid puzzle configuration: {error}");
            std::process::exit(2);
        }
    };
    let session_id = format!("server-{seed}");
    emit_log(
        LogLevel::Info,
        "session_created",
        &session_id,
        LogContext {
            seed: Some(seed),
            ..LogContext::default()
        },
        json!({
            "config": settings.board,
            "initialShuffle": engine.initial_shuffle(),
        }),
    );

    let state = Arc::new(Mutex::new(ServerState::new(session_id, engine, seed)));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/board", get(board_handler))
        .route("/api/summary", get(summary_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found. set STATIC_DIR to serve a client.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("[server] failed to bind {bind_addr}: {error}");
            std::process::exit(1);
        }
    };

    println!("[server] listening on :{port}");
    if let Err(error) = axum::serve(listener, app).await {
        eprintln!("[server] server runtime failed: {error}");
        std::process::exit(1);
    }
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("dist/client"), PathBuf::from("client")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn board_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(json!(guard.engine.snapshot()))
}

async fn summary_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(json!({
        "sessionId": guard.session_id,
        "seed": guard.board_seed,
        "summary": guard.engine.summary(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE_SIZE);

    {
        let mut guard = state.lock().await;
        guard
            .clients
            .insert(client_id.clone(), ClientContext { tx, name: None });
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                return;
            }
        }
        // Sender dropped without a queued close: the client was removed while its queue was full.
        let _ = ws_sender
            .send(Message::Close(Some(CloseFrame {
                code: 1008,
                reason: "outbound queue overflow".into(),
            })))
            .await;
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        let raw = match message {
            Message::Text(raw) => raw.to_string(),
            Message::Binary(raw) => match String::from_utf8(raw.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    let mut guard = state.lock().await;
                    send_error(&mut guard, &client_id, "invalid utf8 message");
                    continue;
                }
            },
            Message::Close(_) => break,
            _ => continue,
        };

        let mut guard = state.lock().await;
        match parse_client_message(&raw) {
            Some(parsed) => apply_client_message(&mut guard, &client_id, parsed),
            None => send_error(&mut guard, &client_id, "invalid message"),
        }
        if !guard.clients.contains_key(&client_id) {
            break;
        }
    }

    {
        let mut guard = state.lock().await;
        disconnect_client_internal(&mut guard, &client_id);
    }
    let _ = writer.await;
}

fn apply_client_message(state: &mut ServerState, client_id: &str, message: ParsedClientMessage) {
    match message {
        ParsedClientMessage::Hello { name } => handle_hello(state, client_id, name),
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                state,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DropOnFull,
            );
        }
        other => {
            let Some(name) = client_name(state, client_id) else {
                send_error(state, client_id, "send hello first");
                return;
            };
            match other {
                ParsedClientMessage::Select { row, col } => {
                    handle_select(state, client_id, &name, row, col);
                }
                ParsedClientMessage::NewBoard { seed } => {
                    handle_new_board(state, client_id, &name, seed);
                }
                ParsedClientMessage::Hint => {
                    let hint = state.engine.hint();
                    send_to_client(
                        state,
                        client_id,
                        &json!({
                            "type": "hint",
                            "row": hint.map(|coord| coord.row),
                            "col": hint.map(|coord| coord.col),
                        }),
                        QueuePolicy::DisconnectOnFull,
                    );
                }
                ParsedClientMessage::Hello { .. } | ParsedClientMessage::Ping { .. } => {}
            }
        }
    }
}

fn handle_hello(state: &mut ServerState, client_id: &str, name: Option<String>) {
    let name = sanitize_name(name.as_deref().unwrap_or(""));
    let Some(client) = state.clients.get_mut(client_id) else {
        return;
    };
    client.name = Some(name.clone());

    state.log(
        LogLevel::Info,
        "client_joined",
        json!({ "clientId": client_id, "name": name }),
    );
    let welcome = json!({
        "type": "welcome",
        "clientId": client_id,
        "name": name,
        "snapshot": state.engine.snapshot(),
    });
    send_to_client(state, client_id, &welcome, QueuePolicy::DisconnectOnFull);
}

fn handle_select(state: &mut ServerState, client_id: &str, name: &str, row: i64, col: i64) {
    let coord = match state.engine.board().locate(row, col) {
        Ok(coord) => coord,
        Err(error) => {
            send_error(state, client_id, &error.to_string());
            return;
        }
    };

    match state.engine.handle_select(coord.row, coord.col) {
        Ok(SelectOutcome::Collapsed(report)) => {
            log_move(state, name, &report);
            let message = move_message(name, &report, state.engine.summary().moves);
            broadcast(state, &message, QueuePolicy::DisconnectOnFull);
        }
        Ok(SelectOutcome::Ignored) => {
            send_to_client(
                state,
                client_id,
                &json!({ "type": "ignored", "row": coord.row, "col": coord.col }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        Ok(SelectOutcome::Busy) => {
            send_to_client(
                state,
                client_id,
                &json!({ "type": "busy" }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        Err(error) => send_error(state, client_id, &error.to_string()),
    }
}

fn log_move(state: &ServerState, name: &str, report: &MoveReport) {
    state.log(
        LogLevel::Info,
        "move_resolved",
        json!({
            "by": name,
            "groupSize": report.group_size,
            "color": report.color,
            "eventCount": report.events.len(),
        }),
    );
    match report.shuffle {
        Some(ShuffleOutcome::Resolved { attempts }) => state.log(
            LogLevel::Info,
            "deadlock_resolved",
            json!({ "attempts": attempts }),
        ),
        Some(ShuffleOutcome::Exhausted { attempts }) => state.log(
            LogLevel::Warn,
            "deadlock_exhausted",
            json!({ "attempts": attempts }),
        ),
        None => {}
    }
}

fn move_message(name: &str, report: &MoveReport, move_count: u64) -> Value {
    json!({
        "type": "move",
        "by": name,
        "moveCount": move_count,
        "groupSize": report.group_size,
        "color": report.color,
        "shuffle": report.shuffle,
        "events": report.events,
    })
}

fn handle_new_board(state: &mut ServerState, client_id: &str, name: &str, seed: Option<u64>) {
    let seed = seed.unwrap_or_else(now_ms);
    if let Err(error) = state.engine.reset(seed) {
        state.log(
            LogLevel::Error,
            "board_reset_failed",
            json!({ "error": error.to_string() }),
        );
        send_error(state, client_id, &error.to_string());
        return;
    }
    state.board_seed = seed;
    state.log(
        LogLevel::Info,
        "board_reset",
        json!({
            "by": name,
            "initialShuffle": state.engine.initial_shuffle(),
        }),
    );
    let message = json!({
        "type": "board",
        "seed": seed,
        "snapshot": state.engine.snapshot(),
    });
    broadcast(state, &message, QueuePolicy::DisconnectOnFull);
}

fn client_name(state: &ServerState, client_id: &str) -> Option<String> {
    state.clients.get(client_id)?.name.clone()
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    let _ = context.tx.try_send(OutboundMessage::Close {
        code: 1000,
        reason: "disconnected".to_string(),
    });
    if context.name.is_some() {
        state.log(
            LogLevel::Info,
            "client_left",
            json!({ "clientId": client_id }),
        );
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_client_internal(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if client.name.is_none() {
            continue;
        }
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        disconnect_client_internal(state, &client_id);
    }
}

fn send_error(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

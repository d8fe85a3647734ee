//! In-process backend for integration tests: REST routes plus `/ws/{game_id}`.
//!
//! The backend keeps one fake game in memory. Tests push frames to every open
//! socket, force abnormal closes, and read back whatever the client sent.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

/// Fear gained per turn by the fake backend
pub const FEAR_PER_TURN: i64 = 50;

#[derive(Debug, Clone)]
enum ServerCommand {
    Send(String),
    /// Drop the TCP connection without a close handshake
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub game_id: String,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeGame {
    game_id: String,
    turn: u32,
    fear_points: i64,
    npcs: Vec<Value>,
    rules: Vec<Value>,
}

impl FakeGame {
    fn new(game_id: &str, npc_count: usize) -> Self {
        let names = ["Alice", "Bob", "Carol", "Dave", "Erin", "Frank"];
        let npcs = (0..npc_count)
            .map(|i| {
                json!({
                    "id": format!("npc_{}", i + 1),
                    "name": names[i % names.len()],
                    "hp": 100,
                    "sanity": 100,
                    "fear": 0,
                    "location": "living_room",
                    "status_effects": [],
                    "is_alive": true
                })
            })
            .collect();
        Self {
            game_id: game_id.to_string(),
            turn: 1,
            fear_points: 1000,
            npcs,
            rules: Vec::new(),
        }
    }

    fn state(&self) -> Value {
        json!({
            "game_id": self.game_id,
            "started_at": "2026-10-16T09:00:00",
            "current_turn": self.turn,
            "fear_points": self.fear_points,
            "phase": "action",
            "mode": "backstage",
            "time_of_day": "night",
            "npcs": self.npcs,
            "active_rules": self.rules.len(),
            "total_fear_gained": 0,
            "npcs_died": 0
        })
    }
}

pub struct BackendState {
    accepting: AtomicBool,
    connections: AtomicUsize,
    close_frames: AtomicUsize,
    sessions: Mutex<Vec<SessionRecord>>,
    push: broadcast::Sender<ServerCommand>,
    inbound_tx: mpsc::UnboundedSender<Value>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Value>>,
    game: Mutex<Option<FakeGame>>,
    saves: Mutex<HashMap<String, FakeGame>>,
}

pub struct TestBackend {
    pub addr: SocketAddr,
    state: Arc<BackendState>,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    pub async fn spawn() -> Self {
        let (push, _) = broadcast::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let state = Arc::new(BackendState {
            accepting: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
            close_frames: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            push,
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            game: Mutex::new(None),
            saves: Mutex::new(HashMap::new()),
        });

        let router = Router::new()
            .route("/health", get(health))
            .route("/api/games", post(create_game))
            .route("/api/games/load", post(load_game))
            .route("/api/games/{game_id}", get(get_game).delete(delete_game))
            .route("/api/games/{game_id}/turn", post(advance_turn))
            .route("/api/games/{game_id}/rules", get(list_rules).post(create_rule))
            .route("/api/games/{game_id}/npcs", get(list_npcs))
            .route("/api/games/{game_id}/save", post(save_game))
            .route("/ws/{game_id}", get(ws_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a frame to every open socket.
    pub fn push(&self, frame: Value) {
        let _ = self.state.push.send(ServerCommand::Send(frame.to_string()));
    }

    /// Kill every open socket without a close frame.
    pub fn drop_connections(&self) {
        let _ = self.state.push.send(ServerCommand::Drop);
    }

    /// Refuse (503) further WebSocket upgrades.
    pub fn set_accepting(&self, accepting: bool) {
        self.state.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Upgrades accepted so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn close_frames(&self) -> usize {
        self.state.close_frames.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.state.sessions.lock().expect("sessions").clone()
    }

    pub fn fear_points(&self) -> Option<i64> {
        self.state
            .game
            .lock()
            .expect("game")
            .as_ref()
            .map(|g| g.fear_points)
    }

    /// Wait for the next client frame matching `predicate`.
    pub async fn expect_inbound<F>(&self, timeout: Duration, mut predicate: F) -> Value
    where
        F: FnMut(&Value) -> bool,
    {
        let mut rx = self.state.inbound_rx.lock().await;
        tokio::time::timeout(timeout, async {
            loop {
                let frame = rx.recv().await.expect("inbound channel open");
                if predicate(&frame) {
                    return frame;
                }
            }
        })
        .await
        .expect("expected client frame")
    }

    /// Everything the client sent that has not been read yet.
    pub async fn drain_inbound(&self) -> Vec<Value> {
        let mut rx = self.state.inbound_rx.lock().await;
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn frame_type(frame: &Value) -> &str {
    frame["type"].as_str().unwrap_or_default()
}

// =============================================================================
// WebSocket
// =============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<BackendState>>,
) -> Response {
    if !state.accepting.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    state.connections.fetch_add(1, Ordering::SeqCst);
    state.sessions.lock().expect("sessions").push(SessionRecord {
        game_id,
        client_id: params.get("client_id").cloned(),
    });

    let commands = state.push.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, commands, state))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut commands: broadcast::Receiver<ServerCommand>,
    state: Arc<BackendState>,
) {
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) {
                        let _ = state.inbound_tx.send(frame);
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    state.close_frames.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            command = commands.recv() => match command {
                Ok(ServerCommand::Send(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(ServerCommand::Drop) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

// =============================================================================
// REST
// =============================================================================

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Game not found"})),
    )
        .into_response()
}

fn with_game<F>(state: &BackendState, game_id: &str, f: F) -> Response
where
    F: FnOnce(&mut FakeGame) -> Response,
{
    let mut game = state.game.lock().expect("game");
    match game.as_mut() {
        Some(game) if game.game_id == game_id => f(game),
        _ => not_found(),
    }
}

async fn health(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let active = usize::from(state.game.lock().expect("game").is_some());
    Json(json!({
        "status": "healthy",
        "timestamp": "2026-10-16T09:00:00",
        "active_games": active
    }))
}

async fn create_game(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Response {
    let npc_count = body["npc_count"].as_u64().unwrap_or(4) as usize;
    if !(2..=6).contains(&npc_count) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"loc": ["body", "npc_count"], "msg": "out of range"}]})),
        )
            .into_response();
    }

    let game = FakeGame::new("game_1", npc_count);
    let response = game.state();
    *state.game.lock().expect("game") = Some(game);
    Json(response).into_response()
}

async fn get_game(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
) -> Response {
    with_game(&state, &game_id, |game| Json(game.state()).into_response())
}

async fn delete_game(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
) -> Response {
    let mut game = state.game.lock().expect("game");
    match game.as_ref() {
        Some(g) if g.game_id == game_id => {
            *game = None;
            Json(json!({"message": format!("Game {game_id} deleted")})).into_response()
        }
        _ => not_found(),
    }
}

/// Pushes the new state over the socket before answering, like the real backend.
async fn advance_turn(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
) -> Response {
    let push = state.push.clone();
    with_game(&state, &game_id, |game| {
        game.turn += 1;
        game.fear_points += FEAR_PER_TURN;

        let frame = json!({"type": "state", "data": game.state()});
        let _ = push.send(ServerCommand::Send(frame.to_string()));

        Json(json!({
            "turn": game.turn,
            "events": [
                {"type": "npc_action", "npc_id": "npc_1", "description": "Alice checks the locked door"},
                {"type": "fear_gained", "amount": FEAR_PER_TURN}
            ],
            "fear_gained": FEAR_PER_TURN,
            "npcs_affected": ["npc_1"],
            "rules_triggered": [],
            "narrative": "The house creaks."
        }))
        .into_response()
    })
}

async fn create_rule(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let push = state.push.clone();
    with_game(&state, &game_id, |game| {
        let cost = body["cost"].as_i64().unwrap_or(0);
        if cost > game.fear_points {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Insufficient fear points"})),
            )
                .into_response();
        }

        game.fear_points -= cost;
        let rule_id = format!("rule_{}", game.rules.len() + 1);
        let rule = json!({
            "id": rule_id,
            "name": body["name"],
            "description": body["description"],
            "level": 1,
            "cost": cost,
            "is_active": true,
            "times_triggered": 0,
            "loopholes": []
        });
        game.rules.push(rule.clone());

        let frame = json!({"type": "rule", "data": {"action": "created", "rule": rule}});
        let _ = push.send(ServerCommand::Send(frame.to_string()));

        Json(json!({"rule_id": rule_id, "cost": cost})).into_response()
    })
}

async fn list_rules(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
) -> Response {
    with_game(&state, &game_id, |game| Json(json!(game.rules)).into_response())
}

async fn list_npcs(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
) -> Response {
    with_game(&state, &game_id, |game| Json(json!(game.npcs)).into_response())
}

async fn save_game(
    State(state): State<Arc<BackendState>>,
    Path(game_id): Path<String>,
) -> Response {
    let saved = {
        let game = state.game.lock().expect("game");
        match game.as_ref() {
            Some(g) if g.game_id == game_id => g.clone(),
            _ => return not_found(),
        }
    };
    let filename = format!("{game_id}_turn{}.json", saved.turn);
    state
        .saves
        .lock()
        .expect("saves")
        .insert(filename.clone(), saved);
    Json(json!({"filename": filename, "message": "Game saved"})).into_response()
}

async fn load_game(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(filename) = params.get("filename") else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "filename is required"})),
        )
            .into_response();
    };
    let Some(game) = state.saves.lock().expect("saves").get(filename).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Save file not found"})),
        )
            .into_response();
    };
    let response = game.state();
    *state.game.lock().expect("game") = Some(game);
    Json(response).into_response()
}

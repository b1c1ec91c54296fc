//! Mock bot API for integration tests.
//!
//! Serves the read endpoints the console uses and the flatten command,
//! counting requests per endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct ApiState {
    pub mode: Mutex<String>,
    pub flattened: AtomicBool,
    pub positions_down: AtomicBool,
    pub orders: Mutex<Vec<Value>>,
    pub status_gets: AtomicUsize,
    pub positions_gets: AtomicUsize,
    pub orders_gets: AtomicUsize,
    pub flatten_posts: AtomicUsize,
}

/// A mock request/response API for testing.
pub struct MockApi {
    addr: SocketAddr,
    pub state: Arc<ApiState>,
}

impl MockApi {
    /// Start the API on an available port with the bot in `mode`.
    pub async fn start(mode: &str) -> Self {
        let state = Arc::new(ApiState::default());
        *state.mode.lock().unwrap() = mode.to_string();

        let app = Router::new()
            .route("/api/status", get(status))
            .route("/api/positions", get(positions))
            .route("/api/orders", get(orders))
            .route("/api/positions/flatten", post(flatten))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn positions_gets(&self) -> usize {
        self.state.positions_gets.load(Ordering::SeqCst)
    }

    pub fn orders_gets(&self) -> usize {
        self.state.orders_gets.load(Ordering::SeqCst)
    }

    pub fn flatten_posts(&self) -> usize {
        self.state.flatten_posts.load(Ordering::SeqCst)
    }

    /// Make `/api/positions` answer 502 until turned back on.
    pub fn set_positions_down(&self, down: bool) {
        self.state.positions_down.store(down, Ordering::SeqCst);
    }

    /// Record a new order as the bot would after a fill.
    pub fn add_order(&self, order: Value) {
        self.state.orders.lock().unwrap().push(order);
    }
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<Value> {
    state.status_gets.fetch_add(1, Ordering::SeqCst);
    let mode = state.mode.lock().unwrap().clone();
    Json(json!({ "mode": mode, "running": true, "uptime_seconds": 3600 }))
}

async fn positions(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    state.positions_gets.fetch_add(1, Ordering::SeqCst);
    if state.positions_down.load(Ordering::SeqCst) {
        return Err((StatusCode::BAD_GATEWAY, "bad"));
    }
    if state.flattened.load(Ordering::SeqCst) {
        return Ok(Json(json!({ "positions": [] })));
    }
    Ok(Json(json!({ "positions": [
        {
            "id": "p1",
            "condition_id": "0xaaa",
            "token_id": "tok-1",
            "market_question": "Will it rain tomorrow?",
            "side": "buy",
            "size": "100",
            "entry_price": "0.40",
            "current_price": "0.55"
        },
        {
            "id": "p2",
            "condition_id": "0xbbb",
            "token_id": "tok-2",
            "market_question": "Will the match go to overtime?",
            "side": "sell",
            "size": "100",
            "entry_price": "0.60",
            "current_price": "0.55"
        }
    ]})))
}

async fn orders(State(state): State<Arc<ApiState>>) -> Json<Value> {
    state.orders_gets.fetch_add(1, Ordering::SeqCst);
    let orders = state.orders.lock().unwrap().clone();
    Json(json!({ "orders": orders }))
}

async fn flatten(State(state): State<Arc<ApiState>>, Json(body): Json<Value>) -> Json<Value> {
    state.flatten_posts.fetch_add(1, Ordering::SeqCst);
    assert!(body.get("reason").is_some());
    state.flattened.store(true, Ordering::SeqCst);
    Json(json!({ "success": true, "closed_count": 2 }))
}

#![allow(dead_code)]
//! In-process key-value store speaking the `/store/{id}` contract.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use kvprobe::config::TargetConfig;

#[derive(Debug, Deserialize)]
struct ValueBody {
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Clone, Default)]
pub struct StoreState {
    values: Arc<RwLock<HashMap<String, String>>>,
    requests: Arc<AtomicU64>,
}

impl StoreState {
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }
}

async fn get_value(State(state): State<StoreState>, Path(id): Path<String>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    match state.values.read().await.get(&id) {
        Some(value) => {
            let body = HashMap::from([(id.clone(), value.clone())]);
            (StatusCode::OK, Json(body)).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("ID not found : '{id}'.")).into_response(),
    }
}

async fn create_value(
    State(state): State<StoreState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let parsed: ValueBody = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("Error while parsing request body : {e}"))
                .into_response()
        }
    };
    if parsed.value.is_empty() {
        return (StatusCode::BAD_REQUEST, "Value is empty.").into_response();
    }

    let mut values = state.values.write().await;
    if values.contains_key(&id) {
        return (StatusCode::CONFLICT, "ID already exists.").into_response();
    }
    values.insert(id, parsed.value);
    StatusCode::OK.into_response()
}

async fn delete_value(State(state): State<StoreState>, Path(id): Path<String>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    match state.values.write().await.remove(&id) {
        Some(_) => StatusCode::OK.into_response(),
        None => (StatusCode::NOT_FOUND, format!("ID not found : '{id}'.")).into_response(),
    }
}

/// Bind the store on an ephemeral port and serve it in the background.
pub async fn spawn_store() -> (TargetConfig, StoreState) {
    let state = StoreState::default();
    let app = Router::new()
        .route(
            "/store/:id",
            get(get_value).post(create_value).delete(delete_value),
        )
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind store");
    let addr = listener.local_addr().expect("store addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("store server");
    });

    let cfg = TargetConfig {
        base_url: format!("http://{addr}"),
        request_timeout_ms: Some(5_000),
    };
    (cfg, state)
}

pub fn target_for(base_url: String) -> TargetConfig {
    TargetConfig {
        base_url,
        request_timeout_ms: Some(5_000),
    }
}

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use quarry_core::tokenizer::tokenize;
use quarry_core::{open_index, QueryResult, TfIndex};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const INDEX_JS: &str = include_str!("../assets/index.js");
const LOGO_PNG: &[u8] = include_bytes!("../assets/logo.png");

/// Results returned when the request does not ask for an explicit count.
const DEFAULT_TOP_N: usize = 10;

#[derive(Deserialize)]
struct SearchRequest {
    search: String,
    #[serde(default, rename = "topN")]
    top_n: usize,
}

#[derive(Clone)]
struct AppState {
    index: Arc<Mutex<Box<dyn TfIndex>>>,
}

/// Build the HTTP application around the index at `db_path`. Opening the
/// index happens up front, so `serve` never starts on an index it cannot
/// read.
pub fn build_app(db_path: &Path) -> Result<Router> {
    let index = open_index(db_path)?;
    let state = AppState {
        index: Arc::new(Mutex::new(index)),
    };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = Router::new()
        .route("/", get(index_page))
        .route("/index", get(index_page))
        .route("/index.js", get(index_script))
        .route("/logo.png", get(logo))
        .route("/api/search", post(api_search))
        .with_state(state)
        .layer(cors);
    Ok(app)
}

/// Bind `addr` and serve the application until the process is stopped.
pub async fn serve(db_path: &Path, addr: SocketAddr) -> Result<()> {
    let app = build_app(db_path)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind to {addr}"))?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .await
        .context("server stopped unexpectedly")?;
    Ok(())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn index_script() -> ([(HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "text/javascript")], INDEX_JS)
}

async fn logo() -> ([(HeaderName, &'static str); 1], &'static [u8]) {
    ([(header::CONTENT_TYPE, "image/png")], LOGO_PNG)
}

/// `POST /api/search`: run the query text through the same tokenization
/// pipeline used at indexing time and answer the ranked results as a JSON
/// array of `{"docId", "score"}`.
async fn api_search(
    State(state): State<AppState>,
    request: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<QueryResult>>, (StatusCode, String)> {
    let Json(request) = request.map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    let top_n = if request.top_n == 0 {
        DEFAULT_TOP_N
    } else {
        request.top_n
    };
    let tokens = tokenize(&request.search);
    let results = state
        .index
        .lock()
        .query_top_n(&tokens, top_n)
        .map_err(|err| {
            tracing::error!(error = %err, "search failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        })?;
    Ok(Json(results))
}

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vsearch_core::{DocId, IndexPaths, Manifest, QueryMode, SearchConfig, SearchEngine};

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Comma-separated doc ids known to be relevant.
    #[serde(default)]
    pub relevant: Option<String>,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: QueryMode,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Serialize)]
pub struct TermResponse {
    pub term: String,
    pub document_frequency: u32,
    pub postings: Vec<TermPosting>,
}

#[derive(Serialize)]
pub struct TermPosting {
    pub doc_id: DocId,
    pub weight: f64,
    pub positions: Vec<u32>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub num_docs: u32,
    pub num_blocks: usize,
    pub manifest: Option<Manifest>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

pub fn build_app(paths: IndexPaths, config: SearchConfig) -> Result<Router> {
    let engine = SearchEngine::open(paths, config)?;
    tracing::info!(
        num_docs = engine.handle().num_docs(),
        blocks = engine.handle().num_blocks(),
        "index opened"
    );
    let app_state = AppState { engine: Arc::new(engine) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/term/:term", get(term_handler))
        .route("/stats", get(stats_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn parse_relevant(raw: Option<&str>) -> Result<Vec<DocId>, ApiError> {
    let Some(raw) = raw else { return Ok(Vec::new()) };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid doc id {s:?}"))))
        .collect()
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let relevant = parse_relevant(params.relevant.as_deref())?;
    let k = params.k.clamp(1, 100);
    let engine = Arc::clone(&state.engine);
    let query = params.q.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.search_with(&query, &relevant, k))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    let total_hits = outcome.total_hits;
    let results = outcome
        .hits
        .into_iter()
        .take(k)
        .map(|h| SearchHit { doc_id: h.doc_id, score: h.score })
        .collect();
    Ok(Json(SearchResponse {
        query: params.q,
        mode: outcome.mode,
        took_s: start.elapsed().as_secs_f64(),
        total_hits,
        results,
    }))
}

/// Postings of one index term, looked up exactly as stored.
pub async fn term_handler(State(state): State<AppState>, Path(term): Path<String>) -> Result<Json<TermResponse>, ApiError> {
    let engine = Arc::clone(&state.engine);
    let lookup = term.clone();
    let list = tokio::task::spawn_blocking(move || -> vsearch_core::Result<_> {
        let mut reader = engine.handle().reader()?;
        reader.postings(&lookup)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;
    if list.is_empty() {
        return Err((StatusCode::NOT_FOUND, format!("term {term:?} not in index")));
    }
    Ok(Json(TermResponse {
        term,
        document_frequency: list.document_frequency(),
        postings: list
            .postings
            .into_iter()
            .map(|p| TermPosting { doc_id: p.doc_id, weight: p.weight, positions: p.positions })
            .collect(),
    }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let handle = state.engine.handle();
    Json(StatsResponse {
        num_docs: handle.num_docs(),
        num_blocks: handle.num_blocks(),
        manifest: handle.manifest().cloned(),
    })
}

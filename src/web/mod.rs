mod handlers;
pub mod render;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::gemini::{GeminiClient, GeminiEmbedder};
use crate::search::{ReviewSearcher, TavilyClient};
use crate::store::VectorStore;
use session::SessionStore;

pub use handlers::{MODEL_UNAVAILABLE, SEARCH_UNAVAILABLE};

/// Screenshots routinely exceed axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub type CourseIndex = VectorStore<GeminiEmbedder>;

/// Shared state injected into every handler. A `None` client means its
/// credentials were missing at startup; `warnings` says which.
#[derive(Debug, Default)]
pub struct AppState {
    pub model: Option<GeminiClient>,
    pub searcher: Option<ReviewSearcher<TavilyClient>>,
    pub catalog: Option<RwLock<CourseIndex>>,
    pub warnings: Vec<String>,
    pub sessions: SessionStore,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/profile", post(handlers::save_profile))
        .route("/profile/skip", post(handlers::skip_profile))
        .route("/profile/reset", post(handlers::reset_profile))
        .route("/preferences", post(handlers::update_preferences))
        .route("/courses/parse", post(handlers::parse_text))
        .route("/courses/screenshot", post(handlers::parse_screenshot))
        .route("/courses/analyze", post(handlers::analyze))
        .route("/courses/recommend", post(handlers::recommend))
        .route("/catalog/search", post(handlers::catalog_search))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await
}

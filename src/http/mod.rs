//! # HTTP surface
//!
//! ```text
//! GET /health                     liveness, never limited
//! GET /api/v1/contacts/           listing  (rate limited)
//! GET /api/v1/contacts/{id}/      detail   (rate limited)
//! ```

mod error;
mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::listing::PageResponse;
use crate::query::QueryParams;
use crate::ratelimit::RateLimiter;
use crate::storage::StorageBackend;
use crate::{Config, ContactDetail, ContactId, Directory, Error, Result};

pub use error::ApiError;
pub use middleware::{client_id, rate_limit};

pub const CONTACTS_PATH: &str = "/api/v1/contacts/";

/// Shared handler state.
pub struct AppState<B: StorageBackend> {
    pub directory: Arc<Directory<B>>,
    pub limiter: Arc<RateLimiter>,
}

impl<B: StorageBackend> AppState<B> {
    pub fn new(directory: Directory<B>, limiter: RateLimiter) -> Self {
        Self {
            directory: Arc::new(directory),
            limiter: Arc::new(limiter),
        }
    }
}

impl<B: StorageBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

pub fn router<B: StorageBackend>(state: AppState<B>) -> Router {
    let api = Router::new()
        .route(CONTACTS_PATH, get(list_contacts::<B>))
        .route("/api/v1/contacts/{id}/", get(contact_detail::<B>))
        .layer(from_fn_with_state(Arc::clone(&state.limiter), rate_limit));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_contacts<B: StorageBackend>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    uri: Uri,
) -> std::result::Result<Json<PageResponse>, ApiError> {
    let params = QueryParams::parse(uri.query().unwrap_or_default());
    let listing = state.directory.list(&params).await?;
    let base = base_url(&headers, uri.path());
    Ok(Json(listing.into_response(&base, &params)))
}

async fn contact_detail<B: StorageBackend>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> std::result::Result<Json<ContactDetail>, ApiError> {
    let id: ContactId = id
        .parse()
        .map_err(|_| Error::NotFound(format!("Contact {id}")))?;
    Ok(Json(state.directory.detail(id).await?))
}

/// Absolute URL of the request path when a `Host` header is present, the
/// bare path otherwise.
fn base_url(headers: &HeaderMap, path: &str) -> String {
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path.to_owned(),
    }
}

/// Bind, start the limiter pruning task and serve until Ctrl-C.
pub async fn serve<B: StorageBackend>(config: &Config, directory: Directory<B>) -> Result<()> {
    let state = AppState::new(directory, RateLimiter::new(config.rate_limits.clone()));
    spawn_pruner(Arc::clone(&state.limiter), Duration::from_secs(config.prune_interval_secs));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, rules = config.rate_limits.len(), "listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

fn spawn_pruner(limiter: Arc<RateLimiter>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let forgotten = limiter.prune();
            if forgotten > 0 {
                tracing::debug!(forgotten, "pruned rate limit log");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

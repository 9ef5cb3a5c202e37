//! # Podcast HTTP Server
//!
//! Serves the feed document and the audio files it points at.
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `/`, `/rss.xml` | Current feed document (`text/xml`, never cached) |
//! | `/<file>` | Audio file from the audio directory (`audio/mpeg`), else 404 |
//!
//! Anything else, including `HEAD` and other methods, is a 404.
//!
//! ## Concurrency
//!
//! Each connection is its own task. Feed requests only clone a reference
//! counted buffer out of the shared slot; downloads stream from disk in chunks, so a slow
//! client holds nothing but its own file handle.

mod files;
mod regenerate;
mod slot;

pub use files::{resolve_episode_path, ServeError};
pub use regenerate::{RegenerateError, Regenerator};
pub use slot::{feed_slot, FeedPublisher, FeedReader};

use axum::{
    body::Body,
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    feed: FeedReader,
    /// Canonical audio directory; downloads must resolve inside it.
    audio_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(feed: FeedReader, audio_root: PathBuf) -> Self {
        Self {
            feed,
            audio_root: Arc::new(audio_root),
        }
    }
}

/// Builds the router with all endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get_only(get(handle_feed)))
        .route("/rss.xml", get_only(get(handle_feed)))
        .route("/{*file}", get_only(get(handle_episode)))
        .fallback(not_found)
        .with_state(state)
}

/// `get` also answers `HEAD` unless a `HEAD` handler is registered.
fn get_only(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.head(not_found).fallback(not_found)
}

/// Serves requests on `listener` until `shutdown` is cancelled.
///
/// After cancellation no new connections are accepted and in-flight
/// requests get `grace` to finish. Connections still open after that,
/// such as a paused download, are abandoned so shutdown cannot stall.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = shutdown.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs_f64(),
                "Connections still open after shutdown grace period, closing"
            );
            Ok(())
        }
    }
}

/// Handles `/` and `/rss.xml`.
async fn handle_feed(State(state): State<AppState>) -> Response {
    let xml = state.feed.current();
    tracing::debug!(bytes = xml.len(), "Serving feed");
    (
        [
            (header::CONTENT_TYPE, "text/xml"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from(xml),
    )
        .into_response()
}

/// Handles `/<file>` by streaming the file from the audio directory.
async fn handle_episode(
    State(state): State<AppState>,
    file: Result<Path<String>, PathRejection>,
) -> Response {
    // Undecodable paths (invalid UTF-8 after percent-decoding) are not files we serve
    let Ok(Path(requested)) = file else {
        return not_found().await;
    };

    let path = match resolve_episode_path(&state.audio_root, &requested).await {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(requested = %requested, reason = %e, "Episode request rejected");
            return not_found().await;
        }
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open episode");
            return not_found().await;
        }
    };
    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to stat episode");
            return not_found().await;
        }
    };

    tracing::debug!(path = %path.display(), bytes = len, "Serving episode");
    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CONTENT_LENGTH, len.to_string())
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "File not found").into_response()
}

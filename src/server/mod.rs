//! HTTP surface: the axum router and the serve loop.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/upload` | convert a presentation, store PDF + slides |
//! | GET | `/slides/{folder}/{filename}` | URL of a stored slide |
//! | GET | `/pdf/{filename}` | URL of a stored PDF |
//! | POST | `/screenshot` | store + transcribe a screenshot |
//! | POST | `/trans_quiz/get_questions` | quiz from a transcript |
//! | GET | `/healthz` | backend summary |
//! | GET | `/files/*` | stored objects (local storage only) |

mod handlers;

use crate::service::SlideService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Multipart framing and text fields on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: SlideService,
}

/// Build the application router.
pub fn router(service: SlideService) -> Router {
    let body_limit = service
        .config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let files = service.local_root().map(ServeDir::new);

    let mut router = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/slides/{folder}/{filename}", get(handlers::get_slide))
        .route("/pdf/{filename}", get(handlers::get_pdf))
        .route("/screenshot", post(handlers::screenshot))
        .route("/trans_quiz/get_questions", post(handlers::quiz))
        .route("/healthz", get(handlers::health));

    if let Some(files) = files {
        router = router.nest_service("/files", files);
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(AppState { service })
}

/// Bind `address` and serve until `shutdown` resolves.
pub async fn serve<F>(service: SlideService, address: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

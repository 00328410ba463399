pub mod handlers;
pub mod state;

use crate::{
    config::Config,
    error::ProxyError,
    hls::rewrite::{PLAYLIST_ROUTE, SEGMENT_ROUTE},
};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Response},
    routing::get,
};
use state::AppState;
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use tracing::{error, info, warn};

/// Route serving direct (non-HLS) video files.
pub const VIDEO_ROUTE: &str = "/proxy/video";

/// Build the application router from configuration.
pub fn build_router(config: Config) -> Result<Router, reqwest::Error> {
    Ok(router(AppState::new(config)?))
}

/// Build the application router around an existing state.
pub fn router(state: AppState) -> Router {
    let cors_layer = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::HEAD,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(cors::Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .route(PLAYLIST_ROUTE, get(handlers::proxy::proxy_playlist))
        .route(SEGMENT_ROUTE, get(handlers::proxy::proxy_segment))
        .route(VIDEO_ROUTE, get(handlers::proxy::proxy_video))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::SERVER,
            HeaderValue::from_static("hls-proxy"),
        ))
        .layer(cors_layer)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// Turn a handler panic into the usual JSON error envelope.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!("Handler panicked: {}", detail);

    ProxyError::Internal("internal server error".to_string()).into_response()
}

/// Start the Axum HTTP server and run until Ctrl-C or SIGTERM.
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    warn!(
        "TLS certificate verification is DISABLED for upstream requests; \
         origins are trusted regardless of their certificates"
    );

    let state = AppState::new(config)?;
    let addr = state.config.bind_addr();
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}

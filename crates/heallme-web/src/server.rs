//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::api::{self, AppState};

/// Build the full axum router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::root))
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login))
        .route("/dashboard/quote", get(api::quote))
        .route("/dashboard/analyze-symptoms", post(api::analyze_symptoms))
        .route("/dashboard/recommendations", post(api::recommendations))
        .route("/dashboard/analyze-health", post(api::analyze_health))
        .route("/dashboard/emergency", post(api::emergency))
        .route("/chat/ask", post(api::chat))
        .route(
            "/health-data",
            post(api::create_health_record).get(api::list_health_records),
        )
        .with_state(state)
        .layer(cors)
}

/// Bind and serve on a background task. Returns the bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Server stopped: {e}");
        }
    });

    Ok(addr)
}

/// Bind and serve until Ctrl-C.
pub async fn serve_until_shutdown(router: Router, bind_addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down");
            }
        })
        .await
}

//! REST API for the HealLLMe health assistant.
//!
//! `heallme-web` exposes the [`Orchestrator`](heallme::Orchestrator)
//! operations over HTTP, alongside account registration, bearer-token login,
//! stored health records and per-user chat history.
//!
//! # Quick start
//!
//! ```ignore
//! use heallme::{Orchestrator, ServiceConfig};
//! use heallme_web::{AppState, WebConfig, spawn_web};
//!
//! let orchestrator = Orchestrator::new(&ServiceConfig::from_env()?)?;
//! let addr = spawn_web(AppState::new(orchestrator), WebConfig::default()).await?;
//! println!("API: http://{addr}");
//! ```
//!
//! # Routes
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | GET  | `/` | no |
//! | POST | `/auth/register` | no |
//! | POST | `/auth/login` | no |
//! | GET  | `/dashboard/quote` | no |
//! | POST | `/dashboard/analyze-symptoms` | bearer |
//! | POST | `/dashboard/recommendations` | bearer |
//! | POST | `/dashboard/analyze-health` | bearer |
//! | POST | `/dashboard/emergency` | bearer |
//! | POST | `/chat/ask` | bearer |
//! | POST, GET | `/health-data` | bearer |

pub mod api;
pub mod auth;
pub mod error;
mod server;
pub mod store;

pub use api::AppState;
pub use auth::Authenticator;
pub use error::ApiError;
pub use server::build_router;
pub use store::{HealthRecordStore, HistoryStore, MemoryStore, StoreError, UserStore};

use std::net::SocketAddr;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:8000`.
    pub bind_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(state: AppState, config: WebConfig) -> std::io::Result<SocketAddr> {
    let router = server::build_router(state);
    server::start_server(router, config.bind_addr).await
}

/// Serve in the foreground until Ctrl-C.
pub async fn run_web(state: AppState, config: WebConfig) -> std::io::Result<()> {
    let router = server::build_router(state);
    server::serve_until_shutdown(router, config.bind_addr).await
}

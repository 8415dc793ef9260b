//! Steeple Server - HTTP API for the relay fleet.
//!
//! ## Endpoints
//!
//! - `GET /proxies` - filtered, paginated listing
//! - `POST /proxies` - create a proxy
//! - `GET /proxies/{id}` - fetch one proxy
//! - `PUT /proxies/{id}` - merge a partial update
//! - `DELETE /proxies/{id}` - soft delete
//! - `GET /proxies/{id}/bandwidth` - per-proxy bandwidth series
//! - `GET /analytics/detailed` - full report
//! - `GET /analytics/usage` - usage-scoped report
//! - `GET /analytics/costs` - cost report with breakdown
//! - `POST /analytics/export` - format a report payload
//!
//! ## Example
//!
//! ```no_run
//! use steeple_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default()).await.unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use steeple_storage::Database;

pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 48970;

/// Default server host (localhost only; put a real ingress in front).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 48970).
    pub port: u16,
    /// Database path (None = in-memory).
    pub db_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
        }
    }
}

impl ServerConfig {
    /// Creates a config with a specific database path.
    pub fn with_db_path(path: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: Some(path.into()),
        }
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] steeple_storage::StorageError),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> std::result::Result<Self, ServerError> {
        let db = if let Some(ref path) = config.db_path {
            Database::with_path(path)?
        } else {
            Database::in_memory()?
        };

        Self::with_database(config, db)
    }

    /// Creates a server with an existing database.
    pub fn with_database(
        config: ServerConfig,
        db: Database,
    ) -> std::result::Result<Self, ServerError> {
        Self::with_state(config, AppState::new(db))
    }

    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let router = build_router(state);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {e}")))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Steeple API server on {}", self.addr);

        // SO_REUSEADDR so a restart can rebind past lingering sockets.
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

fn build_router(state: AppState) -> Router {
    // CORS for the admin dashboard; auth lives in front of this service.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/proxies",
            get(handlers::list_proxies).post(handlers::create_proxy),
        )
        .route(
            "/proxies/{id}",
            get(handlers::get_proxy)
                .put(handlers::update_proxy)
                .delete(handlers::delete_proxy),
        )
        .route("/proxies/{id}/bandwidth", get(handlers::proxy_bandwidth))
        .route("/analytics/detailed", get(handlers::detailed_analytics))
        .route("/analytics/usage", get(handlers::usage_analytics))
        .route("/analytics/costs", get(handlers::cost_analytics))
        .route("/analytics/export", post(handlers::export_analytics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! # tessera-server
//!
//! HTTP surface of Tessera. Callers identify themselves with the
//! `X-Tessera-User` header; every endpoint except `healthz` resolves that
//! user's roles from the catalog before doing anything else.
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `POST /get-sql` | question → SQL over the caller's virtual schema |
//! | `POST /execute-sql` | rewrite, run and page a statement |
//! | `GET /get-tables/{id}` | visible tables and columns |
//! | `GET /get-datasources` | enabled data sources |
//! | `GET /get-user-details` | the caller and its roles |
//! | `POST /admin/reload-catalog` | re-read the catalog file |
//! | `GET /healthz` | liveness |

pub mod error;
pub mod handlers;
pub mod identity;
pub mod routes;
pub mod service;
pub mod state;

pub use error::ApiError;
pub use identity::{Caller, USER_HEADER};
pub use routes::create_router;
pub use state::{Admins, AppState};

use anyhow::Context;
use tessera_core::TesseraConfig;

/// Bind `config.server.bind` and serve until Ctrl-C.
pub async fn serve(config: &TesseraConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(address = %config.server.bind, "tessera-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

/// Initialise `tracing` with `default_filter`, overridden by `RUST_LOG`.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

//! API error type and its JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tessera_adapter_sql::{ExecutionError, IntrospectError};
use tessera_audit::AuditError;
use tessera_core::{CatalogError, StoreError};
use tessera_policy::PolicyError;
use tessera_rls::RewriteError;
use thiserror::Error;

/// Errors returned by request handlers.
///
/// Failures of a request stage are reported with `200 OK` and an error
/// body, like successful results; only identity and internal failures use
/// other status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No Datasource found.")]
    NoDatasource,

    #[error("missing X-Tessera-User header")]
    Unauthorized,

    #[error("caller is not an administrator")]
    Forbidden,

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("no catalog file configured")]
    NoCatalogFile,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Introspect(#[from] IntrospectError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NoDatasource | Self::Rewrite(_) | Self::Execution(_) => StatusCode::OK,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NoCatalogFile | Self::Catalog(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Policy(_) | Self::Introspect(_) | Self::Store(_) | Self::Audit(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let mut body = json!({
            "status": "error",
            "error": self.to_string(),
        });
        if let Self::Rewrite(err) = &self {
            if let Some(identifier) = err.identifier() {
                body["identifier"] = json!(identifier);
            }
        }
        (status, Json(body)).into_response()
    }
}

//! HTTP handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tessera_core::{DataSourceId, PolicyStore};
use tessera_pipeline::LlmResponse;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSqlRequest {
    pub datasource_id: i64,
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteSqlRequest {
    pub datasource_id: i64,
    pub sql: String,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "tessera-server" }))
}

pub async fn get_sql(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<GetSqlRequest>,
) -> Result<Json<LlmResponse>, ApiError> {
    let response = state
        .generate_sql(&caller, DataSourceId(request.datasource_id), request.prompt)
        .await?;
    Ok(Json(response))
}

pub async fn execute_sql(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<ExecuteSqlRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .execute_sql(
            &caller,
            DataSourceId(request.datasource_id),
            &request.sql,
            request.page.unwrap_or(1),
            request.page_size.unwrap_or(state.default_page_size),
        )
        .await?;
    Ok(Json(json!({ "status": "success", "table_data": result })))
}

pub async fn get_tables(
    State(state): State<AppState>,
    caller: Caller,
    Path(datasource_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let tables = state
        .table_listing(&caller, DataSourceId(datasource_id))
        .await?;
    Ok(Json(json!({ "table_data": tables })))
}

pub async fn get_datasources(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Value>, ApiError> {
    let datasources: Vec<Value> = state
        .store
        .data_sources()
        .await?
        .into_iter()
        .filter(|ds| ds.enabled)
        .map(|ds| json!({ "id": ds.id.0, "name": ds.display_name }))
        .collect();
    Ok(Json(json!({ "datasources": datasources })))
}

pub async fn get_user_details(caller: Caller) -> Json<Value> {
    Json(json!({ "username": caller.username, "roles": caller.roles }))
}

pub async fn reload_catalog(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Value>, ApiError> {
    if !state.admins.allows(&caller) {
        tracing::warn!(user = %caller.username, "Catalog reload refused");
        return Err(ApiError::Forbidden);
    }
    let count = state.reload_catalog().await?;
    Ok(Json(json!({ "status": "success", "datasources": count })))
}

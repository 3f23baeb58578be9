//! The request stages behind each endpoint.
//!
//! Every operation short-circuits: the first failing stage's error is
//! returned and later stages never run.

use serde::Serialize;
use tessera_adapter_sql::PagedResult;
use tessera_core::{Catalog, DataSource, DataSourceId, PolicyStore};
use tessera_pipeline::{LlmResponse, PipelineRequest, llm_response};
use tessera_rls::VirtualSchema;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct TableListing {
    pub table_name: String,
    pub column_data: Vec<ColumnListing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnListing {
    pub name: String,
    pub data_type: String,
}

impl AppState {
    /// The enabled data source `id`.
    pub async fn data_source(&self, id: DataSourceId) -> Result<DataSource, ApiError> {
        self.store
            .enabled_data_source(id)
            .await?
            .ok_or(ApiError::NoDatasource)
    }

    /// The caller's restricted view of `data_source`.
    pub async fn virtual_schema(
        &self,
        data_source: &DataSource,
        caller: &Caller,
    ) -> Result<VirtualSchema, ApiError> {
        let policy = self.resolver.resolve(data_source.id, &caller.roles).await?;
        let physical = self.introspector.physical_schema(data_source).await?;
        Ok(VirtualSchema::build(data_source.kind, &physical, &policy))
    }

    /// Turn `question` into SQL over the caller's virtual schema.
    pub async fn generate_sql(
        &self,
        caller: &Caller,
        data_source_id: DataSourceId,
        question: String,
    ) -> Result<LlmResponse, ApiError> {
        let data_source = self.data_source(data_source_id).await?;
        let schema = self.virtual_schema(&data_source, caller).await?;

        let request = PipelineRequest {
            user: caller.username.clone(),
            question,
            db_schema: schema.to_ddl(),
            data_source,
        };
        let response = llm_response(self.models.as_ref(), &self.pipeline, &self.audit, request).await;

        if let LlmResponse::Success { generated_sql } = &response {
            self.audit
                .log_generated_sql(&caller.username, generated_sql)
                .await?;
        }
        Ok(response)
    }

    /// Rewrite `sql` against the caller's virtual schema, run it and return
    /// the requested page.
    pub async fn execute_sql(
        &self,
        caller: &Caller,
        data_source_id: DataSourceId,
        sql: &str,
        page: u64,
        page_size: u64,
    ) -> Result<PagedResult, ApiError> {
        let data_source = self.data_source(data_source_id).await?;
        self.audit
            .log_user_executed_sql(&caller.username, sql)
            .await?;

        let schema = self.virtual_schema(&data_source, caller).await?;
        let native = self.rewriter.rewrite(&schema, sql)?;
        self.audit
            .log_actual_executed_sql(&caller.username, &native)
            .await?;

        tracing::debug!(
            user = %caller.username,
            data_source = data_source.id.0,
            native = %native,
            "Executing rewritten statement"
        );
        Ok(self
            .executor
            .execute(&data_source, &native, page, page_size)
            .await?)
    }

    /// Visible tables and columns under public names.
    pub async fn table_listing(
        &self,
        caller: &Caller,
        data_source_id: DataSourceId,
    ) -> Result<Vec<TableListing>, ApiError> {
        let data_source = self.data_source(data_source_id).await?;
        let schema = self.virtual_schema(&data_source, caller).await?;
        Ok(schema
            .tables()
            .iter()
            .map(|table| TableListing {
                table_name: table.name().to_string(),
                column_data: table
                    .columns()
                    .iter()
                    .map(|c| ColumnListing {
                        name: c.name().to_string(),
                        data_type: c.data_type().to_string(),
                    })
                    .collect(),
            })
            .collect())
    }

    /// Re-read the catalog file and drop every cached policy.
    pub async fn reload_catalog(&self) -> Result<usize, ApiError> {
        let path = self.catalog_file.as_ref().ok_or(ApiError::NoCatalogFile)?;
        let catalog = Catalog::from_file(path)?;
        let count = catalog.data_sources.len();

        self.store.replace(catalog)?;
        self.cache.invalidate_all();
        tracing::info!(path = %path.display(), data_sources = count, "Catalog reloaded");
        Ok(count)
    }
}

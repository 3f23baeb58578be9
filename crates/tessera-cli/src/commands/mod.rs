//! CLI command implementations.

pub mod check;
pub mod policy;
pub mod rewrite;
pub mod schema;
pub mod serve;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tessera_adapter_sql::{CatalogIntrospector, LiveIntrospector, SchemaIntrospector, SqlExecutor};
use tessera_core::{
    Catalog, DataSource, DataSourceId, IntrospectionMode, MemoryPolicyStore, PolicyStore, RoleSet,
    TesseraConfig,
};
use tessera_policy::{EffectivePolicy, PolicyResolver};
use tessera_rls::VirtualSchema;

/// Configuration and catalog loaded for an offline command.
pub struct Workspace {
    pub config: TesseraConfig,
    pub store: Arc<MemoryPolicyStore>,
}

impl Workspace {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = TesseraConfig::load_with_context(config_path)
            .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
        let catalog_file = config
            .catalog_file
            .clone()
            .context("catalog_file is required")?;
        let catalog = Catalog::from_file(&catalog_file)
            .with_context(|| format!("failed to load catalog {}", catalog_file.display()))?;
        Ok(Self {
            config,
            store: Arc::new(MemoryPolicyStore::new(catalog)),
        })
    }

    /// A data source by id, enabled or not.
    pub async fn data_source(&self, id: i64) -> Result<DataSource> {
        self.store
            .data_source(DataSourceId(id))
            .await?
            .with_context(|| format!("no data source with id {}", id))
    }

    pub async fn roles(&self, user: &str) -> Result<RoleSet> {
        Ok(self.store.user_roles(user).await?)
    }

    pub async fn policy(&self, data_source: &DataSource, roles: &RoleSet) -> Result<EffectivePolicy> {
        let resolver = PolicyResolver::new(self.store.clone());
        Ok(resolver.resolve_uncached(data_source.id, roles).await?)
    }

    pub async fn virtual_schema(&self, data_source: &DataSource, user: &str) -> Result<VirtualSchema> {
        let roles = self.roles(user).await?;
        let policy = self.policy(data_source, &roles).await?;

        let introspector: Box<dyn SchemaIntrospector> = match self.config.introspection.mode {
            IntrospectionMode::Catalog => Box::new(CatalogIntrospector::new(self.store.clone())),
            IntrospectionMode::Live => Box::new(LiveIntrospector::new(Arc::new(SqlExecutor::new(
                &self.config.execution,
            )))),
        };
        let physical = introspector.physical_schema(data_source).await?;
        Ok(VirtualSchema::build(data_source.kind, &physical, &policy))
    }
}

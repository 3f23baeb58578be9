//! Shared application state.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_adapter_sql::{
    CatalogIntrospector, LiveIntrospector, QueryExecutor, SchemaIntrospector, SqlExecutor,
};
use tessera_audit::AuditLogger;
use tessera_core::{
    Catalog, IntrospectionMode, MemoryPolicyStore, PolicyStore, ServerConfig, TesseraConfig,
};
use tessera_pipeline::{LlmFactory, ModelFactory, PipelineSettings};
use tessera_policy::{PolicyCache, PolicyResolver};
use tessera_rls::{RewriteEngine, SubqueryRewriter};

use crate::identity::Caller;

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryPolicyStore>,
    pub cache: Arc<PolicyCache>,
    pub resolver: PolicyResolver,
    pub introspector: Arc<dyn SchemaIntrospector>,
    pub rewriter: Arc<dyn RewriteEngine>,
    pub executor: Arc<dyn QueryExecutor>,
    pub models: Arc<dyn ModelFactory>,
    pub pipeline: Arc<PipelineSettings>,
    pub audit: AuditLogger,
    /// Source of `admin/reload-catalog`.
    pub catalog_file: Option<PathBuf>,
    pub default_page_size: u64,
    pub admins: Arc<Admins>,
}

/// Who may call the `admin/` routes.
#[derive(Debug, Clone, Default)]
pub struct Admins {
    pub roles: Vec<String>,
    pub users: Vec<String>,
}

impl Admins {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            roles: config.admin_roles.clone(),
            users: config.admin_users.clone(),
        }
    }

    pub fn allows(&self, caller: &Caller) -> bool {
        self.users.iter().any(|u| *u == caller.username)
            || self.roles.iter().any(|r| caller.roles.contains(r))
    }
}

impl AppState {
    /// State over `store` with the catalog introspector, the sqlx executor,
    /// the fake model and auditing disabled.
    pub fn new(store: Arc<MemoryPolicyStore>) -> Self {
        let cache = Arc::new(PolicyCache::new(true));
        let dyn_store: Arc<dyn PolicyStore> = store.clone();
        Self {
            resolver: PolicyResolver::new(dyn_store.clone()).with_cache(cache.clone()),
            introspector: Arc::new(CatalogIntrospector::new(dyn_store)),
            rewriter: Arc::new(SubqueryRewriter::new()),
            executor: Arc::new(SqlExecutor::new(&Default::default())),
            models: Arc::new(LlmFactory::new(Default::default())),
            pipeline: Arc::new(PipelineSettings::default()),
            audit: AuditLogger::disabled(),
            catalog_file: None,
            default_page_size: 25,
            admins: Arc::new(Admins::from_config(&ServerConfig::default())),
            store,
            cache,
        }
    }

    /// Build the production state described by `config`.
    pub fn from_config(config: &TesseraConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let pipeline = PipelineSettings::from_config(config)?;

        let catalog_file = config
            .catalog_file
            .clone()
            .context("catalog_file is required")?;
        let catalog = Catalog::from_file(&catalog_file)
            .with_context(|| format!("failed to load catalog {}", catalog_file.display()))?;
        let store = Arc::new(MemoryPolicyStore::new(catalog));
        let dyn_store: Arc<dyn PolicyStore> = store.clone();

        let cache = Arc::new(PolicyCache::new(config.policy_cache.enabled));
        let executor = Arc::new(SqlExecutor::new(&config.execution));
        let introspector: Arc<dyn SchemaIntrospector> = match config.introspection.mode {
            IntrospectionMode::Catalog => Arc::new(CatalogIntrospector::new(dyn_store.clone())),
            IntrospectionMode::Live => Arc::new(LiveIntrospector::new(executor.clone())),
        };

        Ok(Self {
            resolver: PolicyResolver::new(dyn_store).with_cache(cache.clone()),
            introspector,
            rewriter: Arc::new(SubqueryRewriter::new()),
            executor,
            models: Arc::new(LlmFactory::new(config.llm.clone())),
            pipeline: Arc::new(pipeline),
            audit: AuditLogger::new(&config.audit)?,
            catalog_file: Some(catalog_file),
            default_page_size: config.execution.default_page_size,
            admins: Arc::new(Admins::from_config(&config.server)),
            store,
            cache,
        })
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn RewriteEngine>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_models(mut self, models: Arc<dyn ModelFactory>) -> Self {
        self.models = models;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_admins(mut self, admins: Admins) -> Self {
        self.admins = Arc::new(admins);
        self
    }

    pub fn with_catalog_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_file = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(username: &str, roles: &[&str]) -> Caller {
        Caller {
            username: username.to_string(),
            roles: roles.iter().copied().collect(),
        }
    }

    #[test]
    fn test_admins_match_role_or_user() {
        let admins = Admins::from_config(&ServerConfig {
            admin_users: vec!["ops".to_string()],
            ..Default::default()
        });
        assert!(admins.allows(&caller("alice", &["sales", "admin"])));
        assert!(admins.allows(&caller("ops", &[])));
        assert!(!admins.allows(&caller("alice", &["sales"])));
        assert!(!admins.allows(&caller("Ops", &[])));
    }
}

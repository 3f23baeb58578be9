//! # tessera-core
//!
//! Shared types for the Tessera workspace:
//!
//! - the catalog data model (data sources, tables, columns and the selector
//!   records that restrict them per role),
//! - the read-only [`PolicyStore`] seam and its in-memory implementation,
//! - configuration loaded from `tessera.yaml`.
//!
//! Policy records are never mutated by the core. The only way the catalog
//! changes is by replacing it wholesale ([`MemoryPolicyStore::replace`]),
//! after which cached policies must be invalidated.

pub mod catalog;
pub mod config;
pub mod model;
pub mod store;

pub use catalog::{Catalog, CatalogError, CatalogFile};
pub use config::{
    AuditBackend, AuditConfig, ConfigError, ExecutionConfig, IntrospectionConfig,
    IntrospectionMode, LlmConfig, LlmProvider, ObservabilityConfig, PipelineConfig, PolicyCacheConfig, ServerConfig,
    TemplateOverrides, TesseraConfig,
};
pub use model::{
    ColumnId, DataSource, DataSourceId, DbKind, ForeignKey, PrivateColumnSelector,
    PrivateTableSelector, RoleColumnSelector, RoleRowFilter, RoleSet, RoleTableSelector, Table,
    TableColumn, TableId, TableRowFilter, User,
};
pub use store::{MemoryPolicyStore, PolicyStore, StoreError};

//! # tessera-adapter-sql
//!
//! Runs native statements against data sources through `sqlx`'s `Any`
//! driver (postgres, mysql, sqlite) and pages the results. Also provides
//! the physical schema introspectors used to build virtual schemas.

pub mod error;
pub mod executor;
pub mod introspect;
pub mod pagination;

pub use error::{ExecutionError, IntrospectError};
pub use executor::{QueryExecutor, SqlExecutor};
pub use introspect::{CatalogIntrospector, LiveIntrospector, SchemaIntrospector};
pub use pagination::{PagedResult, paginate};

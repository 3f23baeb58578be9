//! # tessera-policy
//!
//! Resolves what a set of roles may see in a data source.
//!
//! For a `(data source, role set)` pair the resolver computes:
//!
//! | Output | Rule |
//! |--------|------|
//! | visible tables | all tables, minus the global deny-list; a role include list replaces the set; role excludes are subtracted |
//! | visible columns | the same algebra, over columns of the visible tables |
//! | row filter per table | base filters AND'ed, role filters OR'ed into one clause appended last |
//!
//! Missing selectors never raise: a role without selectors sees everything
//! outside the global deny-list.

pub mod cache;
pub mod error;
pub mod filters;
pub mod resolver;

pub use cache::PolicyCache;
pub use error::PolicyError;
pub use filters::{compose_filter, compose_table_filters};
pub use resolver::{EffectivePolicy, PolicyResolver};

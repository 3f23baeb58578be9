//! # tessera-rls
//!
//! Virtual schemas and statement rewriting for Tessera.
//!
//! This crate provides functionality to:
//! - Describe the physical schema of a data source ([`PhysicalSchema`])
//! - Restrict it to an effective policy under public names ([`VirtualSchema`])
//! - Render the restricted schema as prompt DDL
//! - Rewrite statements written against the virtual schema into native SQL
//!
//! ## How It Works
//!
//! **Before (from the model, against the virtual schema):**
//! ```sql
//! SELECT Title FROM Album
//! ```
//!
//! **After (to the database):**
//! ```sql
//! SELECT Title FROM (SELECT "title" AS "Title" FROM "albums_tbl" WHERE (label = 'indie')) AS Album
//! ```
//!
//! ## Rejected Statements
//!
//! | Statement | Error |
//! |-----------|-------|
//! | table absent from the virtual schema | `UnknownTable` |
//! | `alias.column` not visible in its table | `UnknownColumn` |
//! | call to a query-executing or file function | `ForbiddenFunction` |
//! | anything but one read-only query | `NotReadOnly` / `MultipleStatements` |

pub mod error;
pub mod functions;
pub mod parser;
pub mod physical;
pub mod rewrite;
pub mod virtual_schema;

pub use error::RewriteError;
pub use parser::{SqlAnalyzer, SqlOperation};
pub use physical::{PhysicalColumn, PhysicalForeignKey, PhysicalSchema, PhysicalTable};
pub use rewrite::{FakeRewriter, RewriteEngine, SubqueryRewriter};
pub use virtual_schema::{VirtualColumn, VirtualForeignKey, VirtualSchema, VirtualTable};

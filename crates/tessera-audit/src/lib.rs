//! # tessera-audit
//!
//! Query history for Tessera.
//!
//! Every prompt sent to the language model and every statement a caller
//! submits or the gateway executes is recorded as one append-only
//! [`HistoryEntry`]. Entries are never updated or deleted.
//!
//! ## Entry Types
//!
//! | Data type | Recorded when |
//! |-----------|---------------|
//! | `user_prompt` | the prompt pipeline is constructed, with the rendered messages |
//! | `generated_sql` | `get-sql` produced a statement |
//! | `user_executed_sql` | `execute-sql` received a statement |
//! | `actual_executed_sql` | the rewritten native statement is about to run |
//!
//! ## Storage
//!
//! - **File**: JSON Lines, one entry per line, a single append per entry
//! - **Console**: one JSON line per entry on stdout
//! - **Memory**: in-process, queryable (development and tests)
//! - **Null**: discards everything
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tessera_audit::AuditLogger;
//! use tessera_core::AuditConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(&AuditConfig::default())?;
//! logger.log_generated_sql("alice", "SELECT * FROM Album").await?;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod error;
pub mod logger;
pub mod storage;

pub use entry::{HistoryDataType, HistoryEntry};
pub use error::AuditError;
pub use logger::AuditLogger;
pub use storage::{
    ConsoleStorage, FileStorage, HistoryFilter, HistoryStorage, MemoryStorage, NullStorage,
    create_storage,
};

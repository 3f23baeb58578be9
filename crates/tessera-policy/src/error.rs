//! Error types for policy resolution.

use tessera_core::StoreError;
use thiserror::Error;

/// Errors that can occur while resolving a policy.
///
/// Absent selectors are not errors; only failures of the store itself are.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

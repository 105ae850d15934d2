//! Storage abstraction for fieldscope.
//!
//! Backend crates (e.g., fieldscope-store-sqlite, fieldscope-store-memory) implement
//! these traits so the access resolver doesn't depend on any specific database
//! engine or schema details.

mod store;
mod types;

pub use store::*;
pub use types::*;

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    /// A non-deleted assignment with the same (principal, role, tier, context) exists.
    #[error("conflict")]
    Conflict,
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("backend error: {0}")]
    Backend(String),
}

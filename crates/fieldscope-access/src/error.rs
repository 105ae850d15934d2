use fieldscope_storage::StoreError;
use thiserror::Error;

/// Failures of a resolution request.
///
/// "No access" is never an error: a principal without grants resolves to an
/// empty result. These variants cover requests that are themselves wrong.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The caller explicitly asked for a scope outside the resolved grant.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A context id failed validation against the hierarchy.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Infrastructure failure from a store, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AccessError {
    /// HTTP-style status a handler would map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::AccessDenied(_) => 403,
            AccessError::InvalidScope(_) => 400,
            AccessError::Store(StoreError::NotFound) => 404,
            AccessError::Store(StoreError::Conflict) => 409,
            AccessError::Store(StoreError::Invalid(_)) => 400,
            AccessError::Store(StoreError::Backend(_)) => 500,
        }
    }
}

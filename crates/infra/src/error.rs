use thiserror::Error;
use tracing::error;

use salesflow_core::DomainError;

use crate::store::StoreError;

/// Error returned by every service operation.
///
/// Storage details never leak past this type: backend failures are logged
/// where they are converted and surface as an opaque `Internal`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A lock could not be acquired in time. Safe to retry.
    #[error("the store is busy; retry the operation")]
    Contention,

    #[error("internal error")]
    Internal,
}

impl ServiceError {
    /// Errors worth one more attempt with a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Contention | ServiceError::Domain(DomainError::Conflict(_))
        )
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(detail) => {
                ServiceError::Domain(DomainError::conflict(format!("duplicate record ({detail})")))
            }
            StoreError::LockTimeout(detail) => {
                tracing::debug!(detail = %detail, "lock timeout");
                ServiceError::Contention
            }
            StoreError::Backend(detail) => {
                error!(error = %detail, "store failure");
                ServiceError::Internal
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

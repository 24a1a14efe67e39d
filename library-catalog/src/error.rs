//! Errors reported by catalog operations.
//!
//! Every variant except [`CatalogError::Storage`] is an expected, recoverable
//! outcome that callers show to the user verbatim. Storage failures are logged
//! in full and surfaced only as a generic "operation failed".

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::record::BookId;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("book id \"{id}\" not found")]
    NotFound { id: String },

    #[error("book {id} is already issued to {borrower} since {issued_at}")]
    AlreadyIssued {
        id: BookId,
        borrower: String,
        issued_at: String,
    },

    #[error("book {id} is not issued")]
    NotIssued { id: BookId },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("book {id} is issued to {borrower} and cannot be deleted")]
    CannotDeleteIssued { id: BookId, borrower: String },

    #[error("storage error on {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CatalogError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CatalogError::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CatalogError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::NotFound { .. } => "not_found",
            CatalogError::AlreadyIssued { .. } => "already_issued",
            CatalogError::NotIssued { .. } => "not_issued",
            CatalogError::InvalidInput { .. } => "invalid_input",
            CatalogError::CannotDeleteIssued { .. } => "cannot_delete_issued",
            CatalogError::Storage { .. } => "operation_failed",
        }
    }

    /// Message safe to hand back to a caller.
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Storage { .. } => "operation failed".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, CatalogError::Storage { .. })
    }
}

use thiserror::Error;

use crate::domain::{QrError, ValidationErrors};

#[derive(Error, Debug)]
pub enum AppError {
    /// Caller-fixable input problems, all of them at once
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("SKU already exists: {0}")]
    Conflict(String),

    /// Missing and not-owned look the same to the caller
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub(crate) fn not_found(key: impl std::fmt::Display) -> Self {
        AppError::NotFound(key.to_string())
    }
}

impl From<QrError> for AppError {
    fn from(err: QrError) -> Self {
        match err {
            QrError::Encode(_) => AppError::Storage(err.into()),
            QrError::Empty | QrError::Malformed(_) => {
                AppError::Validation(ValidationErrors::single("payload", err.to_string()))
            }
        }
    }
}

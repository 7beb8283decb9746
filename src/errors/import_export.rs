//! Import and export error types
//!
//! These describe faults of a whole upload or download. A single bad row never
//! produces one of these; it lands in the reconcile report instead.
//!
//! # Examples
//!
//! ```rust
//! use inventory::errors::ImportExportError;
//!
//! let err = ImportExportError::EncodingError("undecodable bytes".to_string());
//! assert_eq!(err.error_code(), "ENCODING_ERROR");
//! ```

use thiserror::Error;

/// Import and export operation errors
#[derive(Error, Debug)]
pub enum ImportExportError {
    /// Upload could not be decoded to text
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Missing required data
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// CSV parsing/writing error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Export operation failed
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl ImportExportError {
    /// Check if this is a client error (400-series)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportExportError::EncodingError(_)
                | ImportExportError::MissingData(_)
                | ImportExportError::CsvError(_)
        )
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ImportExportError::EncodingError(_) => "ENCODING_ERROR",
            ImportExportError::MissingData(_) => "MISSING_DATA",
            ImportExportError::CsvError(_) => "CSV_ERROR",
            ImportExportError::ExportFailed(_) => "EXPORT_FAILED",
            ImportExportError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<ImportExportError> for super::CoreError {
    fn from(err: ImportExportError) -> Self {
        if err.is_client_error() {
            super::CoreError::validation(err.to_string())
        } else {
            super::CoreError::internal(err.to_string()).with_source(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_become_validation() {
        let core: crate::errors::CoreError =
            ImportExportError::MissingData("header row".to_string()).into();
        assert_eq!(core.kind(), crate::errors::CoreErrorKind::Validation);
    }

    #[test]
    fn test_encoding_error() {
        let err = ImportExportError::EncodingError("binary content".to_string());
        assert_eq!(err.to_string(), "Encoding error: binary content");
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "ENCODING_ERROR");
    }

    #[test]
    fn test_missing_data() {
        let err = ImportExportError::MissingData("header row".to_string());
        assert_eq!(err.to_string(), "Missing required data: header row");
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "MISSING_DATA");
    }

    #[test]
    fn test_database_error_is_server_side() {
        let err = ImportExportError::from(sea_orm::DbErr::Custom("locked".to_string()));
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }
}

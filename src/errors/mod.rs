//! Domain-specific error types for the inventory service
//!
//! # Error Categories
//!
//! - **CoreError**: service-level failures carrying a kind that maps onto an HTTP status
//! - **AuthError**: principal extraction and permission failures
//! - **ImportExportError**: whole-file CSV import/export faults (encoding, parsing, storage)
//!
//! Row-level import failures are not errors at this level; they are collected into
//! the reconcile report and never abort a batch.
//!
//! # Examples
//!
//! ```rust
//! use inventory::errors::{CoreError, CoreErrorKind, ImportExportError};
//!
//! let err = CoreError::forbidden("no change permission on project web");
//! assert_eq!(err.kind(), CoreErrorKind::Forbidden);
//!
//! let err = ImportExportError::EncodingError("binary content".to_string());
//! assert!(err.is_client_error());
//! ```

pub mod auth;
pub mod core_error;
pub mod import_export;

pub use auth::AuthError;
pub use core_error::{CoreError, CoreErrorKind};
pub use import_export::ImportExportError;

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type alias for import/export operations
pub type ImportExportResult<T> = Result<T, ImportExportError>;

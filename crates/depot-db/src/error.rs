//! # Database Error Types
//!
//! Error types for database operations and the ledger engines.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Rule violation (CoreError)          │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← categorized, Domain(..) wraps core errors     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::code() → ErrorCode ← stable taxonomy for the HTTP layer      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  HTTP layer maps ErrorCode to a status (400/404/409/422/503/500)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An error returned from inside a unit of work always means nothing was
//! committed: the transaction is dropped on the way out and SQLite rolls it
//! back.

use depot_core::{CoreError, ValidationError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - A document references an unknown or deactivated product/location
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU or location code
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Another transaction holds the write lock and did not release it
    /// within the busy timeout. Safe to retry.
    #[error("Concurrent transaction conflict: {0}")]
    ConcurrencyConflict(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Maps this error onto the caller-facing taxonomy.
    ///
    /// ```text
    /// Domain(Validation | Overflow | InvalidStatus) → VALIDATION_ERROR
    /// UniqueViolation | ForeignKeyViolation         → VALIDATION_ERROR
    /// NotFound                                      → NOT_FOUND
    /// Domain(AlreadyApplied)                        → ALREADY_APPLIED
    /// Domain(InsufficientStock)                     → INSUFFICIENT_STOCK
    /// Domain(PaymentExceedsBalance)                 → PAYMENT_EXCEEDS_BALANCE
    /// ConcurrencyConflict                           → CONCURRENCY_CONFLICT
    /// everything else                               → INTERNAL
    /// ```
    pub fn code(&self) -> ErrorCode {
        match self {
            DbError::NotFound { .. } => ErrorCode::NotFound,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ErrorCode::ValidationError
            }
            DbError::ConcurrencyConflict(_) => ErrorCode::ConcurrencyConflict,
            DbError::Domain(core) => match core {
                CoreError::Validation(_)
                | CoreError::Overflow(_)
                | CoreError::InvalidStatus { .. } => ErrorCode::ValidationError,
                CoreError::AlreadyApplied { .. } => ErrorCode::AlreadyApplied,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::PaymentExceedsBalance { .. } => ErrorCode::PaymentExceedsBalance,
            },
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::InvalidConfig(_)
            | DbError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::ConcurrencyConflict(_))
    }
}

// =============================================================================
// Error Codes
// =============================================================================

/// Stable error codes for the HTTP layer.
///
/// ## Usage in the HTTP layer
/// ```rust,ignore
/// match err.code() {
///     ErrorCode::NotFound => StatusCode::NOT_FOUND,
///     ErrorCode::AlreadyApplied => StatusCode::CONFLICT,
///     ErrorCode::ConcurrencyConflict => StatusCode::SERVICE_UNAVAILABLE,
///     ...
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or rule-violating input (400)
    ValidationError,

    /// Referenced entity does not exist (404)
    NotFound,

    /// Document was already applied (409)
    AlreadyApplied,

    /// Would drive stock negative (422)
    InsufficientStock,

    /// Payment larger than the invoice balance (422)
    PaymentExceedsBalance,

    /// Lost a race for the write lock; retry (503)
    ConcurrencyConflict,

    /// Unexpected storage failure (500)
    Internal,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyApplied => "ALREADY_APPLIED",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::PaymentExceedsBalance => "PAYMENT_EXCEEDS_BALANCE",
            ErrorCode::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_lock_contention(code: Option<&str>, message: &str) -> bool {
    let primary = code
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff);

    matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
        || message.contains("database is locked")
        || message.contains("database table is locked")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → BUSY/LOCKED → ConcurrencyConflict,
///                               otherwise analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if is_lock_contention(code.as_deref(), msg) {
                    DbError::ConcurrencyConflict(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

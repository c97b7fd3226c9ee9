//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures + wrapped CoreError           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → HTTP layer              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
///
/// None of these leave partial state behind: the engines return them before
/// committing, and the enclosing transaction rolls back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stock movement would drive on-hand quantity below zero.
    ///
    /// ## When This Occurs
    /// - Delivering more than is on hand at the location
    /// - Transferring more than the source location holds
    /// - A negative adjustment larger than current stock
    ///
    /// Always re-checked when a document is applied, whatever was checked
    /// at creation.
    #[error(
        "Insufficient stock for product {product_id} at location {location_id}: \
         available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        location_id: String,
        available: i64,
        requested: i64,
    },

    /// The document has already been applied to stock.
    #[error("Document {number} has already been applied")]
    AlreadyApplied { number: String },

    /// Payment amount is larger than what is still owed.
    #[error(
        "Payment of {amount_cents} exceeds balance {balance_cents} on invoice {invoice_number}"
    )]
    PaymentExceedsBalance {
        invoice_number: String,
        balance_cents: i64,
        amount_cents: i64,
    },

    /// Entity is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Sending an invoice that is not a draft
    /// - Paying a cancelled invoice
    /// - Cancelling an invoice that already has payments
    #[error("{entity} {id} is {status}, cannot {operation}")]
    InvalidStatus {
        entity: String,
        id: String,
        status: String,
        operation: String,
    },

    /// Arithmetic left the representable range.
    #[error("Quantity overflow while computing {0}")]
    Overflow(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any storage is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields that must differ are equal.
    #[error("{field} must differ from {other}")]
    MustDiffer { field: String, other: String },

    /// A value would leave the ledger in an invalid state.
    ///
    /// Used for create-time checks such as an adjustment that would take
    /// stock below zero.
    #[error("{field} is invalid: {reason}")]
    Rule { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::Rule`].
    pub fn rule(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::Rule {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            location_id: "l1".to_string(),
            available: 10,
            requested: 15,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p1 at location l1: available 10, requested 15"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("items").to_string(), "items is required");

        let err = ValidationError::MustDiffer {
            field: "to_location_id".to_string(),
            other: "from_location_id".to_string(),
        };
        assert_eq!(err.to_string(), "to_location_id must differ from from_location_id");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("supplier").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}

//! # Validation Module
//!
//! Input validation utilities for Depot.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer                                                   │
//! │  └── Deserialization, auth, permission checks                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (pure field rules)                               │
//! │  └── Lengths, formats, positive quantities, item counts                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Engines in depot-db (rules that need state)                  │
//! │  └── Known products/locations, stock sufficiency, balances             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── NOT NULL, UNIQUE, FOREIGN KEY, CHECK (quantity >= 0)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use depot_core::validation::{validate_code, validate_quantity};
//!
//! validate_code("sku", "BOLT-M8").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_DOCUMENT_ITEMS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_CODE_LEN: usize = 50;
const MAX_NAME_LEN: usize = 200;

/// Maximum length of free-text fields (notes, reasons, references).
pub const MAX_TEXT_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a business code (SKU, location code).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ```rust
/// use depot_core::validation::validate_code;
///
/// assert!(validate_code("sku", "BOLT-M8").is_ok());
/// assert!(validate_code("sku", "").is_err());
/// assert!(validate_code("code", "WH MAIN").is_err());
/// ```
pub fn validate_code(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, location, supplier, customer).
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an optional free-text field.
pub fn validate_optional_text(field: &str, value: Option<&str>) -> ValidationResult<()> {
    match value {
        Some(text) if text.len() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates an entity id reference (UUID).
///
/// ```rust
/// use depot_core::validation::validate_id;
///
/// assert!(validate_id("location_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_id("location_id", "").is_err());
/// assert!(validate_id("location_id", "not-a-uuid").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity magnitude (receipts, deliveries, transfers,
/// invoice lines).
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a signed adjustment quantity.
///
/// ## Rules
/// - Must not be zero (a no-op adjustment is a mistake)
/// - Magnitude must not exceed MAX_LINE_QUANTITY
pub fn validate_signed_quantity(qty: i64) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "quantity".to_string(),
        });
    }

    if qty.unsigned_abs() > MAX_LINE_QUANTITY as u64 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use depot_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents (must be > 0).
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: i64) -> ValidationResult<()> {
    if !(0..=10000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of line items on a document or invoice.
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("items"));
    }

    if count > MAX_DOCUMENT_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_DOCUMENT_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

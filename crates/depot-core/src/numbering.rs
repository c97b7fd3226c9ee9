//! # Document Numbering
//!
//! Formatting and parsing of human-readable numbers such as `RCP-000042`.
//!
//! ```text
//! prefix ─┐      ┌─ sequence, zero-padded to NUMBER_WIDTH
//!         ▼      ▼
//!        RCP - 000042
//! ```
//!
//! Each prefix has its own counter. Sequences start at 1 and never repeat;
//! depot-db advances them inside the same transaction that stores the
//! numbered record. Sequences wider than `NUMBER_WIDTH` are printed in full.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::DocumentKind;
use crate::validation::ValidationResult;
use crate::NUMBER_WIDTH;

/// Counter namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentPrefix {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
    Invoice,
    Payment,
}

impl DocumentPrefix {
    pub const ALL: [DocumentPrefix; 6] = [
        DocumentPrefix::Receipt,
        DocumentPrefix::Delivery,
        DocumentPrefix::Transfer,
        DocumentPrefix::Adjustment,
        DocumentPrefix::Invoice,
        DocumentPrefix::Payment,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentPrefix::Receipt => "RCP",
            DocumentPrefix::Delivery => "DLV",
            DocumentPrefix::Transfer => "TRF",
            DocumentPrefix::Adjustment => "ADJ",
            DocumentPrefix::Invoice => "INV",
            DocumentPrefix::Payment => "PAY",
        }
    }

    /// Prefix used for stock documents of `kind`.
    pub const fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Receipt => DocumentPrefix::Receipt,
            DocumentKind::Delivery => DocumentPrefix::Delivery,
            DocumentKind::Transfer => DocumentPrefix::Transfer,
            DocumentKind::Adjustment => DocumentPrefix::Adjustment,
        }
    }

    /// Looks a prefix up by its text form.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for DocumentPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a number.
///
/// ```rust
/// use depot_core::numbering::{format_number, DocumentPrefix};
///
/// assert_eq!(format_number(DocumentPrefix::Receipt, 1), "RCP-000001");
/// assert_eq!(format_number(DocumentPrefix::Invoice, 1234567), "INV-1234567");
/// ```
pub fn format_number(prefix: DocumentPrefix, sequence: i64) -> String {
    format!("{}-{:0width$}", prefix.as_str(), sequence, width = NUMBER_WIDTH)
}

/// Splits a number back into prefix and sequence.
pub fn parse_number(number: &str) -> ValidationResult<(DocumentPrefix, i64)> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "number".to_string(),
        reason: reason.to_string(),
    };

    let (prefix, digits) = number
        .split_once('-')
        .ok_or_else(|| invalid("expected PREFIX-NNNNNN"))?;

    let prefix = DocumentPrefix::parse(prefix).ok_or_else(|| invalid("unknown prefix"))?;

    if digits.len() < NUMBER_WIDTH || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("sequence must be zero-padded digits"));
    }

    let sequence: i64 = digits
        .parse()
        .map_err(|_| invalid("sequence out of range"))?;

    if sequence < 1 {
        return Err(invalid("sequence starts at 1"));
    }

    Ok((prefix, sequence))
}

// =============================================================================
// Unit Tests
// =============================================================================

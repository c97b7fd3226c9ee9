//! # Domain Types
//!
//! Core domain types used throughout Depot.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog              Stock ledger                Billing               │
//! │  ───────              ────────────                ───────               │
//! │  Product ──┐          StockLevel                  Invoice               │
//! │  Location ─┼────────► (product, location) → qty   ├── InvoiceItem       │
//! │            │                                      └── Payment           │
//! │            └────────► StockDocument                                     │
//! │                       ├── kind: Receipt | Delivery | Transfer | Adj.    │
//! │                       ├── items: DocumentItem[]                         │
//! │                       └── is_applied ──► MoveHistoryEntry[]             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (`sku`, `code`, `number`, ...) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, TaxRate};
use crate::validation::{self, ValidationResult};

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    pub name: String,

    pub description: Option<String>,

    /// Default selling price in cents.
    pub unit_price_cents: i64,

    /// Cost in cents.
    pub cost_cents: Option<i64>,

    /// Total on-hand quantity (all locations) at or below which the product
    /// is reported as low on stock.
    pub reorder_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub cost_cents: Option<i64>,
    #[serde(default)]
    pub reorder_level: i64,
}

impl NewProduct {
    /// Validates all fields.
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_code("sku", &self.sku)?;
        validation::validate_name("name", &self.name)?;
        validation::validate_price_cents(self.unit_price_cents)?;
        if let Some(cost) = self.cost_cents {
            validation::validate_price_cents(cost)?;
        }
        if self.reorder_level < 0 {
            return Err(ValidationError::OutOfRange {
                field: "reorder_level".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Location
// =============================================================================

/// A warehouse or any other place stock is held.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,

    /// Short business code, e.g. `WH-MAIN`.
    pub code: String,

    pub name: String,

    pub address: Option<String>,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a location.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLocation {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
}

impl NewLocation {
    /// Validates all fields.
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_code("code", &self.code)?;
        validation::validate_name("name", &self.name)
    }
}

// =============================================================================
// Stock Level
// =============================================================================

/// On-hand quantity of one product at one location.
///
/// Created lazily by the first inbound movement; never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub location_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A product whose total on-hand quantity is at or below its reorder level.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LowStockItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub on_hand: i64,
    pub reorder_level: i64,
}

// =============================================================================
// Move History
// =============================================================================

/// The kind of quantity change recorded in the move history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveType {
    Receipt,
    Delivery,
    AdjustmentIncrease,
    AdjustmentDecrease,
    TransferOut,
    TransferIn,
}

impl MoveType {
    /// Stored/serialized representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MoveType::Receipt => "RECEIPT",
            MoveType::Delivery => "DELIVERY",
            MoveType::AdjustmentIncrease => "ADJUSTMENT_INCREASE",
            MoveType::AdjustmentDecrease => "ADJUSTMENT_DECREASE",
            MoveType::TransferOut => "TRANSFER_OUT",
            MoveType::TransferIn => "TRANSFER_IN",
        }
    }

    /// Whether this move takes stock away from its location.
    pub const fn is_outbound(&self) -> bool {
        matches!(
            self,
            MoveType::Delivery | MoveType::AdjustmentDecrease | MoveType::TransferOut
        )
    }
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one quantity change.
///
/// `quantity_after == quantity_before + quantity_changed`, and
/// `quantity_after` is the stock level right after the change committed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MoveHistoryEntry {
    pub id: String,
    pub move_type: MoveType,
    pub product_id: String,
    pub location_id: String,
    /// Actor who applied the originating document.
    pub user_id: String,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub quantity_changed: i64,
    /// Id of the originating document.
    pub reference_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Documents
// =============================================================================

/// Stock document variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Inbound goods from a supplier.
    Receipt,
    /// Outbound goods to a customer.
    Delivery,
    /// Location-to-location move.
    Transfer,
    /// Manual correction (count, damage, loss, ...).
    Adjustment,
}

impl DocumentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Receipt => "receipt",
            DocumentKind::Delivery => "delivery",
            DocumentKind::Transfer => "transfer",
            DocumentKind::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a stock document.
///
/// ```text
/// PENDING ──apply──► APPLIED (terminal)
///    │
///    └──delete──► (gone)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Applied,
}

/// One stored line of a stock document.
///
/// For adjustments `quantity` is the signed delta; for every other kind it
/// is a positive magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DocumentItem {
    pub id: String,
    pub document_id: String,
    /// Position in the submitted list; items are applied in this order.
    pub line_no: i64,
    pub product_id: String,
    pub quantity: i64,
}

/// A receipt, delivery, transfer or adjustment.
///
/// Items never change after creation. `location_id` is the source location
/// for transfers; `to_location_id` is only set for transfers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockDocument {
    pub id: String,
    pub kind: DocumentKind,
    /// Sequential number, e.g. `RCP-000001`.
    pub number: String,
    pub location_id: String,
    pub to_location_id: Option<String>,
    /// Supplier (receipts) or customer (deliveries).
    pub partner: Option<String>,
    /// Reason for an adjustment.
    pub reason: Option<String>,
    /// Creator.
    pub user_id: String,
    pub notes: Option<String>,
    pub is_applied: bool,
    #[ts(as = "Option<String>")]
    pub applied_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<DocumentItem>,
}

impl StockDocument {
    pub fn status(&self) -> DocumentStatus {
        if self.is_applied {
            DocumentStatus::Applied
        } else {
            DocumentStatus::Pending
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Invoice status.
///
/// ```text
/// DRAFT ──send──► SENT ──payment──► PARTIAL ──payment──► PAID
///                  │                   │
///                  ├──past due──► OVERDUE (payments still accepted)
///                  └──cancel──► CANCELLED (only while nothing is paid)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

impl InvoiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether a payment may be recorded against an invoice in this status.
    pub const fn accepts_payments(&self) -> bool {
        !matches!(self, InvoiceStatus::Cancelled)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub line_no: i64,
    pub product_id: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `unit_price_cents × quantity`.
    pub total_price_cents: i64,
}

/// Money owed for delivered goods.
///
/// `balance_cents == total_cents - paid_cents` in every committed state.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_name: String,
    /// Delivery that shipped the invoiced goods, when known.
    pub delivery_id: Option<String>,
    pub status: InvoiceStatus,
    pub subtotal_cents: i64,
    pub tax_rate_bps: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    #[ts(as = "String")]
    pub issue_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub paid_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Tax rate, clamped into the representable range.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps.clamp(0, u32::MAX as i64) as u32)
    }
}

// =============================================================================
// Payment
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Cheque,
    Other,
}

/// A payment against exactly one invoice.
///
/// Deleting it (reversal) undoes its effect on the invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    /// Sequential number, e.g. `PAY-000001`.
    pub payment_number: String,
    pub invoice_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// External reference (bank reference, cheque number, ...).
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_type_direction() {
        assert!(MoveType::Delivery.is_outbound());
        assert!(MoveType::TransferOut.is_outbound());
        assert!(MoveType::AdjustmentDecrease.is_outbound());
        assert!(!MoveType::Receipt.is_outbound());
        assert!(!MoveType::TransferIn.is_outbound());
        assert!(!MoveType::AdjustmentIncrease.is_outbound());
    }

    #[test]
    fn test_move_type_serializes_screaming() {
        let json = serde_json::to_string(&MoveType::TransferOut).unwrap();
        assert_eq!(json, "\"TRANSFER_OUT\"");
        assert_eq!(MoveType::AdjustmentIncrease.to_string(), "ADJUSTMENT_INCREASE");
    }

    #[test]
    fn test_invoice_status_default_and_payments() {
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Draft);
        assert!(InvoiceStatus::Overdue.accepts_payments());
        assert!(!InvoiceStatus::Cancelled.accepts_payments());
    }

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            sku: "BOLT-M8".to_string(),
            name: "Hex bolt M8".to_string(),
            description: None,
            unit_price_cents: 45,
            cost_cents: Some(20),
            reorder_level: 100,
        };
        assert!(product.validate().is_ok());

        product.reorder_level = -1;
        assert!(product.validate().is_err());

        product.reorder_level = 0;
        product.sku = "has space".to_string();
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_new_location_validation() {
        let location = NewLocation {
            code: "WH-MAIN".to_string(),
            name: "Main warehouse".to_string(),
            address: None,
        };
        assert!(location.validate().is_ok());

        let location = NewLocation {
            code: String::new(),
            ..location
        };
        assert!(location.validate().is_err());
    }
}

//! # depot-core: Pure Ledger Logic for Depot
//!
//! This crate is the **heart** of Depot. It contains the stock and billing
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (routing, auth, RBAC)                   │   │
//! │  │     supplies acting_user_id + already-validated payloads        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ document  │  │   stock   │  │  invoice  │  │ numbering │  │   │
//! │  │   │  deltas   │  │ apply_    │  │  balance  │  │ RCP-00001 │  │   │
//! │  │   │  per kind │  │  delta    │  │  status   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-db (Database Layer)                    │   │
//! │  │     SQLite, migrations, transactional engines, repositories     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Location, StockDocument, Invoice, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//! - [`stock`] - Stock deltas and the non-negativity rule
//! - [`document`] - Per-variant document semantics (receipt, delivery, ...)
//! - [`invoice`] - Invoice balance and status math
//! - [`numbering`] - Human-readable document numbers
//!
//! ## Example Usage
//!
//! ```rust
//! use depot_core::stock::apply_delta;
//!
//! // 10 on hand, deliver 4
//! let change = apply_delta("prod-1", "loc-1", 10, -4).unwrap();
//! assert_eq!(change.after, 6);
//!
//! // Delivering 15 would go negative
//! assert!(apply_delta("prod-1", "loc-1", 10, -15).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod invoice;
pub mod money;
pub mod numbering;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items on a single stock document or invoice.
pub const MAX_DOCUMENT_ITEMS: usize = 500;

/// Maximum magnitude of a single line quantity.
///
/// ## Business Reason
/// Catches typos (an extra zero or two) before they reach stock.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// Width of the zero-padded sequence part of document numbers.
pub const NUMBER_WIDTH: usize = 6;

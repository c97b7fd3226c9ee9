//! # depot-db: Ledger Storage for Depot
//!
//! SQLite storage for the Depot ledger, plus the engines that change it in
//! single transactions: stock documents, stock levels, move history,
//! invoices and payments.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Depot Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (apply_document)                                         │
//! │       │  acting_user_id from auth                                      │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ DocumentRepo   │    │              │ │   │
//! │  │   │ SqlitePool    │◄───│ InvoiceRepo    │    │ 001_initial  │ │   │
//! │  │   │ WAL + busy    │    │ StockRepo      │    │ _schema.sql  │ │   │
//! │  │   │ timeout       │    │ MoveHistory... │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │           ▲                                                     │   │
//! │  │           │ DepotConfig (depot.toml + DEPOT_* env)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/depot.db                                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `depot.toml` loading and ledger policies
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and API error codes
//! - [`repository`] - Repositories and the two ledger engines
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Database, DepotConfig};
//!
//! let config = DepotConfig::load(None)?;
//! let db = Database::open(&config).await?;
//!
//! let doc = db.documents().create(&new_delivery, "user-1").await?;
//! db.documents().apply(&doc.id, "user-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, DepotConfig, LedgerSettings};
pub use error::{DbError, DbResult, ErrorCode};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::document::{DocumentFilter, DocumentRepository};
pub use repository::invoice::InvoiceRepository;
pub use repository::location::LocationRepository;
pub use repository::moves::{MoveHistoryFilter, MoveHistoryRepository};
pub use repository::numbering::NumberingRepository;
pub use repository::product::ProductRepository;
pub use repository::stock::StockRepository;

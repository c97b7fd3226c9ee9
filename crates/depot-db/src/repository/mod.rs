//! # Repository Module
//!
//! Database repositories and ledger engines for Depot.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and Units of Work                       │
//! │                                                                         │
//! │  HTTP layer                                                            │
//! │       │  db.documents().apply(id, acting_user_id)                      │
//! │       ▼                                                                 │
//! │  DocumentRepository::apply                                             │
//! │  └── BEGIN                                                             │
//! │      ├── claim document (UPDATE ... WHERE is_applied = 0)              │
//! │      ├── for each delta:                                               │
//! │      │     stock::apply_delta(&mut tx)   ← Stock Store                 │
//! │      │     moves::append(&mut tx)        ← Move History Log            │
//! │      └── COMMIT   (any error before this drops tx → ROLLBACK)          │
//! │                                                                         │
//! │  Functions taking `&mut SqliteConnection` run inside the caller's      │
//! │  transaction; methods on the repository structs open their own.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product catalog
//! - [`LocationRepository`](location::LocationRepository) - Warehouses
//! - [`StockRepository`](stock::StockRepository) - On-hand quantities (read side)
//! - [`MoveHistoryRepository`](moves::MoveHistoryRepository) - Audit trail
//! - [`NumberingRepository`](numbering::NumberingRepository) - Document numbers
//! - [`DocumentRepository`](document::DocumentRepository) - Document lifecycle engine
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoice balance engine

pub mod document;
pub mod invoice;
pub mod location;
pub mod moves;
pub mod numbering;
pub mod product;
pub mod stock;

/// Shared helpers for repository unit tests.
#[cfg(test)]
pub(crate) mod test_support {
    use depot_core::{Location, NewLocation, NewProduct, Product};

    use crate::pool::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn location(db: &Database, code: &str) -> Location {
        db.locations()
            .create(&NewLocation {
                code: code.to_string(),
                name: format!("Location {code}"),
                address: None,
            })
            .await
            .unwrap()
    }

    pub async fn product(db: &Database, sku: &str) -> Product {
        db.products()
            .create(&NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                description: None,
                unit_price_cents: 250,
                cost_cents: Some(100),
                reorder_level: 5,
            })
            .await
            .unwrap()
    }
}

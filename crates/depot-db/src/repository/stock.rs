//! # Stock Store
//!
//! Current on-hand quantity per (product, location).
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_delta(conn, product, location, delta)   (inside caller's tx)    │
//! │                                                                         │
//! │  SELECT quantity ───► depot_core::stock::apply_delta(current, delta)   │
//! │   (missing = 0)             │                                           │
//! │                             ├── Err(InsufficientStock) → return        │
//! │                             ▼                                           │
//! │  INSERT ... ON CONFLICT(product_id, location_id)                       │
//! │      DO UPDATE SET quantity = excluded.quantity                        │
//! │                                                                         │
//! │  The row is created by the first inbound movement. The CHECK           │
//! │  (quantity >= 0) on the table backs up the rule.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`StockRepository`] is the read side; it has no write methods.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use depot_core::stock::{self, QuantityChange};
use depot_core::{LowStockItem, StockLevel};

/// Read-only access to stock levels.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// On-hand quantity, 0 when no level exists yet.
    pub async fn get_quantity(&self, product_id: &str, location_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        quantity_in(&mut conn, product_id, location_id).await
    }

    /// The stored level, if the pair has ever received stock.
    pub async fn get_level(
        &self,
        product_id: &str,
        location_id: &str,
    ) -> DbResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT product_id, location_id, quantity, updated_at
            FROM stock_levels
            WHERE product_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }

    /// Levels of one product across locations.
    pub async fn levels_for_product(&self, product_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT s.product_id, s.location_id, s.quantity, s.updated_at
            FROM stock_levels s
            INNER JOIN locations l ON l.id = s.location_id
            WHERE s.product_id = ?1
            ORDER BY l.code
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    /// Levels of every product held at one location.
    pub async fn levels_for_location(&self, location_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT s.product_id, s.location_id, s.quantity, s.updated_at
            FROM stock_levels s
            INNER JOIN products p ON p.id = s.product_id
            WHERE s.location_id = ?1
            ORDER BY p.sku
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    /// Total on hand across all locations.
    pub async fn total_for_product(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_levels WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Active products whose total on-hand is at or below their reorder
    /// level, lowest first.
    pub async fn below_reorder_level(&self) -> DbResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, LowStockItem>(
            r#"
            SELECT p.id AS product_id,
                   p.sku,
                   p.name,
                   COALESCE(SUM(s.quantity), 0) AS on_hand,
                   p.reorder_level
            FROM products p
            LEFT JOIN stock_levels s ON s.product_id = p.id
            WHERE p.is_active = 1 AND p.reorder_level > 0
            GROUP BY p.id, p.sku, p.name, p.reorder_level
            HAVING COALESCE(SUM(s.quantity), 0) <= p.reorder_level
            ORDER BY on_hand, p.sku
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

/// On-hand quantity read on the caller's connection.
pub(crate) async fn quantity_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND location_id = ?2",
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Applies `delta` to one level on the caller's transaction.
///
/// Must only be called from a unit of work that already holds the write
/// lock, so the read and the write see the same state.
///
/// ## Errors
/// `Domain(InsufficientStock)` if the result would be negative; nothing is
/// written in that case.
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<QuantityChange> {
    let current = quantity_in(conn, product_id, location_id).await?;
    let change = stock::apply_delta(product_id, location_id, current, delta)?;

    sqlx::query(
        r#"
        INSERT INTO stock_levels (product_id, location_id, quantity, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (product_id, location_id) DO UPDATE SET
            quantity = excluded.quantity,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(product_id)
    .bind(location_id)
    .bind(change.after)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        location_id = %location_id,
        delta = delta,
        before = change.before,
        after = change.after,
        "Stock level updated"
    );

    Ok(change)
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Key Operations
//! - Create with unique SKU
//! - Lookup by id or SKU
//! - Soft delete (deactivate)
//!
//! Products are never hard-deleted: stock levels, move history and invoice
//! lines keep referencing them. A deactivated product can no longer appear
//! on new documents.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use depot_core::{NewProduct, Product};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product.
    ///
    /// ## Errors
    /// - `Domain(Validation)` for bad fields
    /// - `UniqueViolation` when the SKU is taken
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        input.validate()?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            unit_price_cents: input.unit_price_cents,
            cost_cents: input.cost_cents,
            reorder_level: input.reorder_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description,
                unit_price_cents, cost_cents, reorder_level,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.cost_cents)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
            other => other,
        })?;

        info!(id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Gets a product by ID (active or not).
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, unit_price_cents, cost_cents,
                   reorder_level, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by SKU (exact match).
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, unit_price_cents, cost_cents,
                   reorder_level, is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products ordered by SKU.
    pub async fn list(&self, active_only: bool, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, unit_price_cents, cost_cents,
                   reorder_level, is_active, created_at, updated_at
            FROM products
            WHERE (?1 = 0 OR is_active = 1)
            ORDER BY sku
            LIMIT ?2
            "#,
        )
        .bind(active_only)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Soft-deletes a product.
    ///
    /// Existing stock and history are untouched; new documents can no
    /// longer reference it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Fails with `NotFound` unless `id` is an active product.
///
/// Runs on the caller's transaction.
pub(crate) async fn ensure_active(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match active {
        Some(true) => Ok(()),
        _ => Err(DbError::not_found("Product", id)),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, product};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = memory_db().await;
        let created = product(&db, "BOLT-M8").await;

        let by_id = db.products().get(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "BOLT-M8");
        assert!(by_id.is_active);

        let by_sku = db.products().get_by_sku("BOLT-M8").await.unwrap().unwrap();
        assert_eq!(by_sku.id, created.id);

        assert!(db.products().get_by_sku("NOPE").await.unwrap().is_none());
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = memory_db().await;
        product(&db, "BOLT-M8").await;

        let err = db
            .products()
            .create(&NewProduct {
                sku: "BOLT-M8".to_string(),
                name: "Other".to_string(),
                description: None,
                unit_price_cents: 1,
                cost_cents: None,
                reorder_level: 0,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_active_list() {
        let db = memory_db().await;
        let a = product(&db, "A-1").await;
        product(&db, "B-1").await;

        db.products().deactivate(&a.id).await.unwrap();

        assert_eq!(db.products().list(true, 100).await.unwrap().len(), 1);
        assert_eq!(db.products().list(false, 100).await.unwrap().len(), 2);

        {
            // Single-connection pool: release before the next call
            let mut conn = db.pool().acquire().await.unwrap();
            assert!(ensure_active(&mut conn, &a.id).await.is_err());
        }

        assert!(matches!(
            db.products().deactivate("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}

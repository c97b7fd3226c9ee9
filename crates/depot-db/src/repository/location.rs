//! # Location Repository
//!
//! Warehouses and other stock-holding places.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use depot_core::{Location, NewLocation};

#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Creates a location. The code must be unique.
    pub async fn create(&self, input: &NewLocation) -> DbResult<Location> {
        input.validate()?;

        let now = Utc::now();
        let location = Location {
            id: Uuid::new_v4().to_string(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            address: input.address.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO locations (id, code, name, address, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(&location.address)
        .bind(location.is_active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &location.code),
            other => other,
        })?;

        info!(id = %location.id, code = %location.code, "Location created");
        Ok(location)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, code, name, address, is_active, created_at, updated_at
            FROM locations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, code, name, address, is_active, created_at, updated_at
            FROM locations
            WHERE code = ?1
            "#,
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Lists locations ordered by code.
    pub async fn list(&self, active_only: bool) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT id, code, name, address, is_active, created_at, updated_at
            FROM locations
            WHERE (?1 = 0 OR is_active = 1)
            ORDER BY code
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    /// Soft-deletes a location. Stock held there stays on record.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE locations SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        info!(id = %id, "Location deactivated");
        Ok(())
    }
}

/// Fails with `NotFound` unless `id` is an active location.
pub(crate) async fn ensure_active(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM locations WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match active {
        Some(true) => Ok(()),
        _ => Err(DbError::not_found("Location", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{location, memory_db};

    #[tokio::test]
    async fn test_create_get_and_deactivate() {
        let db = memory_db().await;
        let main = location(&db, "WH-MAIN").await;
        location(&db, "WH-EAST").await;

        let found = db.locations().get_by_code("WH-MAIN").await.unwrap().unwrap();
        assert_eq!(found.id, main.id);
        assert!(db.locations().get(&main.id).await.unwrap().is_some());

        db.locations().deactivate(&main.id).await.unwrap();
        let active = db.locations().list(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "WH-EAST");
    }

    #[tokio::test]
    async fn test_duplicate_code_and_bad_input() {
        let db = memory_db().await;
        location(&db, "WH-MAIN").await;

        let dup = NewLocation {
            code: "WH-MAIN".to_string(),
            name: "Again".to_string(),
            address: None,
        };
        assert!(matches!(
            db.locations().create(&dup).await,
            Err(DbError::UniqueViolation { .. })
        ));

        let bad = NewLocation {
            code: "has space".to_string(),
            name: "Bad".to_string(),
            address: None,
        };
        assert!(matches!(
            db.locations().create(&bad).await,
            Err(DbError::Domain(_))
        ));
    }
}

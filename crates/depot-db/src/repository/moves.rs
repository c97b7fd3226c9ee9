//! # Move History Log
//!
//! Append-only record of every stock quantity change.
//!
//! ## Lifecycle of an Entry
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  append(conn, entry)       inside the apply transaction, right after   │
//! │                            the stock level write it describes          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  query(filter) / for_reference(doc_id)      read-only, newest first    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  purge_older_than(cutoff)  retention only; stock levels untouched      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no update path. Entries are written once and removed only by
//! age.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use depot_core::{MoveHistoryEntry, MoveType};

/// Default page size for [`MoveHistoryRepository::query`].
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Filters for [`MoveHistoryRepository::query`]. Unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct MoveHistoryFilter {
    pub move_type: Option<MoveType>,
    pub product_id: Option<String>,
    pub location_id: Option<String>,
    pub user_id: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Page size; 0 means [`DEFAULT_PAGE_SIZE`].
    pub limit: u32,
    pub offset: u32,
}

impl MoveHistoryFilter {
    pub fn for_product(product_id: impl Into<String>) -> Self {
        MoveHistoryFilter {
            product_id: Some(product_id.into()),
            ..Default::default()
        }
    }

    pub fn location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn move_type(mut self, move_type: MoveType) -> Self {
        self.move_type = Some(move_type);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    fn page_size(&self) -> i64 {
        if self.limit == 0 {
            i64::from(DEFAULT_PAGE_SIZE)
        } else {
            i64::from(self.limit)
        }
    }
}

/// Read and retention access to the move history.
#[derive(Debug, Clone)]
pub struct MoveHistoryRepository {
    pool: SqlitePool,
}

impl MoveHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MoveHistoryRepository { pool }
    }

    /// One page of entries matching `filter`, newest first.
    ///
    /// Entries written in the same instant keep their insertion order
    /// (reversed), so a transfer's TRANSFER_IN sorts before its TRANSFER_OUT.
    pub async fn query(&self, filter: &MoveHistoryFilter) -> DbResult<Vec<MoveHistoryEntry>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT id, move_type, product_id, location_id, user_id,
                   quantity_before, quantity_after, quantity_changed,
                   reference_id, notes, created_at
            FROM move_history
            WHERE 1 = 1
            "#,
        );

        if let Some(move_type) = filter.move_type {
            qb.push(" AND move_type = ").push_bind(move_type);
        }
        if let Some(product_id) = &filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id.clone());
        }
        if let Some(location_id) = &filter.location_id {
            qb.push(" AND location_id = ").push_bind(location_id.clone());
        }
        if let Some(user_id) = &filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at < ").push_bind(to);
        }

        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(filter.page_size())
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let entries = qb
            .build_query_as::<MoveHistoryEntry>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = entries.len(), "Move history query");
        Ok(entries)
    }

    /// All entries caused by one document, in the order they were written.
    pub async fn for_reference(&self, reference_id: &str) -> DbResult<Vec<MoveHistoryEntry>> {
        let entries = sqlx::query_as::<_, MoveHistoryEntry>(
            r#"
            SELECT id, move_type, product_id, location_id, user_id,
                   quantity_before, quantity_after, quantity_changed,
                   reference_id, notes, created_at
            FROM move_history
            WHERE reference_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Number of entries, for diagnostics.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM move_history")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Deletes entries created before `cutoff`. Returns how many were removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM move_history WHERE created_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        info!(%cutoff, purged, "Purged move history");
        Ok(purged)
    }
}

/// Appends one entry on the caller's transaction.
pub(crate) async fn append(conn: &mut SqliteConnection, entry: &MoveHistoryEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO move_history (
            id, move_type, product_id, location_id, user_id,
            quantity_before, quantity_after, quantity_changed,
            reference_id, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&entry.id)
    .bind(entry.move_type)
    .bind(&entry.product_id)
    .bind(&entry.location_id)
    .bind(&entry.user_id)
    .bind(entry.quantity_before)
    .bind(entry.quantity_after)
    .bind(entry.quantity_changed)
    .bind(&entry.reference_id)
    .bind(&entry.notes)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        move_type = %entry.move_type,
        product_id = %entry.product_id,
        location_id = %entry.location_id,
        changed = entry.quantity_changed,
        "Move recorded"
    );

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{location, memory_db, product};
    use chrono::Duration;
    use uuid::Uuid;

    fn entry(
        move_type: MoveType,
        product_id: &str,
        location_id: &str,
        before: i64,
        after: i64,
        created_at: DateTime<Utc>,
    ) -> MoveHistoryEntry {
        MoveHistoryEntry {
            id: Uuid::new_v4().to_string(),
            move_type,
            product_id: product_id.to_string(),
            location_id: location_id.to_string(),
            user_id: "user-1".to_string(),
            quantity_before: before,
            quantity_after: after,
            quantity_changed: after - before,
            reference_id: "doc-1".to_string(),
            notes: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_filters_order_and_purge() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l1 = location(&db, "WH-1").await;
        let l2 = location(&db, "WH-2").await;
        let now = Utc::now();
        let old = now - Duration::days(400);

        let mut tx = db.pool().begin().await.unwrap();
        append(&mut tx, &entry(MoveType::Receipt, &p.id, &l1.id, 0, 10, old)).await.unwrap();
        append(&mut tx, &entry(MoveType::TransferOut, &p.id, &l1.id, 10, 6, now)).await.unwrap();
        append(&mut tx, &entry(MoveType::TransferIn, &p.id, &l2.id, 0, 4, now)).await.unwrap();
        tx.commit().await.unwrap();

        let all = db.moves().query(&MoveHistoryFilter::for_product(&p.id)).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].move_type, MoveType::TransferIn);
        assert_eq!(all[2].move_type, MoveType::Receipt);

        let at_l1 = db
            .moves()
            .query(&MoveHistoryFilter::for_product(&p.id).location(&l1.id))
            .await
            .unwrap();
        assert_eq!(at_l1.len(), 2);

        let receipts = db
            .moves()
            .query(&MoveHistoryFilter::default().move_type(MoveType::Receipt))
            .await
            .unwrap();
        assert_eq!(receipts.len(), 1);

        let recent = db
            .moves()
            .query(
                &MoveHistoryFilter::default()
                    .between(now - Duration::days(1), now + Duration::days(1)),
            )
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);

        let by_doc = db.moves().for_reference("doc-1").await.unwrap();
        assert_eq!(by_doc[0].move_type, MoveType::Receipt);

        let purged = db.moves().purge_older_than(now - Duration::days(365)).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(db.moves().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_paging() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l = location(&db, "WH-1").await;
        let start = Utc::now();

        let mut tx = db.pool().begin().await.unwrap();
        for i in 0..5 {
            let at = start + Duration::seconds(i);
            append(&mut tx, &entry(MoveType::Receipt, &p.id, &l.id, i, i + 1, at)).await.unwrap();
        }
        tx.commit().await.unwrap();

        let filter = MoveHistoryFilter {
            limit: 2,
            offset: 2,
            ..Default::default()
        };
        let page = db.moves().query(&filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].quantity_after, 3);
        assert_eq!(page[1].quantity_after, 2);
    }
}

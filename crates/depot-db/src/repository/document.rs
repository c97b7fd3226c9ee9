//! # Document Lifecycle Engine
//!
//! Receipts, deliveries, transfers and adjustments: creation, the one-time
//! apply to stock, and deletion while pending.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► PENDING ──apply──► APPLIED (terminal)                     │
//! │                 │                  │                                    │
//! │                 │                  └── apply again → AlreadyApplied    │
//! │                 └──delete──► (gone)    delete      → AlreadyApplied    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Apply: One Unit of Work
//! ```text
//! BEGIN
//!  1. UPDATE stock_documents SET is_applied = 1 ... WHERE id = ? AND is_applied = 0
//!     ├── 0 rows → NotFound / AlreadyApplied (nothing written)
//!     └── 1 row  → this transaction now holds the write lock;
//!                  read the clock, stamp applied_at
//!  2. load items, DocumentBody::compute_stock_deltas()
//!  3. for each delta, in item order:
//!        stock::apply_delta   ── InsufficientStock → ROLLBACK, doc stays PENDING
//!        moves::append
//! COMMIT
//! ```
//!
//! Because step 1 is a write, a second apply of any document waits for the
//! first to commit before it reads a single stock level. The sufficiency
//! check in step 3 therefore always sees committed, current quantities, no
//! matter what was checked at creation. The clock is read only after the
//! lock is held, so `applied_at` and move timestamps follow commit order.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{location, moves, numbering, product, stock};
use depot_core::document::{DocumentBody, NewDocument};
use depot_core::numbering::DocumentPrefix;
use depot_core::stock::{project_deltas, StockKey};
use depot_core::{
    CoreError, DocumentItem, DocumentKind, MoveHistoryEntry, StockDocument, ValidationError,
};

/// Filters for [`DocumentRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    /// `Some(false)` = pending only, `Some(true)` = applied only.
    pub applied: Option<bool>,
    /// 0 means 100.
    pub limit: u32,
    pub offset: u32,
}

/// The document lifecycle engine.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Validates and stores a new PENDING document with a fresh number.
    ///
    /// ## Checks
    /// - field rules ([`NewDocument::validate`])
    /// - every location and product exists and is active (`NotFound`)
    /// - adjustments must not take current stock below zero
    ///   (`Domain(Validation)`)
    ///
    /// Stock and move history are not touched.
    pub async fn create(&self, input: &NewDocument, user_id: &str) -> DbResult<StockDocument> {
        require_user(user_id)?;
        input.validate()?;

        let body = &input.body;
        let kind = body.kind();

        let mut tx = self.pool.begin().await?;

        // First statement is a write: holds the lock for the checks below
        let number = numbering::next_in(&mut tx, DocumentPrefix::for_kind(kind)).await?;
        let now = Utc::now();

        for location_id in body.location_ids() {
            location::ensure_active(&mut tx, location_id).await?;
        }
        let product_ids: BTreeSet<&str> =
            body.items().iter().map(|i| i.product_id.as_str()).collect();
        for product_id in product_ids {
            product::ensure_active(&mut tx, product_id).await?;
        }

        if kind == DocumentKind::Adjustment {
            check_adjustment(&mut tx, body).await?;
        }

        let id = Uuid::new_v4().to_string();
        let items: Vec<DocumentItem> = body
            .items()
            .iter()
            .enumerate()
            .map(|(idx, item)| DocumentItem {
                id: Uuid::new_v4().to_string(),
                document_id: id.clone(),
                line_no: idx as i64 + 1,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect();

        let doc = StockDocument {
            id,
            kind,
            number,
            location_id: body.location_id().to_string(),
            to_location_id: body.to_location_id().map(str::to_string),
            partner: body.partner().map(|p| p.trim().to_string()),
            reason: body.reason().map(|r| r.trim().to_string()),
            user_id: user_id.to_string(),
            notes: input.notes.clone(),
            is_applied: false,
            applied_at: None,
            applied_by: None,
            created_at: now,
            updated_at: now,
            items,
        };

        insert_document(&mut tx, &doc).await?;
        tx.commit().await?;

        info!(
            document_id = %doc.id,
            number = %doc.number,
            kind = %doc.kind,
            items = doc.items.len(),
            "Document created"
        );
        Ok(doc)
    }

    // =========================================================================
    // Apply
    // =========================================================================

    /// Applies a PENDING document to stock, exactly once.
    ///
    /// ## Errors
    /// - `NotFound` - no such document
    /// - `Domain(AlreadyApplied)` - applied before; nothing changes
    /// - `Domain(InsufficientStock)` - some line would go negative; nothing
    ///   changes and the document stays PENDING
    /// - `ConcurrencyConflict` - could not get the write lock in time
    pub async fn apply(&self, id: &str, user_id: &str) -> DbResult<StockDocument> {
        require_user(user_id)?;

        let mut tx = self.pool.begin().await?;

        // applied_at is stamped below, once the lock is held
        let claimed = sqlx::query(
            r#"
            UPDATE stock_documents
            SET is_applied = 1, applied_at = updated_at, applied_by = ?1
            WHERE id = ?2 AND is_applied = 0
            "#,
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            return Err(not_pending(&mut tx, id).await);
        }

        let now = Utc::now();
        sqlx::query("UPDATE stock_documents SET applied_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let doc = load_document(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        match apply_deltas(&mut tx, &doc, user_id, now).await {
            Ok(moves) => {
                tx.commit().await?;
                info!(
                    document_id = %doc.id,
                    number = %doc.number,
                    kind = %doc.kind,
                    moves,
                    applied_by = %user_id,
                    "Document applied"
                );
                Ok(doc)
            }
            Err(err) => {
                warn!(
                    document_id = %doc.id,
                    number = %doc.number,
                    error = %err,
                    "Apply rejected, rolling back"
                );
                Err(err)
            }
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes a PENDING document and its items.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM stock_documents WHERE id = ?1 AND is_applied = 0")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(not_pending(&mut tx, id).await);
        }

        tx.commit().await?;
        info!(document_id = %id, "Document deleted");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets a document with its items.
    pub async fn get(&self, id: &str) -> DbResult<Option<StockDocument>> {
        let mut conn = self.pool.acquire().await?;
        load_document(&mut conn, id).await
    }

    /// Gets a document by its number, e.g. `TRF-000003`.
    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<StockDocument>> {
        let mut conn = self.pool.acquire().await?;

        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM stock_documents WHERE number = ?1")
                .bind(number)
                .fetch_optional(&mut *conn)
                .await?;

        match id {
            Some(id) => load_document(&mut conn, &id).await,
            None => Ok(None),
        }
    }

    /// Lists document headers (without items), newest first.
    pub async fn list(&self, filter: &DocumentFilter) -> DbResult<Vec<StockDocument>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM stock_documents WHERE 1 = 1"
        ));

        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind);
        }
        if let Some(applied) = filter.applied {
            qb.push(" AND is_applied = ").push_bind(applied);
        }

        let limit = if filter.limit == 0 { 100 } else { filter.limit };
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let docs = qb
            .build_query_as::<StockDocument>()
            .fetch_all(&self.pool)
            .await?;

        Ok(docs)
    }
}

// =============================================================================
// Unit-of-work helpers (caller's transaction)
// =============================================================================

const DOCUMENT_COLUMNS: &str = "id, kind, number, location_id, to_location_id, partner, reason, \
     user_id, notes, is_applied, applied_at, applied_by, created_at, updated_at";

fn require_user(user_id: &str) -> DbResult<()> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::required("user_id").into());
    }
    Ok(())
}

/// Applies every delta of `doc` in order and records one move per delta.
/// Returns the number of moves written.
async fn apply_deltas(
    conn: &mut SqliteConnection,
    doc: &StockDocument,
    user_id: &str,
    now: DateTime<Utc>,
) -> DbResult<usize> {
    let body = DocumentBody::from_stored(doc)?;
    let deltas = body.compute_stock_deltas();

    for delta in &deltas {
        let change =
            stock::apply_delta(conn, &delta.product_id, &delta.location_id, delta.delta, now)
                .await?;

        let entry = MoveHistoryEntry {
            id: Uuid::new_v4().to_string(),
            move_type: delta.move_type,
            product_id: delta.product_id.clone(),
            location_id: delta.location_id.clone(),
            user_id: user_id.to_string(),
            quantity_before: change.before,
            quantity_after: change.after,
            quantity_changed: change.changed(),
            reference_id: doc.id.clone(),
            notes: doc.notes.clone(),
            created_at: now,
        };
        moves::append(conn, &entry).await?;
    }

    Ok(deltas.len())
}

/// Rejects an adjustment that would take any current level below zero.
async fn check_adjustment(conn: &mut SqliteConnection, body: &DocumentBody) -> DbResult<()> {
    let deltas = body.compute_stock_deltas();

    let mut levels: HashMap<StockKey, i64> = HashMap::new();
    for d in &deltas {
        let key = (d.product_id.clone(), d.location_id.clone());
        if !levels.contains_key(&key) {
            let qty = stock::quantity_in(conn, &d.product_id, &d.location_id).await?;
            levels.insert(key, qty);
        }
    }

    match project_deltas(&mut levels, &deltas) {
        Ok(_) => Ok(()),
        Err(CoreError::InsufficientStock {
            product_id,
            available,
            requested,
            ..
        }) => Err(ValidationError::rule(
            "items",
            format!(
                "adjustment of -{requested} for product {product_id} \
                 exceeds current stock {available}"
            ),
        )
        .into()),
        Err(other) => Err(other.into()),
    }
}

/// Explains why a claim/delete touched no row.
async fn not_pending(conn: &mut SqliteConnection, id: &str) -> DbError {
    let number: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT number FROM stock_documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await;

    match number {
        Ok(Some(number)) => {
            debug!(document_id = %id, number = %number, "Document already applied");
            CoreError::AlreadyApplied { number }.into()
        }
        Ok(None) => DbError::not_found("Document", id),
        Err(e) => e.into(),
    }
}

async fn insert_document(conn: &mut SqliteConnection, doc: &StockDocument) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_documents (
            id, kind, number, location_id, to_location_id, partner, reason,
            user_id, notes, is_applied, applied_at, applied_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&doc.id)
    .bind(doc.kind)
    .bind(&doc.number)
    .bind(&doc.location_id)
    .bind(&doc.to_location_id)
    .bind(&doc.partner)
    .bind(&doc.reason)
    .bind(&doc.user_id)
    .bind(&doc.notes)
    .bind(doc.is_applied)
    .bind(doc.applied_at)
    .bind(&doc.applied_by)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &doc.items {
        sqlx::query(
            r#"
            INSERT INTO stock_document_items (id, document_id, line_no, product_id, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&item.id)
        .bind(&item.document_id)
        .bind(item.line_no)
        .bind(&item.product_id)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn load_document(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<StockDocument>> {
    let doc = sqlx::query_as::<_, StockDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM stock_documents WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(mut doc) = doc else {
        return Ok(None);
    };

    doc.items = sqlx::query_as::<_, DocumentItem>(
        r#"
        SELECT id, document_id, line_no, product_id, quantity
        FROM stock_document_items
        WHERE document_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(doc))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{location, memory_db, product};
    use depot_core::document::LineItem;
    use depot_core::{DocumentStatus, MoveType};

    const USER: &str = "user-1";

    #[tokio::test]
    async fn test_create_assigns_numbers_and_stays_pending() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l = location(&db, "WH-1").await;

        let receipt = NewDocument::new(DocumentBody::Receipt {
            location_id: l.id.clone(),
            supplier: "Acme Supply".to_string(),
            items: vec![LineItem::new(&p.id, 4), LineItem::new(&p.id, 6)],
        });

        let first = db.documents().create(&receipt, USER).await.unwrap();
        let second = db.documents().create(&receipt, USER).await.unwrap();

        assert_eq!(first.number, "RCP-000001");
        assert_eq!(second.number, "RCP-000002");
        assert_eq!(first.status(), DocumentStatus::Pending);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[1].line_no, 2);

        // Nothing applied yet
        assert_eq!(db.stock().get_quantity(&p.id, &l.id).await.unwrap(), 0);
        assert_eq!(db.moves().count().await.unwrap(), 0);

        let loaded = db.documents().get_by_number("RCP-000002").await.unwrap().unwrap();
        assert_eq!(loaded.id, second.id);
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(loaded.partner.as_deref(), Some("Acme Supply"));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_references() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l = location(&db, "WH-1").await;

        let unknown_location = NewDocument::new(DocumentBody::Delivery {
            location_id: Uuid::new_v4().to_string(),
            customer: "Globex".to_string(),
            items: vec![LineItem::new(&p.id, 1)],
        });
        assert!(matches!(
            db.documents().create(&unknown_location, USER).await,
            Err(DbError::NotFound { .. })
        ));

        let unknown_product = NewDocument::new(DocumentBody::Delivery {
            location_id: l.id.clone(),
            customer: "Globex".to_string(),
            items: vec![LineItem::new(Uuid::new_v4().to_string(), 1)],
        });
        assert!(matches!(
            db.documents().create(&unknown_product, USER).await,
            Err(DbError::NotFound { .. })
        ));

        // Failed creates do not burn numbers
        assert_eq!(db.numbering().current(DocumentPrefix::Delivery).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_apply_receipt_then_reapply() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l = location(&db, "WH-1").await;

        let doc = db
            .documents()
            .create(
                &NewDocument::new(DocumentBody::Receipt {
                    location_id: l.id.clone(),
                    supplier: "Acme".to_string(),
                    items: vec![LineItem::new(&p.id, 10)],
                }),
                USER,
            )
            .await
            .unwrap();

        let applied = db.documents().apply(&doc.id, "user-2").await.unwrap();
        assert!(applied.is_applied);
        assert_eq!(applied.applied_by.as_deref(), Some("user-2"));
        assert_eq!(db.stock().get_quantity(&p.id, &l.id).await.unwrap(), 10);

        let err = db.documents().apply(&doc.id, "user-2").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::AlreadyApplied { .. })));
        assert_eq!(db.stock().get_quantity(&p.id, &l.id).await.unwrap(), 10);

        let moves = db.moves().for_reference(&doc.id).await.unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].move_type, MoveType::Receipt);
        assert_eq!(moves[0].user_id, "user-2");

        // Applied documents cannot be deleted
        assert!(matches!(
            db.documents().delete(&doc.id).await,
            Err(DbError::Domain(CoreError::AlreadyApplied { .. }))
        ));
    }

    #[tokio::test]
    async fn test_apply_missing_document() {
        let db = memory_db().await;
        assert!(matches!(
            db.documents().apply("nope", USER).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.documents().apply("nope", "  ").await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_pending_and_list() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l1 = location(&db, "WH-1").await;
        let l2 = location(&db, "WH-2").await;

        let receipt = db
            .documents()
            .create(
                &NewDocument::new(DocumentBody::Receipt {
                    location_id: l1.id.clone(),
                    supplier: "Acme".to_string(),
                    items: vec![LineItem::new(&p.id, 5)],
                }),
                USER,
            )
            .await
            .unwrap();
        db.documents().apply(&receipt.id, USER).await.unwrap();

        let transfer = db
            .documents()
            .create(
                &NewDocument::new(DocumentBody::Transfer {
                    from_location_id: l1.id.clone(),
                    to_location_id: l2.id.clone(),
                    items: vec![LineItem::new(&p.id, 2)],
                })
                .with_notes("rebalance"),
                USER,
            )
            .await
            .unwrap();
        assert_eq!(transfer.to_location_id.as_deref(), Some(l2.id.as_str()));

        let pending = db
            .documents()
            .list(&DocumentFilter {
                applied: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, DocumentKind::Transfer);

        let receipts = db
            .documents()
            .list(&DocumentFilter {
                kind: Some(DocumentKind::Receipt),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(receipts.len(), 1);

        db.documents().delete(&transfer.id).await.unwrap();
        assert!(db.documents().get(&transfer.id).await.unwrap().is_none());
        assert!(matches!(
            db.documents().delete(&transfer.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjustment_checked_at_create() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;
        let l = location(&db, "WH-1").await;

        let shrink = NewDocument::new(DocumentBody::Adjustment {
            location_id: l.id.clone(),
            reason: "Damaged".to_string(),
            items: vec![LineItem::new(&p.id, -1)],
        });

        let err = db.documents().create(&shrink, USER).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Rule { .. }))
        ));

        let grow = NewDocument::new(DocumentBody::Adjustment {
            location_id: l.id.clone(),
            reason: "Count correction".to_string(),
            items: vec![LineItem::new(&p.id, 3)],
        });
        let doc = db.documents().create(&grow, USER).await.unwrap();
        assert_eq!(doc.number, "ADJ-000001");
        db.documents().apply(&doc.id, USER).await.unwrap();

        let moves = db.moves().for_reference(&doc.id).await.unwrap();
        assert_eq!(moves[0].move_type, MoveType::AdjustmentIncrease);
    }
}

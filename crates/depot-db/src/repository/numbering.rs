//! # Numbering Service
//!
//! Per-prefix sequences backing document numbers like `DLV-000042`.
//!
//! ```text
//! INSERT INTO document_sequences (prefix, last_value) VALUES ('DLV', 1)
//! ON CONFLICT (prefix) DO UPDATE SET last_value = last_value + 1
//! RETURNING last_value
//! ```
//!
//! The increment is a single statement taking SQLite's write lock, so two
//! creators can never read the same value. Call [`next_in`] on the same
//! transaction that inserts the numbered record: if that transaction rolls
//! back, the number is released with it.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use depot_core::numbering::{format_number, DocumentPrefix};

/// Standalone access to the sequences.
#[derive(Debug, Clone)]
pub struct NumberingRepository {
    pool: SqlitePool,
}

impl NumberingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NumberingRepository { pool }
    }

    /// Reserves and returns the next number for `prefix` in its own
    /// transaction.
    pub async fn next(&self, prefix: DocumentPrefix) -> DbResult<String> {
        let mut tx = self.pool.begin().await?;
        let number = next_in(&mut tx, prefix).await?;
        tx.commit().await?;
        Ok(number)
    }

    /// Last sequence value issued for `prefix` (0 if none).
    pub async fn current(&self, prefix: DocumentPrefix) -> DbResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM document_sequences WHERE prefix = ?1")
                .bind(prefix.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.unwrap_or(0))
    }
}

/// Advances the sequence for `prefix` on the caller's transaction and
/// returns the formatted number.
pub(crate) async fn next_in(
    conn: &mut SqliteConnection,
    prefix: DocumentPrefix,
) -> DbResult<String> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (prefix, last_value) VALUES (?1, 1)
        ON CONFLICT (prefix) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(prefix.as_str())
    .fetch_one(&mut *conn)
    .await?;

    let number = format_number(prefix, value);
    debug!(prefix = %prefix, number = %number, "Number issued");
    Ok(number)
}

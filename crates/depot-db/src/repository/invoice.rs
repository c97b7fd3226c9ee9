//! # Invoice Balance Engine
//!
//! Invoices, their payments, and the derived `paid` / `balance` / `status`.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_payment(payment)                                                │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   1. UPDATE invoices ... WHERE id = ?   (write lock, then read clock)  │
//! │   2. load invoice ── CANCELLED? → InvalidStatus                         │
//! │   3. InvoiceBalance::record_payment ── amount > balance? → rejected     │
//! │   4. PAY-nnnnnn, INSERT payment                                         │
//! │   5. UPDATE paid, balance, status, paid_date                            │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  reverse_payment(payment_id) is the mirror image: DELETE the payment,   │
//! │  subtract it, recompute status and paid_date, all in one transaction.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `paid_cents` always equals the sum of the invoice's payments and
//! `balance_cents` always equals `total_cents - paid_cents`. Nothing outside
//! this module writes either column.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{numbering, product};
use depot_core::invoice::{
    paid_date_after, status_after_payment, status_after_reversal, InvoiceBalance, NewInvoice,
    NewPayment,
};
use depot_core::numbering::DocumentPrefix;
use depot_core::{
    CoreError, DocumentKind, Invoice, InvoiceItem, InvoiceStatus, Money, Payment, ValidationError,
};

/// Payment terms applied when an invoice is created without a due date.
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

const INVOICE_COLUMNS: &str = "id, invoice_number, customer_name, delivery_id, status, \
     subtotal_cents, tax_rate_bps, tax_cents, total_cents, paid_cents, balance_cents, \
     issue_date, due_date, paid_date, notes, user_id, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, payment_number, invoice_id, amount_cents, method, reference, notes, user_id, created_at";

/// The invoice balance engine.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
    payment_terms_days: u32,
}

impl InvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository {
            pool,
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
        }
    }

    /// Overrides the default payment terms used for new invoices.
    pub fn with_payment_terms_days(mut self, days: u32) -> Self {
        self.payment_terms_days = days;
        self
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a DRAFT invoice with a fresh `INV-` number.
    ///
    /// Line totals, tax and total are computed here; `paid` starts at zero
    /// and `balance` at the total. When `delivery_id` is given it must name
    /// an applied delivery.
    pub async fn create(&self, input: &NewInvoice, user_id: &str) -> DbResult<Invoice> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::required("user_id").into());
        }
        input.validate()?;
        let totals = input.totals()?;

        let mut tx = self.pool.begin().await?;

        let number = numbering::next_in(&mut tx, DocumentPrefix::Invoice).await?;
        let now = Utc::now();

        if let Some(delivery_id) = &input.delivery_id {
            ensure_applied_delivery(&mut tx, delivery_id).await?;
        }
        for item in &input.items {
            product::ensure_active(&mut tx, &item.product_id).await?;
        }

        let id = Uuid::new_v4().to_string();
        let items: Vec<InvoiceItem> = input
            .items
            .iter()
            .zip(&totals.lines)
            .enumerate()
            .map(|(idx, (item, line))| InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: id.clone(),
                line_no: idx as i64 + 1,
                product_id: item.product_id.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                total_price_cents: line.cents(),
            })
            .collect();

        let due_date = match input.due_date {
            Some(due_date) => due_date,
            None => default_due_date(now, self.payment_terms_days)?,
        };

        let invoice = Invoice {
            id,
            invoice_number: number,
            customer_name: input.customer_name.trim().to_string(),
            delivery_id: input.delivery_id.clone(),
            status: InvoiceStatus::Draft,
            subtotal_cents: totals.subtotal.cents(),
            tax_rate_bps: input.tax_rate_bps,
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            paid_cents: 0,
            balance_cents: totals.total.cents(),
            issue_date: now,
            due_date: Some(due_date),
            paid_date: None,
            notes: input.notes.clone(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
            items,
        };

        insert_invoice(&mut tx, &invoice).await?;
        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            number = %invoice.invoice_number,
            total_cents = invoice.total_cents,
            "Invoice created"
        );
        Ok(invoice)
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    /// DRAFT → SENT.
    pub async fn send(&self, id: &str) -> DbResult<Invoice> {
        self.transition(id, "send", |status, _| status == InvoiceStatus::Draft, InvoiceStatus::Sent)
            .await
    }

    /// Cancels an invoice that has no payments and is not already closed.
    pub async fn cancel(&self, id: &str) -> DbResult<Invoice> {
        self.transition(
            id,
            "cancel",
            |status, paid_cents| {
                paid_cents == 0
                    && !matches!(status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
            },
            InvoiceStatus::Cancelled,
        )
        .await
    }

    async fn transition(
        &self,
        id: &str,
        operation: &str,
        allowed: impl Fn(InvoiceStatus, i64) -> bool,
        to: InvoiceStatus,
    ) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        touch(&mut tx, id).await?;
        let now = Utc::now();
        let mut invoice = load_invoice(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;

        if !allowed(invoice.status, invoice.paid_cents) {
            return Err(CoreError::InvalidStatus {
                entity: "Invoice".to_string(),
                id: invoice.invoice_number.clone(),
                status: invoice.status.to_string(),
                operation: operation.to_string(),
            }
            .into());
        }

        sqlx::query("UPDATE invoices SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(to)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            invoice_id = %id,
            number = %invoice.invoice_number,
            from = %invoice.status,
            to = %to,
            "Invoice status changed"
        );
        invoice.status = to;
        invoice.updated_at = now;
        Ok(invoice)
    }

    /// Flags SENT and PARTIAL invoices whose due date is before `now` as
    /// OVERDUE. Returns how many changed.
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = ?1
            WHERE status IN ('sent', 'partial')
              AND due_date IS NOT NULL
              AND due_date < ?1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let marked = result.rows_affected();
        if marked > 0 {
            info!(marked, "Invoices marked overdue");
        }
        Ok(marked)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records a payment and updates the invoice in one unit of work.
    ///
    /// ## Errors
    /// - `NotFound` - no such invoice
    /// - `Domain(InvalidStatus)` - the invoice is CANCELLED
    /// - `Domain(PaymentExceedsBalance)` - amount is more than is owed
    /// - `Domain(Validation)` - amount not positive, bad reference/notes
    pub async fn record_payment(&self, input: &NewPayment, user_id: &str) -> DbResult<Payment> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::required("user_id").into());
        }
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        touch(&mut tx, &input.invoice_id).await?;
        let now = Utc::now();
        let invoice = load_invoice(&mut tx, &input.invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", &input.invoice_id))?;

        if !invoice.status.accepts_payments() {
            return Err(CoreError::InvalidStatus {
                entity: "Invoice".to_string(),
                id: invoice.invoice_number.clone(),
                status: invoice.status.to_string(),
                operation: "record payment".to_string(),
            }
            .into());
        }

        let amount = Money::from_cents(input.amount_cents);
        let outcome = InvoiceBalance::of(&invoice).record_payment(&invoice.invoice_number, amount);
        let balance = match outcome {
            Ok(balance) => balance,
            Err(err) => {
                warn!(
                    invoice_id = %invoice.id,
                    amount_cents = input.amount_cents,
                    balance_cents = invoice.balance_cents,
                    error = %err,
                    "Payment rejected"
                );
                return Err(err.into());
            }
        };

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            payment_number: numbering::next_in(&mut tx, DocumentPrefix::Payment).await?,
            invoice_id: invoice.id.clone(),
            amount_cents: amount.cents(),
            method: input.method,
            reference: input.reference.clone(),
            notes: input.notes.clone(),
            user_id: user_id.to_string(),
            created_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ))
        .bind(&payment.id)
        .bind(&payment.payment_number)
        .bind(&payment.invoice_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(&payment.user_id)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let status = status_after_payment(invoice.status, &balance);
        let paid_date = paid_date_after(&balance, invoice.paid_date, now);
        store_balance(&mut tx, &invoice.id, &balance, status, paid_date, now).await?;

        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            payment = %payment.payment_number,
            amount_cents = payment.amount_cents,
            balance_cents = balance.balance().cents(),
            status = %status,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Deletes a payment and restores the invoice's balance.
    ///
    /// Returns the updated invoice.
    pub async fn reverse_payment(&self, payment_id: &str, user_id: &str) -> DbResult<Invoice> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::required("user_id").into());
        }

        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            r#"
            UPDATE invoices SET updated_at = updated_at
            WHERE id = (SELECT invoice_id FROM payments WHERE id = ?1)
            "#,
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if touched == 0 {
            return Err(DbError::not_found("Payment", payment_id));
        }
        let now = Utc::now();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Payment", payment_id))?;

        let mut invoice = load_invoice(&mut tx, &payment.invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", &payment.invoice_id))?;

        let balance = InvoiceBalance::of(&invoice).reverse_payment(payment.amount())?;

        sqlx::query("DELETE FROM payments WHERE id = ?1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;

        let status = if invoice.status == InvoiceStatus::Cancelled {
            InvoiceStatus::Cancelled
        } else {
            status_after_reversal(&balance, invoice.due_date, now)
        };
        let paid_date = paid_date_after(&balance, invoice.paid_date, now);
        store_balance(&mut tx, &invoice.id, &balance, status, paid_date, now).await?;

        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            payment = %payment.payment_number,
            amount_cents = payment.amount_cents,
            reversed_by = %user_id,
            status = %status,
            "Payment reversed"
        );

        invoice.paid_cents = balance.paid.cents();
        invoice.balance_cents = balance.balance().cents();
        invoice.status = status;
        invoice.paid_date = paid_date;
        invoice.updated_at = now;
        Ok(invoice)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an invoice with its items.
    pub async fn get(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        load_invoice(&mut conn, id).await
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;

        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM invoices WHERE invoice_number = ?1")
                .bind(number)
                .fetch_optional(&mut *conn)
                .await?;

        match id {
            Some(id) => load_invoice(&mut conn, &id).await,
            None => Ok(None),
        }
    }

    /// Lists invoice headers, newest first, optionally by status.
    pub async fn list(&self, status: Option<InvoiceStatus>, limit: u32) -> DbResult<Vec<Invoice>> {
        let limit = if limit == 0 { 100 } else { i64::from(limit) };

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Payments of one invoice in the order they were recorded.
    pub async fn payments(&self, invoice_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ?1 ORDER BY rowid"
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

// =============================================================================
// Unit-of-work helpers
// =============================================================================

/// First write of an invoice unit of work; fails with `NotFound` when the
/// invoice does not exist.
///
/// Changes nothing, but takes the write lock. Timestamps for the unit of
/// work are read after it returns, so they follow commit order.
async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let touched = sqlx::query("UPDATE invoices SET updated_at = updated_at WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if touched == 0 {
        return Err(DbError::not_found("Invoice", id));
    }
    Ok(())
}

fn default_due_date(issued: DateTime<Utc>, terms_days: u32) -> DbResult<DateTime<Utc>> {
    issued
        .checked_add_signed(ChronoDuration::days(i64::from(terms_days)))
        .ok_or_else(|| {
            CoreError::Overflow(format!("due date {terms_days} days after {issued}")).into()
        })
}

async fn ensure_applied_delivery(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    let row: Option<(DocumentKind, bool, String)> =
        sqlx::query_as("SELECT kind, is_applied, number FROM stock_documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        None => Err(DbError::not_found("Document", id)),
        Some((DocumentKind::Delivery, true, _)) => Ok(()),
        Some((DocumentKind::Delivery, false, number)) => Err(ValidationError::rule(
            "delivery_id",
            format!("delivery {number} has not been applied"),
        )
        .into()),
        Some((kind, _, number)) => Err(ValidationError::rule(
            "delivery_id",
            format!("{number} is a {kind}, not a delivery"),
        )
        .into()),
    }
}

async fn store_balance(
    conn: &mut SqliteConnection,
    id: &str,
    balance: &InvoiceBalance,
    status: InvoiceStatus,
    paid_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE invoices
        SET paid_cents = ?1, balance_cents = ?2, status = ?3, paid_date = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(balance.paid.cents())
    .bind(balance.balance().cents())
    .bind(status)
    .bind(paid_date)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    debug!(
        invoice_id = %id,
        paid_cents = balance.paid.cents(),
        balance_cents = balance.balance().cents(),
        status = %status,
        "Invoice balance stored"
    );
    Ok(())
}

async fn insert_invoice(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO invoices ({INVOICE_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#
    ))
    .bind(&invoice.id)
    .bind(&invoice.invoice_number)
    .bind(&invoice.customer_name)
    .bind(&invoice.delivery_id)
    .bind(invoice.status)
    .bind(invoice.subtotal_cents)
    .bind(invoice.tax_rate_bps)
    .bind(invoice.tax_cents)
    .bind(invoice.total_cents)
    .bind(invoice.paid_cents)
    .bind(invoice.balance_cents)
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.paid_date)
    .bind(&invoice.notes)
    .bind(&invoice.user_id)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &invoice.items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, line_no, product_id, description,
                quantity, unit_price_cents, total_price_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.invoice_id)
        .bind(item.line_no)
        .bind(&item.product_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn load_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(mut invoice) = invoice else {
        return Ok(None);
    };

    invoice.items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, line_no, product_id, description,
               quantity, unit_price_cents, total_price_cents
        FROM invoice_items
        WHERE invoice_id = ?1
        ORDER BY line_no
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(invoice))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_db, product};
    use crate::pool::Database;
    use depot_core::invoice::NewInvoiceItem;
    use depot_core::PaymentMethod;

    const USER: &str = "user-1";

    async fn invoice(db: &Database, unit_price_cents: i64, quantity: i64) -> Invoice {
        let p = product(db, "A-1").await;
        db.invoices()
            .create(
                &NewInvoice {
                    customer_name: "Globex".to_string(),
                    delivery_id: None,
                    items: vec![NewInvoiceItem {
                        product_id: p.id,
                        description: None,
                        quantity,
                        unit_price_cents,
                    }],
                    tax_rate_bps: 0,
                    due_date: None,
                    notes: None,
                },
                USER,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_computes_totals_and_due_date() {
        let db = memory_db().await;
        let inv = invoice(&db, 2_500, 4).await;

        assert_eq!(inv.invoice_number, "INV-000001");
        assert_eq!(inv.status, InvoiceStatus::Draft);
        assert_eq!(inv.total_cents, 10_000);
        assert_eq!(inv.balance_cents, 10_000);
        assert_eq!(inv.items[0].total_price_cents, 10_000);

        let due = inv.due_date.unwrap();
        assert_eq!((due - inv.issue_date).num_days(), i64::from(DEFAULT_PAYMENT_TERMS_DAYS));

        let loaded = db.invoices().get_by_number("INV-000001").await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.total_cents, 10_000);
    }

    #[tokio::test]
    async fn test_unrepresentable_due_date_is_an_error() {
        let db = memory_db().await;
        let p = product(&db, "A-1").await;

        let err = db
            .invoices()
            .with_payment_terms_days(u32::MAX)
            .create(
                &NewInvoice {
                    customer_name: "Globex".to_string(),
                    delivery_id: None,
                    items: vec![NewInvoiceItem {
                        product_id: p.id,
                        description: None,
                        quantity: 1,
                        unit_price_cents: 100,
                    }],
                    tax_rate_bps: 0,
                    due_date: None,
                    notes: None,
                },
                USER,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Overflow(_))));
        // Rolled back with the number it drew
        assert_eq!(db.numbering().current(DocumentPrefix::Invoice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_two_payments_then_reversal() {
        let db = memory_db().await;
        let inv = invoice(&db, 10_000, 1).await;
        db.invoices().send(&inv.id).await.unwrap();

        let first = db
            .invoices()
            .record_payment(&NewPayment::new(&inv.id, 4_000, PaymentMethod::Cash), USER)
            .await
            .unwrap();
        assert_eq!(first.payment_number, "PAY-000001");

        let after_first = db.invoices().get(&inv.id).await.unwrap().unwrap();
        assert_eq!(after_first.status, InvoiceStatus::Partial);
        assert_eq!(after_first.balance_cents, 6_000);

        db.invoices()
            .record_payment(&NewPayment::new(&inv.id, 6_000, PaymentMethod::BankTransfer), USER)
            .await
            .unwrap();
        let paid = db.invoices().get(&inv.id).await.unwrap().unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.balance_cents, 0);
        assert!(paid.paid_date.is_some());

        let reversed = db.invoices().reverse_payment(&first.id, USER).await.unwrap();
        assert_eq!(reversed.paid_cents, 6_000);
        assert_eq!(reversed.balance_cents, 4_000);
        assert_eq!(reversed.status, InvoiceStatus::Partial);
        assert!(reversed.paid_date.is_none());
        assert_eq!(db.invoices().payments(&inv.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overpayment_leaves_invoice_unchanged() {
        let db = memory_db().await;
        let inv = invoice(&db, 5_000, 1).await;

        let err = db
            .invoices()
            .record_payment(&NewPayment::new(&inv.id, 5_001, PaymentMethod::Card), USER)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::PaymentExceedsBalance { balance_cents: 5_000, .. })
        ));

        let unchanged = db.invoices().get(&inv.id).await.unwrap().unwrap();
        assert_eq!(unchanged.paid_cents, 0);
        assert!(db.invoices().payments(&inv.id).await.unwrap().is_empty());
        // The rolled-back payment did not consume a number
        assert_eq!(db.numbering().current(DocumentPrefix::Payment).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_rules() {
        let db = memory_db().await;
        let inv = invoice(&db, 1_000, 1).await;

        db.invoices().send(&inv.id).await.unwrap();
        assert!(matches!(
            db.invoices().send(&inv.id).await,
            Err(DbError::Domain(CoreError::InvalidStatus { .. }))
        ));

        db.invoices().cancel(&inv.id).await.unwrap();
        assert!(matches!(
            db.invoices()
                .record_payment(&NewPayment::new(&inv.id, 100, PaymentMethod::Cash), USER)
                .await,
            Err(DbError::Domain(CoreError::InvalidStatus { .. }))
        ));

        assert!(matches!(
            db.invoices().send("missing").await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.invoices().reverse_payment("missing", USER).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_overdue() {
        let db = memory_db().await;
        let inv = invoice(&db, 1_000, 1).await;

        // Drafts never age
        let later = Utc::now() + ChronoDuration::days(60);
        assert_eq!(db.invoices().mark_overdue(later).await.unwrap(), 0);

        db.invoices().send(&inv.id).await.unwrap();
        assert_eq!(db.invoices().mark_overdue(Utc::now()).await.unwrap(), 0);
        assert_eq!(db.invoices().mark_overdue(later).await.unwrap(), 1);

        let overdue = db.invoices().list(Some(InvoiceStatus::Overdue), 0).await.unwrap();
        assert_eq!(overdue.len(), 1);

        // Overdue invoices still take payments
        db.invoices()
            .record_payment(&NewPayment::new(&inv.id, 1_000, PaymentMethod::Cash), USER)
            .await
            .unwrap();
        let paid = db.invoices().get(&inv.id).await.unwrap().unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
    }
}

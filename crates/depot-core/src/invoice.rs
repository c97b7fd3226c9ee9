//! # Invoice Balance Math
//!
//! Totals, payment application and status recomputation for invoices.
//!
//! ## Balance Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total = Σ(unit_price × qty) + tax                                     │
//! │                                                                         │
//! │  record_payment(amount)            reverse_payment(amount)             │
//! │    amount <= 0        → invalid      paid -= amount                    │
//! │    amount > balance   → exceeds      balance = total - paid            │
//! │    paid += amount                    paid == 0 → SENT (or OVERDUE)     │
//! │    balance = total - paid            paid  > 0 → PARTIAL               │
//! │    balance == 0 → PAID                                                 │
//! │    paid     > 0 → PARTIAL                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status after a reversal is recomputed from the amounts and the due date,
//! not from a status history: an unpaid invoice is OVERDUE once its due date
//! has passed and SENT otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, TaxRate};
use crate::types::{Invoice, InvoiceStatus, PaymentMethod};
use crate::validation::{self, ValidationResult};

// =============================================================================
// Input Types
// =============================================================================

/// One submitted invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoiceItem {
    pub product_id: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// An invoice as submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub customer_name: String,
    /// Delivery that shipped the goods being billed.
    pub delivery_id: Option<String>,
    pub items: Vec<NewInvoiceItem>,
    #[serde(default)]
    pub tax_rate_bps: i64,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewInvoice {
    /// Field-level validation.
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_name("customer_name", &self.customer_name)?;
        if let Some(delivery_id) = &self.delivery_id {
            validation::validate_id("delivery_id", delivery_id)?;
        }
        validation::validate_tax_rate_bps(self.tax_rate_bps)?;
        validation::validate_optional_text("notes", self.notes.as_deref())?;
        validation::validate_item_count(self.items.len())?;

        for item in &self.items {
            validation::validate_id("product_id", &item.product_id)?;
            validation::validate_quantity(item.quantity)?;
            validation::validate_price_cents(item.unit_price_cents)?;
            validation::validate_optional_text("description", item.description.as_deref())?;
        }

        Ok(())
    }

    /// Computes line totals, tax and grand total.
    pub fn totals(&self) -> CoreResult<InvoiceTotals> {
        let mut lines = Vec::with_capacity(self.items.len());
        let mut subtotal = Money::zero();

        for item in &self.items {
            let line = Money::from_cents(item.unit_price_cents)
                .checked_mul_quantity(item.quantity)
                .ok_or_else(|| CoreError::Overflow("invoice line total".to_string()))?;
            subtotal = subtotal
                .checked_add(line)
                .ok_or_else(|| CoreError::Overflow("invoice subtotal".to_string()))?;
            lines.push(line);
        }

        let rate = TaxRate::from_bps(self.tax_rate_bps.clamp(0, 10000) as u32);
        let tax = subtotal.calculate_tax(rate);
        let total = subtotal
            .checked_add(tax)
            .ok_or_else(|| CoreError::Overflow("invoice total".to_string()))?;

        Ok(InvoiceTotals {
            lines,
            subtotal,
            tax,
            total,
        })
    }
}

/// Computed amounts of a new invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceTotals {
    /// One entry per item, in order.
    pub lines: Vec<Money>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// A payment as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub invoice_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(invoice_id: impl Into<String>, amount_cents: i64, method: PaymentMethod) -> Self {
        NewPayment {
            invoice_id: invoice_id.into(),
            amount_cents,
            method,
            reference: None,
            notes: None,
        }
    }

    /// Field-level validation.
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_id("invoice_id", &self.invoice_id)?;
        validation::validate_payment_amount(self.amount_cents)?;
        validation::validate_optional_text("reference", self.reference.as_deref())?;
        validation::validate_optional_text("notes", self.notes.as_deref())
    }
}

// =============================================================================
// Invoice Balance
// =============================================================================

/// The paid/owed pair of an invoice.
///
/// `balance() == total - paid`, and the operations below keep
/// `0 <= paid <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceBalance {
    pub total: Money,
    pub paid: Money,
}

impl InvoiceBalance {
    pub const fn new(total: Money, paid: Money) -> Self {
        InvoiceBalance { total, paid }
    }

    /// Balance of a stored invoice, from its total and paid amounts.
    pub fn of(invoice: &Invoice) -> Self {
        InvoiceBalance::new(invoice.total(), invoice.paid())
    }

    #[inline]
    pub fn balance(&self) -> Money {
        self.total - self.paid
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.balance().is_zero()
    }

    /// Adds a payment.
    ///
    /// ```rust
    /// use depot_core::invoice::InvoiceBalance;
    /// use depot_core::Money;
    ///
    /// let b = InvoiceBalance::new(Money::from_cents(100), Money::zero());
    /// let b = b.record_payment("INV-000001", Money::from_cents(40)).unwrap();
    /// assert_eq!(b.balance().cents(), 60);
    /// assert!(b.record_payment("INV-000001", Money::from_cents(61)).is_err());
    /// ```
    pub fn record_payment(&self, invoice_number: &str, amount: Money) -> CoreResult<Self> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        let balance = self.balance();
        if amount > balance {
            return Err(CoreError::PaymentExceedsBalance {
                invoice_number: invoice_number.to_string(),
                balance_cents: balance.cents(),
                amount_cents: amount.cents(),
            });
        }

        let paid = self
            .paid
            .checked_add(amount)
            .ok_or_else(|| CoreError::Overflow("invoice paid amount".to_string()))?;

        Ok(InvoiceBalance::new(self.total, paid))
    }

    /// Removes a previously recorded payment.
    pub fn reverse_payment(&self, amount: Money) -> CoreResult<Self> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        if amount > self.paid {
            return Err(ValidationError::rule(
                "amount",
                format!("reversal of {} exceeds paid amount {}", amount, self.paid),
            )
            .into());
        }

        Ok(InvoiceBalance::new(self.total, self.paid - amount))
    }
}

// =============================================================================
// Status Recomputation
// =============================================================================

/// Status after a payment has been added.
pub fn status_after_payment(current: InvoiceStatus, balance: &InvoiceBalance) -> InvoiceStatus {
    if balance.is_settled() {
        InvoiceStatus::Paid
    } else if balance.paid.is_positive() {
        InvoiceStatus::Partial
    } else {
        current
    }
}

/// Status after a payment has been reversed.
pub fn status_after_reversal(
    balance: &InvoiceBalance,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> InvoiceStatus {
    if balance.paid.is_zero() {
        if is_past_due(due_date, now) {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Sent
        }
    } else if balance.is_settled() {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::Partial
    }
}

/// `paid_date` to store after a balance change: set when fully paid (kept if
/// already set), cleared otherwise.
pub fn paid_date_after(
    balance: &InvoiceBalance,
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if balance.is_settled() {
        Some(previous.unwrap_or(now))
    } else {
        None
    }
}

fn is_past_due(due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    due_date.map_or(false, |due| due < now)
}

/// Whether an invoice should be flagged OVERDUE at `now`.
///
/// Only SENT and PARTIAL invoices age into OVERDUE.
pub fn should_mark_overdue(
    status: InvoiceStatus,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    matches!(status, InvoiceStatus::Sent | InvoiceStatus::Partial) && is_past_due(due_date, now)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn balance(total: i64, paid: i64) -> InvoiceBalance {
        InvoiceBalance::new(Money::from_cents(total), Money::from_cents(paid))
    }

    #[test]
    fn test_two_payments_settle_invoice() {
        let b = balance(100, 0);
        let b = b.record_payment("INV-1", Money::from_cents(40)).unwrap();
        assert_eq!(status_after_payment(InvoiceStatus::Sent, &b), InvoiceStatus::Partial);

        let b = b.record_payment("INV-1", Money::from_cents(60)).unwrap();
        assert_eq!(b.balance().cents(), 0);
        assert_eq!(b.paid.cents(), 100);
        assert_eq!(status_after_payment(InvoiceStatus::Partial, &b), InvoiceStatus::Paid);
    }

    #[test]
    fn test_reversal_back_to_partial() {
        let b = balance(100, 100).reverse_payment(Money::from_cents(60)).unwrap();
        assert_eq!(b.paid.cents(), 40);
        assert_eq!(b.balance().cents(), 60);
        assert_eq!(status_after_reversal(&b, None, Utc::now()), InvoiceStatus::Partial);
    }

    #[test]
    fn test_reversal_to_zero_depends_on_due_date() {
        let now = Utc::now();
        let b = balance(100, 40).reverse_payment(Money::from_cents(40)).unwrap();

        assert_eq!(status_after_reversal(&b, None, now), InvoiceStatus::Sent);
        assert_eq!(
            status_after_reversal(&b, Some(now + Duration::days(3)), now),
            InvoiceStatus::Sent
        );
        assert_eq!(
            status_after_reversal(&b, Some(now - Duration::days(3)), now),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn test_payment_rules() {
        let b = balance(100, 0);
        assert!(matches!(
            b.record_payment("INV-1", Money::zero()),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            b.record_payment("INV-1", Money::from_cents(-5)),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            b.record_payment("INV-1", Money::from_cents(101)),
            Err(CoreError::PaymentExceedsBalance {
                balance_cents: 100,
                amount_cents: 101,
                ..
            })
        ));
        assert!(balance(100, 30).reverse_payment(Money::from_cents(31)).is_err());
    }

    #[test]
    fn test_paid_date() {
        let now = Utc::now();
        let earlier = now - Duration::days(1);
        assert_eq!(paid_date_after(&balance(100, 100), None, now), Some(now));
        assert_eq!(paid_date_after(&balance(100, 100), Some(earlier), now), Some(earlier));
        assert_eq!(paid_date_after(&balance(100, 60), Some(earlier), now), None);
    }

    #[test]
    fn test_overdue_detection() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        assert!(should_mark_overdue(InvoiceStatus::Sent, past, now));
        assert!(should_mark_overdue(InvoiceStatus::Partial, past, now));
        assert!(!should_mark_overdue(InvoiceStatus::Draft, past, now));
        assert!(!should_mark_overdue(InvoiceStatus::Paid, past, now));
        assert!(!should_mark_overdue(InvoiceStatus::Sent, None, now));
    }

    #[test]
    fn test_totals_with_tax() {
        let invoice = NewInvoice {
            customer_name: "Globex".to_string(),
            delivery_id: None,
            items: vec![
                NewInvoiceItem {
                    product_id: "33333333-3333-4333-8333-333333333333".to_string(),
                    description: None,
                    quantity: 3,
                    unit_price_cents: 299,
                },
                NewInvoiceItem {
                    product_id: "44444444-4444-4444-8444-444444444444".to_string(),
                    description: Some("Freight".to_string()),
                    quantity: 1,
                    unit_price_cents: 103,
                },
            ],
            tax_rate_bps: 1000,
            due_date: None,
            notes: None,
        };

        assert!(invoice.validate().is_ok());
        let totals = invoice.totals().unwrap();
        assert_eq!(totals.lines, vec![Money::from_cents(897), Money::from_cents(103)]);
        assert_eq!(totals.subtotal.cents(), 1000);
        assert_eq!(totals.tax.cents(), 100);
        assert_eq!(totals.total.cents(), 1100);
    }

    #[test]
    fn test_new_invoice_rejects_bad_input() {
        let invoice = NewInvoice {
            customer_name: String::new(),
            delivery_id: None,
            items: vec![],
            tax_rate_bps: 0,
            due_date: None,
            notes: None,
        };
        assert!(invoice.validate().is_err());

        let payment =
            NewPayment::new("55555555-5555-4555-8555-555555555555", 0, PaymentMethod::Cash);
        assert!(payment.validate().is_err());
    }
}

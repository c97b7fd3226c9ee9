//! Property-based tests for the pure ledger rules
//!
//! These check invariants that must hold for every input, not just the
//! hand-picked cases in the unit tests: stock never goes negative, transfers
//! conserve the total across locations, and invoice balances always equal
//! total minus paid.

use std::collections::HashMap;

use depot_core::document::{DocumentBody, LineItem};
use depot_core::invoice::{status_after_payment, InvoiceBalance};
use depot_core::stock::{apply_delta, project_deltas, StockKey};
use depot_core::{CoreError, InvoiceStatus, Money};
use proptest::prelude::*;

const LOC_A: &str = "11111111-1111-4111-8111-111111111111";
const LOC_B: &str = "22222222-2222-4222-8222-222222222222";

// PROPERTY TEST STRATEGIES

/// Strategy for product ids drawn from a small pool, so lines repeat products
fn product_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("p1"), Just("p2"), Just("p3")].prop_map(str::to_string)
}

/// Strategy for transfer/delivery lines (positive magnitudes)
fn lines_strategy() -> impl Strategy<Value = Vec<LineItem>> {
    prop::collection::vec(
        (product_strategy(), 1i64..=50).prop_map(|(p, q)| LineItem::new(p, q)),
        1..8,
    )
}

fn total_of(levels: &HashMap<StockKey, i64>, product: &str) -> i64 {
    levels
        .iter()
        .filter(|((p, _), _)| p == product)
        .map(|(_, q)| *q)
        .sum()
}

// PROPERTY TESTS
proptest! {
    /// Property: apply_delta either fails or yields a non-negative quantity
    /// whose change equals the delta.
    #[test]
    fn prop_apply_delta_never_negative(current in 0i64..1_000, delta in -2_000i64..2_000) {
        match apply_delta("p", "l", current, delta) {
            Ok(change) => {
                prop_assert!(change.after >= 0);
                prop_assert_eq!(change.changed(), delta);
                prop_assert_eq!(change.before, current);
            }
            Err(CoreError::InsufficientStock { available, requested, .. }) => {
                prop_assert!(current + delta < 0);
                prop_assert_eq!(available, current);
                prop_assert_eq!(requested, -delta);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
        }
    }

    /// Property: a successful transfer projection leaves each product's
    /// total across locations unchanged.
    #[test]
    fn prop_transfer_conserves_totals(
        stock in prop::collection::vec((product_strategy(), 0i64..200), 0..6),
        items in lines_strategy(),
    ) {
        let mut levels: HashMap<StockKey, i64> = HashMap::new();
        for (product, qty) in &stock {
            *levels.entry((product.clone(), LOC_A.to_string())).or_insert(0) += qty;
        }
        let before: Vec<i64> = ["p1", "p2", "p3"].iter().map(|p| total_of(&levels, p)).collect();

        let transfer = DocumentBody::Transfer {
            from_location_id: LOC_A.to_string(),
            to_location_id: LOC_B.to_string(),
            items,
        };

        let mut projected = levels.clone();
        if project_deltas(&mut projected, &transfer.compute_stock_deltas()).is_ok() {
            let after: Vec<i64> =
                ["p1", "p2", "p3"].iter().map(|p| total_of(&projected, p)).collect();
            prop_assert_eq!(before, after);
            prop_assert!(projected.values().all(|q| *q >= 0));
        }
    }

    /// Property: deliveries succeed exactly when each product's demand fits
    /// its stock at the location.
    #[test]
    fn prop_delivery_succeeds_iff_stock_covers_demand(
        on_hand in 0i64..100,
        items in lines_strategy(),
    ) {
        let mut levels: HashMap<StockKey, i64> = HashMap::new();
        for p in ["p1", "p2", "p3"] {
            levels.insert((p.to_string(), LOC_A.to_string()), on_hand);
        }

        let mut demand: HashMap<&str, i64> = HashMap::new();
        for item in &items {
            *demand.entry(item.product_id.as_str()).or_insert(0) += item.quantity;
        }
        let covered = demand.values().all(|d| *d <= on_hand);

        let delivery = DocumentBody::Delivery {
            location_id: LOC_A.to_string(),
            customer: "Acme".to_string(),
            items: items.clone(),
        };
        let result = project_deltas(&mut levels, &delivery.compute_stock_deltas());
        prop_assert_eq!(result.is_ok(), covered);
    }

    /// Property: after any sequence of accepted payments, balance equals
    /// total minus paid and never goes negative.
    #[test]
    fn prop_invoice_balance_invariant(
        total in 1i64..100_000,
        payments in prop::collection::vec(-100i64..50_000, 0..12),
    ) {
        let mut balance = InvoiceBalance::new(Money::from_cents(total), Money::zero());
        let mut status = InvoiceStatus::Sent;

        for amount in payments {
            match balance.record_payment("INV-000001", Money::from_cents(amount)) {
                Ok(next) => {
                    balance = next;
                    status = status_after_payment(status, &balance);
                }
                Err(_) => {
                    prop_assert!(amount <= 0 || amount > balance.balance().cents());
                }
            }

            prop_assert_eq!(balance.balance(), balance.total - balance.paid);
            prop_assert!(!balance.balance().is_negative());
            prop_assert!(!balance.paid.is_negative());
            prop_assert_eq!(status == InvoiceStatus::Paid, balance.is_settled());
        }
    }
}

//! # Stock Arithmetic
//!
//! The non-negativity rule for on-hand quantities, independent of storage.
//!
//! ```text
//! current ──(+ delta)──► next
//!                         │
//!                         ├── next >= 0 → QuantityChange { before, after }
//!                         └── next <  0 → InsufficientStock
//! ```
//!
//! depot-db calls [`apply_delta`] inside the apply transaction for each
//! delta, after reading the current level on the same connection.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::MoveType;

/// One signed change to one (product, location) pair, tagged with the move
/// type the history entry will carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockDelta {
    pub product_id: String,
    pub location_id: String,
    pub delta: i64,
    pub move_type: MoveType,
}

/// Before/after quantities of one applied delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuantityChange {
    pub before: i64,
    pub after: i64,
}

impl QuantityChange {
    /// Signed change, `after - before`.
    #[inline]
    pub const fn changed(&self) -> i64 {
        self.after - self.before
    }
}

/// Applies `delta` to `current`, refusing to go below zero.
///
/// ```rust
/// use depot_core::stock::apply_delta;
///
/// let change = apply_delta("p", "l", 0, 10).unwrap();
/// assert_eq!((change.before, change.after, change.changed()), (0, 10, 10));
///
/// assert!(apply_delta("p", "l", 3, -5).is_err());
/// ```
pub fn apply_delta(
    product_id: &str,
    location_id: &str,
    current: i64,
    delta: i64,
) -> CoreResult<QuantityChange> {
    let next = current
        .checked_add(delta)
        .ok_or_else(|| CoreError::Overflow(format!("stock of {product_id} at {location_id}")))?;

    if next < 0 {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            location_id: location_id.to_string(),
            available: current,
            requested: delta.saturating_neg(),
        });
    }

    Ok(QuantityChange {
        before: current,
        after: next,
    })
}

/// Key of a stock level: (product_id, location_id).
pub type StockKey = (String, String);

/// Applies `deltas` in order to a snapshot of levels (missing keys are 0).
///
/// The snapshot is updated in place, so later deltas see earlier ones; the
/// first delta that would go negative aborts with `InsufficientStock`.
/// Used to check a whole document against known levels before anything is
/// written.
pub fn project_deltas(
    levels: &mut HashMap<StockKey, i64>,
    deltas: &[StockDelta],
) -> CoreResult<Vec<QuantityChange>> {
    let mut changes = Vec::with_capacity(deltas.len());

    for d in deltas {
        let key = (d.product_id.clone(), d.location_id.clone());
        let current = levels.get(&key).copied().unwrap_or(0);
        let change = apply_delta(&d.product_id, &d.location_id, current, d.delta)?;
        levels.insert(key, change.after);
        changes.push(change);
    }

    Ok(changes)
}

// =============================================================================
// Unit Tests
// =============================================================================

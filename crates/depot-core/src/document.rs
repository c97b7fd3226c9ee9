//! # Stock Document Semantics
//!
//! What each document variant does to stock, as data.
//!
//! ## Variant Table
//! ```text
//! ┌────────────┬──────────────────────────┬──────────────────┬──────────────────────────┐
//! │ Variant    │ Source location          │ Destination      │ Move type(s)             │
//! ├────────────┼──────────────────────────┼──────────────────┼──────────────────────────┤
//! │ Receipt    │ += qty                   │ -                │ RECEIPT                  │
//! │ Delivery   │ -= qty                   │ -                │ DELIVERY                 │
//! │ Transfer   │ -= qty                   │ += qty           │ TRANSFER_OUT/TRANSFER_IN │
//! │ Adjustment │ += signed qty            │ -                │ ADJUSTMENT_INCREASE/     │
//! │            │                          │                  │ ADJUSTMENT_DECREASE      │
//! └────────────┴──────────────────────────┴──────────────────┴──────────────────────────┘
//! ```
//!
//! The apply routine in depot-db never looks at the variant: it asks
//! [`DocumentBody::compute_stock_deltas`] for the list of changes and
//! applies them in order.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::stock::StockDelta;
use crate::types::{DocumentKind, MoveType, StockDocument};
use crate::validation::{self, ValidationResult};

// =============================================================================
// Input Types
// =============================================================================

/// One submitted line: a product and a quantity.
///
/// The quantity is a positive magnitude, except for adjustments where it is
/// the signed delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        LineItem {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Variant-specific part of a stock document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentBody {
    Receipt {
        location_id: String,
        supplier: String,
        items: Vec<LineItem>,
    },
    Delivery {
        location_id: String,
        customer: String,
        items: Vec<LineItem>,
    },
    Transfer {
        from_location_id: String,
        to_location_id: String,
        items: Vec<LineItem>,
    },
    Adjustment {
        location_id: String,
        reason: String,
        items: Vec<LineItem>,
    },
}

/// A document as submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(flatten)]
    pub body: DocumentBody,
    pub notes: Option<String>,
}

impl NewDocument {
    pub fn new(body: DocumentBody) -> Self {
        NewDocument { body, notes: None }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Field-level validation (no stock or catalog lookups).
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_optional_text("notes", self.notes.as_deref())?;
        self.body.validate()
    }
}

// =============================================================================
// DocumentBody
// =============================================================================

impl DocumentBody {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentBody::Receipt { .. } => DocumentKind::Receipt,
            DocumentBody::Delivery { .. } => DocumentKind::Delivery,
            DocumentBody::Transfer { .. } => DocumentKind::Transfer,
            DocumentBody::Adjustment { .. } => DocumentKind::Adjustment,
        }
    }

    pub fn items(&self) -> &[LineItem] {
        match self {
            DocumentBody::Receipt { items, .. }
            | DocumentBody::Delivery { items, .. }
            | DocumentBody::Transfer { items, .. }
            | DocumentBody::Adjustment { items, .. } => items.as_slice(),
        }
    }

    /// The location stored as the document's `location_id` (the source, for
    /// transfers).
    pub fn location_id(&self) -> &str {
        match self {
            DocumentBody::Receipt { location_id, .. }
            | DocumentBody::Delivery { location_id, .. }
            | DocumentBody::Adjustment { location_id, .. } => location_id.as_str(),
            DocumentBody::Transfer {
                from_location_id, ..
            } => from_location_id.as_str(),
        }
    }

    pub fn to_location_id(&self) -> Option<&str> {
        match self {
            DocumentBody::Transfer { to_location_id, .. } => Some(to_location_id.as_str()),
            _ => None,
        }
    }

    /// Every location this document touches.
    pub fn location_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.location_id()];
        if let Some(to) = self.to_location_id() {
            ids.push(to);
        }
        ids
    }

    /// Supplier or customer name.
    pub fn partner(&self) -> Option<&str> {
        match self {
            DocumentBody::Receipt { supplier, .. } => Some(supplier.as_str()),
            DocumentBody::Delivery { customer, .. } => Some(customer.as_str()),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DocumentBody::Adjustment { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Field-level validation.
    ///
    /// ## Rules
    /// - At least one item, at most `MAX_DOCUMENT_ITEMS`
    /// - Receipt needs a supplier, delivery a customer, adjustment a reason
    /// - Transfer source and destination differ
    /// - Quantities strictly positive, adjustments non-zero
    pub fn validate(&self) -> ValidationResult<()> {
        match self {
            DocumentBody::Receipt {
                location_id,
                supplier,
                ..
            } => {
                validation::validate_id("location_id", location_id)?;
                validation::validate_name("supplier", supplier)?;
            }
            DocumentBody::Delivery {
                location_id,
                customer,
                ..
            } => {
                validation::validate_id("location_id", location_id)?;
                validation::validate_name("customer", customer)?;
            }
            DocumentBody::Transfer {
                from_location_id,
                to_location_id,
                ..
            } => {
                validation::validate_id("from_location_id", from_location_id)?;
                validation::validate_id("to_location_id", to_location_id)?;
                if from_location_id == to_location_id {
                    return Err(ValidationError::MustDiffer {
                        field: "to_location_id".to_string(),
                        other: "from_location_id".to_string(),
                    });
                }
            }
            DocumentBody::Adjustment {
                location_id,
                reason,
                ..
            } => {
                validation::validate_id("location_id", location_id)?;
                validation::validate_name("reason", reason)?;
            }
        }

        let items = self.items();
        validation::validate_item_count(items.len())?;

        for item in items {
            validation::validate_id("product_id", &item.product_id)?;
            if self.kind() == DocumentKind::Adjustment {
                validation::validate_signed_quantity(item.quantity)?;
            } else {
                validation::validate_quantity(item.quantity)?;
            }
        }

        Ok(())
    }

    /// The stock changes applying this document makes, in application order.
    ///
    /// Items keep their submitted order; a transfer line yields its
    /// TRANSFER_OUT immediately followed by the mirrored TRANSFER_IN.
    ///
    /// ```rust
    /// use depot_core::document::{DocumentBody, LineItem};
    /// use depot_core::MoveType;
    ///
    /// let transfer = DocumentBody::Transfer {
    ///     from_location_id: "a".into(),
    ///     to_location_id: "b".into(),
    ///     items: vec![LineItem::new("p", 5)],
    /// };
    /// let deltas = transfer.compute_stock_deltas();
    /// assert_eq!(deltas[0].delta, -5);
    /// assert_eq!(deltas[0].move_type, MoveType::TransferOut);
    /// assert_eq!(deltas[1].delta, 5);
    /// assert_eq!(deltas[1].location_id, "b");
    /// ```
    pub fn compute_stock_deltas(&self) -> Vec<StockDelta> {
        fn single(
            location_id: &str,
            delta: i64,
            move_type: MoveType,
            product_id: &str,
        ) -> StockDelta {
            StockDelta {
                product_id: product_id.to_string(),
                location_id: location_id.to_string(),
                delta,
                move_type,
            }
        }

        match self {
            DocumentBody::Receipt {
                location_id, items, ..
            } => items
                .iter()
                .map(|i| single(location_id, i.quantity, MoveType::Receipt, &i.product_id))
                .collect(),
            DocumentBody::Delivery {
                location_id, items, ..
            } => items
                .iter()
                .map(|i| single(location_id, -i.quantity, MoveType::Delivery, &i.product_id))
                .collect(),
            DocumentBody::Transfer {
                from_location_id,
                to_location_id,
                items,
            } => items
                .iter()
                .flat_map(|i| {
                    [
                        single(from_location_id, -i.quantity, MoveType::TransferOut, &i.product_id),
                        single(to_location_id, i.quantity, MoveType::TransferIn, &i.product_id),
                    ]
                })
                .collect(),
            DocumentBody::Adjustment {
                location_id, items, ..
            } => items
                .iter()
                .map(|i| {
                    let move_type = if i.quantity >= 0 {
                        MoveType::AdjustmentIncrease
                    } else {
                        MoveType::AdjustmentDecrease
                    };
                    single(location_id, i.quantity, move_type, &i.product_id)
                })
                .collect(),
        }
    }

    /// Rebuilds the body of a stored document from its header and items.
    pub fn from_stored(doc: &StockDocument) -> CoreResult<Self> {
        let mut stored = doc.items.clone();
        stored.sort_by_key(|i| i.line_no);
        let items: Vec<LineItem> = stored
            .into_iter()
            .map(|i| LineItem {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect();

        let location_id = doc.location_id.clone();
        let body = match doc.kind {
            DocumentKind::Receipt => DocumentBody::Receipt {
                location_id,
                supplier: doc.partner.clone().unwrap_or_default(),
                items,
            },
            DocumentKind::Delivery => DocumentBody::Delivery {
                location_id,
                customer: doc.partner.clone().unwrap_or_default(),
                items,
            },
            DocumentKind::Transfer => DocumentBody::Transfer {
                from_location_id: location_id,
                to_location_id: doc
                    .to_location_id
                    .clone()
                    .ok_or_else(|| CoreError::from(ValidationError::required("to_location_id")))?,
                items,
            },
            DocumentKind::Adjustment => DocumentBody::Adjustment {
                location_id,
                reason: doc.reason.clone().unwrap_or_default(),
                items,
            },
        };

        Ok(body)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentItem;
    use chrono::Utc;

    const LOC_A: &str = "11111111-1111-4111-8111-111111111111";
    const LOC_B: &str = "22222222-2222-4222-8222-222222222222";
    const PROD: &str = "33333333-3333-4333-8333-333333333333";

    fn receipt(qty: i64) -> DocumentBody {
        DocumentBody::Receipt {
            location_id: LOC_A.to_string(),
            supplier: "Acme Supply".to_string(),
            items: vec![LineItem::new(PROD, qty)],
        }
    }

    #[test]
    fn test_receipt_deltas() {
        let deltas = receipt(10).compute_stock_deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].delta, 10);
        assert_eq!(deltas[0].move_type, MoveType::Receipt);
        assert_eq!(deltas[0].location_id, LOC_A);
    }

    #[test]
    fn test_delivery_deltas_are_negative() {
        let body = DocumentBody::Delivery {
            location_id: LOC_A.to_string(),
            customer: "Globex".to_string(),
            items: vec![LineItem::new(PROD, 4), LineItem::new(PROD, 6)],
        };
        let deltas = body.compute_stock_deltas();
        assert_eq!(deltas.iter().map(|d| d.delta).collect::<Vec<_>>(), vec![-4, -6]);
        assert!(deltas.iter().all(|d| d.move_type == MoveType::Delivery));
    }

    #[test]
    fn test_transfer_conserves_quantity() {
        let body = DocumentBody::Transfer {
            from_location_id: LOC_A.to_string(),
            to_location_id: LOC_B.to_string(),
            items: vec![LineItem::new(PROD, 5)],
        };
        let deltas = body.compute_stock_deltas();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas.iter().map(|d| d.delta).sum::<i64>(), 0);
        assert_eq!(deltas[0].move_type, MoveType::TransferOut);
        assert_eq!(deltas[1].move_type, MoveType::TransferIn);
    }

    #[test]
    fn test_adjustment_move_type_follows_sign() {
        let body = DocumentBody::Adjustment {
            location_id: LOC_A.to_string(),
            reason: "Cycle count".to_string(),
            items: vec![LineItem::new(PROD, 3), LineItem::new(PROD, -5)],
        };
        let deltas = body.compute_stock_deltas();
        assert_eq!(deltas[0].move_type, MoveType::AdjustmentIncrease);
        assert_eq!(deltas[1].move_type, MoveType::AdjustmentDecrease);
        assert_eq!(deltas[1].delta, -5);
    }

    #[test]
    fn test_validation_rules() {
        assert!(receipt(10).validate().is_ok());
        assert!(receipt(0).validate().is_err());
        assert!(receipt(-1).validate().is_err());

        let no_supplier = DocumentBody::Receipt {
            location_id: LOC_A.to_string(),
            supplier: "  ".to_string(),
            items: vec![LineItem::new(PROD, 1)],
        };
        assert!(no_supplier.validate().is_err());

        let no_items = DocumentBody::Delivery {
            location_id: LOC_A.to_string(),
            customer: "Globex".to_string(),
            items: vec![],
        };
        assert!(matches!(
            no_items.validate(),
            Err(ValidationError::Required { .. })
        ));

        let same_place = DocumentBody::Transfer {
            from_location_id: LOC_A.to_string(),
            to_location_id: LOC_A.to_string(),
            items: vec![LineItem::new(PROD, 1)],
        };
        assert!(matches!(
            same_place.validate(),
            Err(ValidationError::MustDiffer { .. })
        ));

        let zero_adjustment = DocumentBody::Adjustment {
            location_id: LOC_A.to_string(),
            reason: "Damage".to_string(),
            items: vec![LineItem::new(PROD, 0)],
        };
        assert!(zero_adjustment.validate().is_err());

        let negative_adjustment = DocumentBody::Adjustment {
            location_id: LOC_A.to_string(),
            reason: "Damage".to_string(),
            items: vec![LineItem::new(PROD, -2)],
        };
        assert!(negative_adjustment.validate().is_ok());
    }

    #[test]
    fn test_rebuild_from_stored_transfer() {
        let now = Utc::now();
        let doc = StockDocument {
            id: "doc".to_string(),
            kind: DocumentKind::Transfer,
            number: "TRF-000001".to_string(),
            location_id: LOC_A.to_string(),
            to_location_id: Some(LOC_B.to_string()),
            partner: None,
            reason: None,
            user_id: "u1".to_string(),
            notes: None,
            is_applied: false,
            applied_at: None,
            applied_by: None,
            created_at: now,
            updated_at: now,
            items: vec![
                DocumentItem {
                    id: "i2".to_string(),
                    document_id: "doc".to_string(),
                    line_no: 2,
                    product_id: "second".to_string(),
                    quantity: 1,
                },
                DocumentItem {
                    id: "i1".to_string(),
                    document_id: "doc".to_string(),
                    line_no: 1,
                    product_id: "first".to_string(),
                    quantity: 5,
                },
            ],
        };

        let body = DocumentBody::from_stored(&doc).unwrap();
        assert_eq!(body.kind(), DocumentKind::Transfer);
        assert_eq!(body.items()[0].product_id, "first");
        assert_eq!(body.location_ids(), vec![LOC_A, LOC_B]);

        let broken = StockDocument {
            to_location_id: None,
            ..doc
        };
        assert!(DocumentBody::from_stored(&broken).is_err());
    }

    #[test]
    fn test_new_document_serde_shape() {
        let doc = NewDocument::new(receipt(2)).with_notes("PO 4411");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["kind"], "receipt");
        assert_eq!(json["supplier"], "Acme Supply");
        assert_eq!(json["notes"], "PO 4411");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgewms_core::Quantity;
use forgewms_warehouse::ExternalOrderRef;

use crate::ErpError;

/// Point-in-time copy of one ERP order line. Display data only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLineSnapshot {
    pub key: ExternalOrderRef,
    pub item_code: String,
    pub description: Option<String>,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    /// Quantity as reported by the ERP (not authoritative locally).
    pub quantity: Quantity,
    pub open_quantity: Option<Quantity>,
    pub fetched_at: DateTime<Utc>,
}

/// Result of matching candidates against an exact key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub snapshot: ExternalLineSnapshot,
    /// How many candidates carried the key (1 unless the ERP broke uniqueness).
    pub candidates: usize,
}

impl LineMatch {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Pick the external line for `key` out of `candidates`.
///
/// Only exact `(order id, line number)` matches count. If several remain, the
/// first by ascending line number wins and the ambiguity is logged.
pub fn select_match(
    key: &ExternalOrderRef,
    candidates: Vec<ExternalLineSnapshot>,
) -> Result<LineMatch, ErpError> {
    let mut matching: Vec<ExternalLineSnapshot> = candidates
        .into_iter()
        .filter(|c| c.key.order_id == key.order_id && c.key.line_number == key.line_number)
        .collect();
    matching.sort_by_key(|c| c.key.line_number);

    let count = matching.len();
    let snapshot = matching
        .into_iter()
        .next()
        .ok_or_else(|| ErpError::NotFound(key.to_string()))?;

    if count > 1 {
        tracing::warn!(
            external_ref = %key,
            candidates = count,
            "multiple ERP lines match one key; using the first"
        );
    }

    Ok(LineMatch {
        snapshot,
        candidates: count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgewms_warehouse::ExternalOrderKind;

    fn snap(order_id: u64, line_number: u32, item: &str) -> ExternalLineSnapshot {
        ExternalLineSnapshot {
            key: ExternalOrderRef::new(ExternalOrderKind::SalesOrder, order_id, line_number),
            item_code: item.to_string(),
            description: None,
            customer_code: None,
            customer_name: None,
            quantity: Quantity::from(1),
            open_quantity: None,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn exact_key_is_required() {
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 10, 1);
        let err = select_match(&key, vec![snap(10, 2, "A"), snap(11, 1, "B")]).unwrap_err();
        assert!(matches!(err, ErpError::NotFound(_)));
    }

    #[test]
    fn single_match_is_not_ambiguous() {
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 10, 1);
        let m = select_match(&key, vec![snap(10, 0, "X"), snap(10, 1, "A")]).unwrap();
        assert_eq!(m.snapshot.item_code, "A");
        assert!(!m.is_ambiguous());
    }

    #[test]
    fn duplicates_resolve_to_first_and_are_reported() {
        let key = ExternalOrderRef::new(ExternalOrderKind::SalesOrder, 10, 1);
        let m = select_match(&key, vec![snap(10, 1, "FIRST"), snap(10, 1, "SECOND")]).unwrap();
        assert_eq!(m.snapshot.item_code, "FIRST");
        assert_eq!(m.candidates, 2);
        assert!(m.is_ambiguous());
    }
}

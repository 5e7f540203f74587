//! Record model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Installment metadata attached to a record.
///
/// Opaque to the reconciliation engine; carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position within the plan
    pub number: u32,
    /// Total number of installments in the plan
    pub total: u32,
}

/// A financial record, the unit of reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Owner-scoped identity; `None` until the record is identified
    pub id: Option<i64>,
    /// Owner partition
    pub owner_id: i64,
    /// Signed amount
    pub amount: Decimal,
    /// Free-form description
    pub description: String,
    /// When the transaction happened (Unix ms)
    pub occurred_at: i64,
    /// Last modification (Unix ms), the last-write-wins clock
    pub modified_at: i64,
    /// Category reference
    #[serde(default)]
    pub category_id: Option<i64>,
    /// Installment metadata
    #[serde(default)]
    pub installment: Option<Installment>,
}

impl Record {
    /// Create a new, not yet identified record stamped with the current time
    #[must_use]
    pub fn new(owner_id: i64, amount: Decimal, description: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: None,
            owner_id,
            amount,
            description: description.into(),
            occurred_at: now,
            modified_at: now,
            category_id: None,
            installment: None,
        }
    }

    /// Set when the transaction happened
    #[must_use]
    pub const fn occurred_at(mut self, occurred_at: i64) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Attach a category reference
    #[must_use]
    pub const fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Attach installment metadata
    #[must_use]
    pub const fn with_installment(mut self, installment: Installment) -> Self {
        self.installment = Some(installment);
        self
    }

    /// The identity, treating zero as absent
    #[must_use]
    pub fn identity(&self) -> Option<i64> {
        self.id.filter(|id| *id != 0)
    }

    /// Whether the record has been assigned an identity
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.identity().is_some()
    }

    /// Key used to detect the same logical record across overlapping passes
    #[must_use]
    pub fn content_key(&self) -> ContentKey {
        ContentKey {
            description: self.description.clone(),
            amount: self.amount.normalize(),
            occurred_at: self.occurred_at,
        }
    }

    /// Whether every user-visible field agrees with `other`, ignoring identity
    /// and clocks.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.description == other.description
            && self.amount == other.amount
            && self.occurred_at == other.occurred_at
            && self.category_id == other.category_id
            && self.installment == other.installment
    }

    /// Copy the field values of `incoming` onto this record, keeping identity.
    pub fn apply_fields_from(&mut self, incoming: &Self) {
        self.amount = incoming.amount;
        self.description.clone_from(&incoming.description);
        self.occurred_at = incoming.occurred_at;
        self.modified_at = incoming.modified_at;
        self.category_id = incoming.category_id;
        self.installment = incoming.installment;
    }
}

/// Content identity of a record: `(description, amount, occurred_at)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    description: String,
    amount: Decimal,
    occurred_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coffee() -> Record {
        Record::new(1, Decimal::new(350, 2), "Coffee").occurred_at(1_704_099_600_000)
    }

    #[test]
    fn test_record_new_is_unidentified() {
        let record = Record::new(1, Decimal::new(1000, 2), "Lunch");
        assert!(!record.is_identified());
        assert_eq!(record.owner_id, 1);
        assert!(record.modified_at > 0);
    }

    #[test]
    fn test_zero_id_counts_as_absent() {
        let mut record = coffee();
        record.id = Some(0);
        assert_eq!(record.identity(), None);
        record.id = Some(4);
        assert_eq!(record.identity(), Some(4));
    }

    #[test]
    fn test_content_key_ignores_amount_scale() {
        let a = coffee();
        let mut b = coffee();
        b.amount = Decimal::new(35, 1);
        b.id = Some(9);
        assert_eq!(a.content_key(), b.content_key());
    }

    #[test]
    fn test_apply_fields_keeps_identity() {
        let mut local = coffee();
        local.id = Some(3);
        let mut incoming = coffee().with_category(7);
        incoming.id = Some(11);
        incoming.modified_at = local.modified_at + 10;

        local.apply_fields_from(&incoming);
        assert_eq!(local.id, Some(3));
        assert_eq!(local.category_id, Some(7));
        assert_eq!(local.modified_at, incoming.modified_at);
        assert!(local.same_content(&incoming));
    }
}

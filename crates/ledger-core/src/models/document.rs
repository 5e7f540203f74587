//! Remote document model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::record::{Installment, Record};
use crate::error::Error;

/// Deterministic document key for a record in the remote store
#[must_use]
pub fn document_key(owner_id: i64, id: i64) -> String {
    format!("{owner_id}:{id}")
}

/// A record as stored in the remote document collection.
///
/// Every field is optional on the wire: documents written by older clients or
/// other devices may lack identity or be incomplete. Conversion into a
/// [`Record`] validates the required fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<i64>,
    /// Server-assigned on every upsert; never sent by clients
    #[serde(default, skip_serializing)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub installment_number: Option<u32>,
    #[serde(default)]
    pub installment_total: Option<u32>,
}

impl From<&Record> for RemoteDocument {
    fn from(record: &Record) -> Self {
        Self {
            id: record.identity(),
            owner_id: Some(record.owner_id),
            amount: Some(record.amount),
            description: Some(record.description.clone()),
            occurred_at: Some(record.occurred_at),
            modified_at: Some(record.modified_at),
            category_id: record.category_id,
            installment_number: record.installment.map(|plan| plan.number),
            installment_total: record.installment.map(|plan| plan.total),
        }
    }
}

impl TryFrom<RemoteDocument> for Record {
    type Error = Error;

    fn try_from(value: RemoteDocument) -> Result<Self, Self::Error> {
        let owner_id = value
            .owner_id
            .ok_or_else(|| Error::MalformedDocument("missing owner_id".to_string()))?;
        let amount = value
            .amount
            .ok_or_else(|| Error::MalformedDocument("missing amount".to_string()))?;
        let description = value
            .description
            .ok_or_else(|| Error::MalformedDocument("missing description".to_string()))?;
        let occurred_at = value
            .occurred_at
            .ok_or_else(|| Error::MalformedDocument("missing occurred_at".to_string()))?;

        let installment = match (value.installment_number, value.installment_total) {
            (Some(number), Some(total)) => Some(Installment { number, total }),
            _ => None,
        };

        Ok(Self {
            id: value.id.filter(|id| *id != 0),
            owner_id,
            amount,
            description,
            occurred_at,
            modified_at: value.modified_at.unwrap_or(0),
            category_id: value.category_id,
            installment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_key_is_composite() {
        assert_eq!(document_key(1, 42), "1:42");
    }

    #[test]
    fn record_survives_document_conversion() {
        let mut record = Record::new(3, Decimal::new(-1999, 2), "Groceries")
            .occurred_at(1_700_000_000_000)
            .with_category(4)
            .with_installment(Installment {
                number: 2,
                total: 6,
            });
        record.id = Some(12);

        let document = RemoteDocument::from(&record);
        let parsed = Record::try_from(document).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let document = RemoteDocument {
            owner_id: Some(1),
            amount: Some(Decimal::ONE),
            occurred_at: Some(0),
            ..Default::default()
        };
        let error = Record::try_from(document).unwrap_err();
        assert!(error.to_string().contains("description"));
    }

    #[test]
    fn zero_id_deserializes_as_unidentified() {
        let payload = r#"{
            "id": 0,
            "owner_id": 1,
            "amount": 3.50,
            "description": "Coffee",
            "occurred_at": 1704099600000,
            "modified_at": 5
        }"#;
        let document: RemoteDocument = serde_json::from_str(payload).unwrap();
        let record = Record::try_from(document).unwrap();
        assert_eq!(record.id, None);
        assert_eq!(record.amount, Decimal::new(35, 1));
        assert_eq!(record.modified_at, 5);
    }

    #[test]
    fn modified_at_is_not_sent_to_the_server() {
        let record = Record::new(1, Decimal::ONE, "Bus");
        let json = serde_json::to_value(RemoteDocument::from(&record)).unwrap();
        assert!(json.get("modified_at").is_none());
        assert!(json.get("id").is_none());
    }
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::document::{AllocationKey, DocumentType};

/// Bank transaction being reconciled. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub total: Decimal,
    pub currency: String,
    /// Amount reconciled in earlier sessions.
    #[serde(default)]
    pub already_allocated: Decimal,
}

impl Transaction {
    /// `total - already_allocated`, before anything staged in a session.
    pub fn unallocated(&self) -> Decimal {
        self.total - self.already_allocated
    }

    pub fn is_fully_reconciled(&self) -> bool {
        self.unallocated() <= Decimal::ZERO
    }
}

/// Outstanding document proposed by the suggestion source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_name: String,
    #[serde(default)]
    pub party_name: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub outstanding_amount: Decimal,
    /// 0-100, assigned by the suggestion source.
    pub match_score: u8,
    #[serde(default)]
    pub match_reasons: Vec<String>,
}

impl Candidate {
    pub const MAX_SCORE: u8 = 100;

    pub fn key(&self) -> AllocationKey {
        AllocationKey::new(self.document_type, self.document_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(total: i64, already: i64) -> Transaction {
        Transaction {
            id: "BT-1".to_string(),
            description: None,
            date: None,
            total: Decimal::from(total),
            currency: "USD".to_string(),
            already_allocated: Decimal::from(already),
        }
    }

    #[test]
    fn unallocated_subtracts_prior_reconciliations() {
        assert_eq!(transaction(5000, 2000).unallocated(), Decimal::from(3000));
        assert!(!transaction(5000, 2000).is_fully_reconciled());
    }

    #[test]
    fn fully_reconciled_when_nothing_left() {
        assert!(transaction(1000, 1000).is_fully_reconciled());
        assert!(transaction(1000, 1200).is_fully_reconciled());
    }

    #[test]
    fn candidate_parses_numeric_amounts() {
        let json = r#"{
            "document_type": "sales_invoice",
            "document_id": "SINV-0042",
            "document_name": "SINV-0042",
            "party_name": "Acme Ltd",
            "due_date": "2026-03-31",
            "outstanding_amount": 1500.25,
            "match_score": 87,
            "match_reasons": ["amount", "reference"]
        }"#;

        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.outstanding_amount, Decimal::new(150025, 2));
        assert_eq!(candidate.match_score, 87);
        assert_eq!(
            candidate.key(),
            AllocationKey::new(DocumentType::SalesInvoice, "SINV-0042")
        );
    }

    #[test]
    fn transaction_defaults_already_allocated() {
        let json = r#"{"id": "BT-9", "total": "250.00", "currency": "EUR"}"#;
        let txn: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.already_allocated, Decimal::ZERO);
        assert_eq!(txn.unallocated(), Decimal::new(25000, 2));
    }
}

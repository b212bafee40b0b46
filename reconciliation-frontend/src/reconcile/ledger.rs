//! Allocation ledger for one reconciliation session.
//!
//! Holds the proposed split of a bank transaction across outstanding
//! documents. Per-row ceilings are applied by callers; the ledger only
//! guarantees that every stored amount is positive and that each document
//! appears at most once.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{AllocationKey, DocumentType, Transaction};

/// A staged allocation of part of the transaction to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_name: String,
    pub amount: Decimal,
}

impl Allocation {
    pub fn key(&self) -> AllocationKey {
        AllocationKey::new(self.document_type, self.document_id.clone())
    }
}

/// Wire form of an allocation sent to the backend. Display name is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub document_type: DocumentType,
    pub document_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl From<&Allocation> for AllocationLine {
    fn from(a: &Allocation) -> Self {
        Self {
            document_type: a.document_type,
            document_id: a.document_id.clone(),
            amount: a.amount,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationLedger {
    entries: BTreeMap<AllocationKey, Allocation>,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the allocation for a document.
    ///
    /// `amount <= 0` removes the entry instead.
    pub fn set_allocation(
        &mut self,
        document_type: DocumentType,
        document_id: impl Into<String>,
        document_name: impl Into<String>,
        amount: Decimal,
    ) {
        let key = AllocationKey::new(document_type, document_id);

        if amount <= Decimal::ZERO {
            self.entries.remove(&key);
            return;
        }

        let allocation = Allocation {
            document_type,
            document_id: key.document_id.clone(),
            document_name: document_name.into(),
            amount,
        };
        self.entries.insert(key, allocation);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn total_allocated(&self) -> Decimal {
        self.entries.values().map(|a| a.amount).sum()
    }

    /// What is left of the transaction after prior reconciliations and
    /// everything staged here. Negative when over-allocated.
    pub fn remaining_to_allocate(&self, transaction: &Transaction) -> Decimal {
        transaction.unallocated() - self.total_allocated()
    }

    pub fn allocation_for(&self, key: &AllocationKey) -> Decimal {
        self.entries
            .get(key)
            .map(|a| a.amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn get(&self, key: &AllocationKey) -> Option<&Allocation> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &AllocationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Allocation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the allocations whose key passes `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&AllocationKey) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn lines(&self) -> Vec<AllocationLine> {
        self.entries.values().map(AllocationLine::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(total: i64, already: i64) -> Transaction {
        Transaction {
            id: "BT-100".to_string(),
            description: None,
            date: None,
            total: Decimal::from(total),
            currency: "USD".to_string(),
            already_allocated: Decimal::from(already),
        }
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn non_positive_amount_removes_entry() {
        let mut ledger = AllocationLedger::new();
        ledger.set_allocation(DocumentType::SalesInvoice, "SINV-1", "SINV-1", d(100));
        ledger.set_allocation(DocumentType::SalesInvoice, "SINV-1", "SINV-1", d(0));
        assert!(ledger.is_empty());

        ledger.set_allocation(DocumentType::CreditNote, "CN-1", "CN-1", d(-5));
        assert!(ledger.is_empty());
        assert_eq!(ledger.total_allocated(), Decimal::ZERO);
    }

    #[test]
    fn last_write_wins_per_key() {
        let mut ledger = AllocationLedger::new();
        ledger.set_allocation(DocumentType::SalesInvoice, "A", "A", d(100));
        ledger.set_allocation(DocumentType::PurchaseInvoice, "B", "B", d(40));
        ledger.set_allocation(DocumentType::SalesInvoice, "A", "A (renamed)", d(70));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.total_allocated(), d(110));

        let key = AllocationKey::new(DocumentType::SalesInvoice, "A");
        assert_eq!(ledger.get(&key).unwrap().document_name, "A (renamed)");
        assert_eq!(ledger.allocation_for(&key), d(70));
    }

    #[test]
    fn same_id_different_type_are_separate() {
        let mut ledger = AllocationLedger::new();
        ledger.set_allocation(DocumentType::SalesInvoice, "X-1", "X-1", d(10));
        ledger.set_allocation(DocumentType::PaymentEntry, "X-1", "X-1", d(15));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.total_allocated(), d(25));
    }

    #[test]
    fn clear_resets_total() {
        let mut ledger = AllocationLedger::new();
        ledger.set_allocation(DocumentType::SalesInvoice, "A", "A", d(100));
        ledger.set_allocation(DocumentType::PurchaseInvoice, "B", "B", d(200));
        ledger.clear();
        assert_eq!(ledger.total_allocated(), Decimal::ZERO);
        assert!(ledger.is_empty());

        ledger.clear();
        assert_eq!(ledger.total_allocated(), Decimal::ZERO);
    }

    #[test]
    fn remaining_can_go_negative() {
        let transaction = txn(5000, 2000);
        let mut ledger = AllocationLedger::new();
        assert_eq!(ledger.remaining_to_allocate(&transaction), d(3000));

        ledger.set_allocation(DocumentType::SalesInvoice, "A", "A", d(2000));
        ledger.set_allocation(DocumentType::PurchaseInvoice, "B", "B", d(1200));
        assert_eq!(ledger.remaining_to_allocate(&transaction), d(-200));
    }

    #[test]
    fn lines_drop_display_name() {
        let mut ledger = AllocationLedger::new();
        ledger.set_allocation(DocumentType::SalesInvoice, "A", "Invoice A", Decimal::new(1050, 1));

        let lines = ledger.lines();
        assert_eq!(lines.len(), 1);

        let json = serde_json::to_value(&lines[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "document_type": "sales_invoice",
                "document_id": "A",
                "amount": 105.0
            })
        );
    }
}

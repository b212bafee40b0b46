use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of outstanding documents a bank transaction can be matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    SalesInvoice,
    PurchaseInvoice,
    PaymentEntry,
    CreditNote,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesInvoice => "sales_invoice",
            Self::PurchaseInvoice => "purchase_invoice",
            Self::PaymentEntry => "payment_entry",
            Self::CreditNote => "credit_note",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SalesInvoice => "Sales Invoice",
            Self::PurchaseInvoice => "Purchase Invoice",
            Self::PaymentEntry => "Payment Entry",
            Self::CreditNote => "Credit Note",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an allocation: one entry per document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationKey {
    pub document_type: DocumentType,
    pub document_id: String,
}

impl AllocationKey {
    pub fn new(document_type: DocumentType, document_id: impl Into<String>) -> Self {
        Self {
            document_type,
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for AllocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document_type, self.document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&DocumentType::PurchaseInvoice).unwrap();
        assert_eq!(json, "\"purchase_invoice\"");

        let parsed: DocumentType = serde_json::from_str("\"credit_note\"").unwrap();
        assert_eq!(parsed, DocumentType::CreditNote);
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        assert!(serde_json::from_str::<DocumentType>("\"journal_entry\"").is_err());
    }

    #[test]
    fn keys_differ_by_type() {
        let invoice = AllocationKey::new(DocumentType::SalesInvoice, "INV-001");
        let payment = AllocationKey::new(DocumentType::PaymentEntry, "INV-001");
        assert_ne!(invoice, payment);
        assert_eq!(invoice.to_string(), "sales_invoice:INV-001");
    }
}

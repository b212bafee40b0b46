//! Derived panel state for the allocation matcher.
//!
//! Everything here is a pure function of the transaction, the suggestions,
//! the ledger and the submit phase. Over-allocation is reported, never
//! rejected: rows are edited independently, so the sum may pass the
//! remainder while the user is still typing. It only blocks submission.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ledger::AllocationLedger;
use super::submitter::SubmitPhase;
use crate::models::{Candidate, DocumentType, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    /// Nothing left to allocate; no suggestions, no controls.
    FullyReconciled,
    Open,
}

/// Why a submit request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitBlock {
    FullyReconciled,
    NothingAllocated,
    OverAllocated,
    AlreadySubmitting,
}

impl fmt::Display for SubmitBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::FullyReconciled => "transaction is already fully reconciled",
            Self::NothingAllocated => "nothing allocated",
            Self::OverAllocated => "allocations exceed the unallocated amount",
            Self::AlreadySubmitting => "a submission is already in progress",
        };
        f.write_str(msg)
    }
}

/// Highest amount the row's input accepts:
/// `min(outstanding, remaining + own allocation)`, never below zero.
pub fn input_ceiling(
    candidate: &Candidate,
    transaction: &Transaction,
    ledger: &AllocationLedger,
) -> Decimal {
    let own = ledger.allocation_for(&candidate.key());
    let headroom = ledger.remaining_to_allocate(transaction) + own;
    candidate
        .outstanding_amount
        .min(headroom)
        .max(Decimal::ZERO)
}

/// Amount used by the "match full" quick action: the remainder before the
/// row's own allocation is counted, capped at the outstanding amount.
pub fn match_full_amount(
    candidate: &Candidate,
    transaction: &Transaction,
    ledger: &AllocationLedger,
) -> Decimal {
    let own = ledger.allocation_for(&candidate.key());
    candidate
        .outstanding_amount
        .min(ledger.remaining_to_allocate(transaction) + own)
}

/// Clamp a typed amount to `[0, outstanding]`. The remainder is not
/// applied here, so over-allocation stays visible to the user.
pub fn clamp_manual_amount(candidate: &Candidate, amount: Decimal) -> Decimal {
    amount
        .max(Decimal::ZERO)
        .min(candidate.outstanding_amount.max(Decimal::ZERO))
}

pub fn submit_gate(
    transaction: &Transaction,
    ledger: &AllocationLedger,
    phase: SubmitPhase,
) -> Result<(), SubmitBlock> {
    if transaction.is_fully_reconciled() {
        return Err(SubmitBlock::FullyReconciled);
    }
    if phase == SubmitPhase::Submitting {
        return Err(SubmitBlock::AlreadySubmitting);
    }
    if ledger.is_empty() || ledger.total_allocated() <= Decimal::ZERO {
        return Err(SubmitBlock::NothingAllocated);
    }
    if ledger.remaining_to_allocate(transaction) < Decimal::ZERO {
        return Err(SubmitBlock::OverAllocated);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub document_type: DocumentType,
    pub document_id: String,
    pub document_name: String,
    pub party_name: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub outstanding_amount: Decimal,
    pub match_score: u8,
    pub match_reasons: Vec<String>,
    pub selected: bool,
    pub allocated: Decimal,
    pub input_max: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelView {
    pub transaction_id: String,
    pub currency: String,
    pub transaction_total: Decimal,
    pub already_allocated: Decimal,
    pub status: PanelStatus,
    pub rows: Vec<CandidateRow>,
    pub total_allocated: Decimal,
    pub remaining: Decimal,
    pub over_allocated: bool,
    pub can_submit: bool,
    pub submitting: bool,
    pub fetch_error: Option<String>,
    pub submit_error: Option<String>,
}

/// Inputs of one panel render.
pub struct PanelInputs<'a> {
    pub transaction: &'a Transaction,
    pub candidates: &'a [Candidate],
    pub ledger: &'a AllocationLedger,
    pub phase: SubmitPhase,
    pub fetch_error: Option<&'a str>,
    pub submit_error: Option<&'a str>,
}

impl PanelView {
    pub fn build(inputs: PanelInputs<'_>) -> Self {
        let PanelInputs {
            transaction,
            candidates,
            ledger,
            phase,
            fetch_error,
            submit_error,
        } = inputs;

        let base = |status: PanelStatus, rows: Vec<CandidateRow>, remaining: Decimal| PanelView {
            transaction_id: transaction.id.clone(),
            currency: transaction.currency.clone(),
            transaction_total: transaction.total,
            already_allocated: transaction.already_allocated,
            status,
            rows,
            total_allocated: ledger.total_allocated(),
            remaining,
            over_allocated: remaining < Decimal::ZERO,
            can_submit: submit_gate(transaction, ledger, phase).is_ok(),
            submitting: phase == SubmitPhase::Submitting,
            fetch_error: fetch_error.map(str::to_string),
            submit_error: submit_error.map(str::to_string),
        };

        if transaction.is_fully_reconciled() {
            return base(PanelStatus::FullyReconciled, Vec::new(), Decimal::ZERO);
        }

        let rows = candidates
            .iter()
            .map(|c| {
                let key = c.key();
                CandidateRow {
                    document_type: c.document_type,
                    document_id: c.document_id.clone(),
                    document_name: c.document_name.clone(),
                    party_name: c.party_name.clone(),
                    due_date: c.due_date,
                    outstanding_amount: c.outstanding_amount,
                    match_score: c.match_score,
                    match_reasons: c.match_reasons.clone(),
                    selected: ledger.contains(&key),
                    allocated: ledger.allocation_for(&key),
                    input_max: input_ceiling(c, transaction, ledger),
                }
            })
            .collect();

        base(
            PanelStatus::Open,
            rows,
            ledger.remaining_to_allocate(transaction),
        )
    }
}

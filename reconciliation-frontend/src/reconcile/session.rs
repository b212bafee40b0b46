//! Per-panel reconciliation sessions.
//!
//! A session is created when a matcher panel is opened for a transaction
//! and dropped when it is closed or goes idle. The ledger lives only here.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ledger::AllocationLedger;
use super::presenter::{self, PanelInputs, PanelView, SubmitBlock};
use super::submitter::{ReconcileCompleted, SubmitOutcome, SubmitPhase, SubmitTicket};
use crate::models::{AllocationKey, Candidate, Transaction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("transaction is already fully reconciled")]
    FullyReconciled,
    #[error("a submission is in progress")]
    Submitting,
    #[error("document {0} is not among the suggestions")]
    UnknownCandidate(AllocationKey),
}

#[derive(Debug)]
pub struct ReconcileSession {
    id: Uuid,
    transaction: Transaction,
    candidates: Vec<Candidate>,
    ledger: AllocationLedger,
    phase: SubmitPhase,
    fetch_error: Option<String>,
    submit_error: Option<String>,
    /// User that opened the panel, when the caller identified itself.
    owner: Option<String>,
    last_activity: Instant,
}

impl ReconcileSession {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction,
            candidates: Vec::new(),
            ledger: AllocationLedger::new(),
            phase: SubmitPhase::Idle,
            fetch_error: None,
            submit_error: None,
            owner: None,
            last_activity: Instant::now(),
        }
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }

    /// Sessions opened anonymously are open to any caller.
    pub fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        match &self.owner {
            Some(owner) => user_id == Some(owner.as_str()),
            None => true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    #[cfg(test)]
    pub(crate) fn ledger_mut(&mut self) -> &mut AllocationLedger {
        &mut self.ledger
    }

    pub fn phase(&self) -> SubmitPhase {
        self.phase
    }

    /// Fully reconciled transactions never load suggestions.
    pub fn wants_suggestions(&self) -> bool {
        !self.transaction.is_fully_reconciled()
    }

    pub fn apply_suggestions(&mut self, result: Result<Vec<Candidate>, String>) {
        self.touch();
        match result {
            Ok(candidates) => {
                // Staged amounts without a visible row would still be submitted.
                self.ledger.retain(|key| {
                    candidates.iter().any(|c| {
                        c.document_type == key.document_type && c.document_id == key.document_id
                    })
                });
                self.candidates = candidates;
                self.fetch_error = None;
            }
            Err(message) => self.fetch_error = Some(message),
        }
    }

    /// Set a row's amount from user input, clamped to `[0, outstanding]`.
    /// Returns the amount now staged for that row.
    pub fn set_amount(
        &mut self,
        key: &AllocationKey,
        amount: Decimal,
    ) -> Result<Decimal, SessionError> {
        let candidate = self.editable_candidate(key)?;
        let amount = presenter::clamp_manual_amount(&candidate, amount);
        self.stage(&candidate, amount);
        Ok(self.ledger.allocation_for(key))
    }

    /// "Match full": stage `min(outstanding, remaining)` for the row.
    pub fn match_full(&mut self, key: &AllocationKey) -> Result<Decimal, SessionError> {
        let candidate = self.editable_candidate(key)?;
        let amount = presenter::match_full_amount(&candidate, &self.transaction, &self.ledger);
        self.stage(&candidate, amount);
        Ok(self.ledger.allocation_for(key))
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.touch();
        self.ledger.clear();
        Ok(())
    }

    pub fn view(&self) -> PanelView {
        PanelView::build(PanelInputs {
            transaction: &self.transaction,
            candidates: &self.candidates,
            ledger: &self.ledger,
            phase: self.phase,
            fetch_error: self.fetch_error.as_deref(),
            submit_error: self.submit_error.as_deref(),
        })
    }

    /// Enter `Submitting` and snapshot the lines to send.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, SubmitBlock> {
        presenter::submit_gate(&self.transaction, &self.ledger, self.phase)?;
        self.touch();
        self.phase = SubmitPhase::Submitting;
        self.submit_error = None;
        Ok(SubmitTicket {
            session_id: self.id,
            transaction_id: self.transaction.id.clone(),
            lines: self.ledger.lines(),
        })
    }

    /// Leave `Submitting`. Success clears the ledger; failure keeps it and
    /// records the message.
    pub fn finish_submit(
        &mut self,
        ticket: &SubmitTicket,
        result: Result<(), String>,
    ) -> SubmitOutcome {
        self.touch();
        self.phase = SubmitPhase::Idle;
        match result {
            Ok(()) => {
                let event = ReconcileCompleted {
                    session_id: self.id,
                    transaction_id: ticket.transaction_id.clone(),
                    allocated_total: ticket.lines.iter().map(|l| l.amount).sum(),
                    allocation_count: ticket.lines.len(),
                };
                // Count the recorded amount until the backend copy is reloaded.
                self.transaction.already_allocated += event.allocated_total;
                self.ledger.clear();
                self.submit_error = None;
                SubmitOutcome::Reconciled(event)
            }
            Err(message) => {
                self.submit_error = Some(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Swap in a freshly loaded copy of the transaction. Candidates are
    /// dropped once nothing is left to allocate.
    pub fn replace_transaction(&mut self, transaction: Transaction) {
        self.touch();
        self.transaction = transaction;
        if self.transaction.is_fully_reconciled() {
            self.candidates.clear();
            self.ledger.clear();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.transaction.is_fully_reconciled() {
            return Err(SessionError::FullyReconciled);
        }
        if self.phase == SubmitPhase::Submitting {
            return Err(SessionError::Submitting);
        }
        Ok(())
    }

    fn editable_candidate(&self, key: &AllocationKey) -> Result<Candidate, SessionError> {
        self.ensure_idle()?;
        self.candidates
            .iter()
            .find(|c| c.document_type == key.document_type && c.document_id == key.document_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownCandidate(key.clone()))
    }

    fn stage(&mut self, candidate: &Candidate, amount: Decimal) {
        self.touch();
        self.ledger.set_allocation(
            candidate.document_type,
            candidate.document_id.clone(),
            candidate.document_name.clone(),
            amount,
        );
    }
}

pub type SharedSession = Arc<Mutex<ReconcileSession>>;

/// Open sessions by id. Sessions never share a ledger.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: ReconcileSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, shared.clone());
        shared
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle for at least `max_idle`. Sessions currently
    /// locked are in use and kept.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| match session.try_lock() {
            Ok(s) => s.idle_for() < max_idle,
            Err(_) => true,
        });
        before.saturating_sub(self.sessions.len())
    }
}

//! Sends a session's ledger to the backend as one reconciliation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::ledger::AllocationLine;
use super::presenter::SubmitBlock;
use super::session::ReconcileSession;
use crate::models::AuthContext;
use crate::services::erp_client::ClientError;
use crate::services::metrics::record_submission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPhase {
    #[default]
    Idle,
    Submitting,
}

/// Backend write endpoint. One call records every line atomically.
#[async_trait]
pub trait ReconciliationGateway: Send + Sync {
    async fn reconcile(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
        lines: &[AllocationLine],
    ) -> Result<(), ClientError>;
}

/// Published once per successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileCompleted {
    pub session_id: Uuid,
    pub transaction_id: String,
    pub allocated_total: Decimal,
    pub allocation_count: usize,
}

pub trait ReconcileListener: Send + Sync {
    fn on_reconcile_complete(&self, event: &ReconcileCompleted);
}

/// Fans completions out to every subscriber (e.g. the SSE stream that
/// lets transaction lists refresh).
#[derive(Clone)]
pub struct BroadcastListener {
    sender: broadcast::Sender<ReconcileCompleted>,
}

impl BroadcastListener {
    /// `capacity` is floored at one; a zero-sized channel panics.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileCompleted> {
        self.sender.subscribe()
    }
}

impl ReconcileListener for BroadcastListener {
    fn on_reconcile_complete(&self, event: &ReconcileCompleted) {
        // No subscribers is fine.
        let _ = self.sender.send(event.clone());
    }
}

/// Snapshot taken when a submission starts.
#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub session_id: Uuid,
    pub transaction_id: String,
    pub lines: Vec<AllocationLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Reconciled(ReconcileCompleted),
    Failed(String),
    Ignored(SubmitBlock),
}

impl SubmitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reconciled(_) => "reconciled",
            Self::Failed(_) => "failed",
            Self::Ignored(_) => "ignored",
        }
    }
}

#[derive(Clone)]
pub struct Submitter {
    gateway: Arc<dyn ReconciliationGateway>,
    listener: Arc<dyn ReconcileListener>,
}

impl Submitter {
    pub fn new(
        gateway: Arc<dyn ReconciliationGateway>,
        listener: Arc<dyn ReconcileListener>,
    ) -> Self {
        Self { gateway, listener }
    }

    /// Submit the session's ledger.
    ///
    /// The session lock is released while the backend call is in flight, so
    /// a concurrent submit sees `Submitting` and is ignored rather than
    /// queued.
    pub async fn submit(
        &self,
        auth: &AuthContext,
        session: &Mutex<ReconcileSession>,
    ) -> SubmitOutcome {
        let ticket = match session.lock().await.begin_submit() {
            Ok(ticket) => ticket,
            Err(block) => {
                tracing::debug!(reason = %block, "Submit ignored");
                record_submission("ignored");
                return SubmitOutcome::Ignored(block);
            }
        };

        tracing::info!(
            session_id = %ticket.session_id,
            transaction_id = %ticket.transaction_id,
            lines = ticket.lines.len(),
            "Submitting reconciliation"
        );

        let result = self
            .gateway
            .reconcile(auth, &ticket.transaction_id, &ticket.lines)
            .await
            .map_err(|e| {
                tracing::warn!(
                    transaction_id = %ticket.transaction_id,
                    error = %e,
                    "Reconciliation rejected"
                );
                e.to_string()
            });

        let outcome = session.lock().await.finish_submit(&ticket, result);

        if let SubmitOutcome::Reconciled(event) = &outcome {
            tracing::info!(
                transaction_id = %event.transaction_id,
                allocated_total = %event.allocated_total,
                "Reconciliation recorded"
            );
            self.listener.on_reconcile_complete(event);
        }
        record_submission(outcome.label());

        outcome
    }
}

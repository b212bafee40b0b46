//! Entry points used by the HTTP handlers: open, edit, submit and close
//! reconciliation sessions.

use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::instrument;
use uuid::Uuid;

use super::presenter::PanelView;
use super::session::{ReconcileSession, SessionError, SessionRegistry, SharedSession};
use super::source::{SuggestionSource, TransactionSource};
use super::submitter::{SubmitOutcome, Submitter};
use crate::models::{AllocationKey, AuthContext, Candidate};
use crate::services::metrics::{record_suggestion_fetch, set_open_sessions};

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownCandidate(_) => AppError::NotFound(anyhow::anyhow!(err)),
            SessionError::FullyReconciled | SessionError::Submitting => {
                AppError::Conflict(anyhow::anyhow!(err))
            }
        }
    }
}

#[derive(Clone)]
pub struct ReconcileService {
    transactions: Arc<dyn TransactionSource>,
    suggestions: Arc<dyn SuggestionSource>,
    submitter: Submitter,
    registry: SessionRegistry,
    suggestion_limit: usize,
}

impl ReconcileService {
    pub fn new(
        transactions: Arc<dyn TransactionSource>,
        suggestions: Arc<dyn SuggestionSource>,
        submitter: Submitter,
        suggestion_limit: usize,
    ) -> Self {
        Self {
            transactions,
            suggestions,
            submitter,
            registry: SessionRegistry::new(),
            suggestion_limit,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a matcher panel for a transaction. Suggestions are loaded
    /// unless the transaction is already fully reconciled; a failed load
    /// still opens the session with the error shown.
    #[instrument(skip(self, auth), fields(user_id = ?auth.user_id))]
    pub async fn open(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
    ) -> Result<(Uuid, PanelView), AppError> {
        let transaction = self
            .transactions
            .transaction(auth, transaction_id)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to load transaction");
                AppError::from(e)
            })?;

        let mut session = ReconcileSession::new(transaction).with_owner(auth.user_id.clone());
        if session.wants_suggestions() {
            let result = self.fetch_suggestions(auth, transaction_id).await;
            session.apply_suggestions(result);
        } else {
            tracing::info!("Transaction already fully reconciled");
        }

        let id = session.id();
        let view = session.view();
        self.registry.insert(session);
        set_open_sessions(self.registry.len());

        tracing::info!(session_id = %id, "Reconciliation session opened");
        Ok((id, view))
    }

    /// Retry loading suggestions after a failure.
    #[instrument(skip(self, auth))]
    pub async fn refresh_suggestions(
        &self,
        auth: &AuthContext,
        session_id: Uuid,
    ) -> Result<PanelView, AppError> {
        let shared = self.session(&session_id)?;

        let transaction_id = {
            let session = Self::authorize(shared.clone().lock_owned().await, auth)?;
            if !session.wants_suggestions() {
                return Ok(session.view());
            }
            session.transaction().id.clone()
        };

        let result = self.fetch_suggestions(auth, &transaction_id).await;

        // Closed while fetching: drop the result.
        if self.registry.get(&session_id).is_none() {
            return Err(session_not_found(&session_id));
        }

        let mut session = shared.lock().await;
        session.apply_suggestions(result);
        Ok(session.view())
    }

    pub async fn view(&self, auth: &AuthContext, session_id: Uuid) -> Result<PanelView, AppError> {
        let mut session = self.lock(auth, session_id).await?;
        session.touch();
        Ok(session.view())
    }

    #[instrument(skip(self, auth), fields(document = %key))]
    pub async fn set_amount(
        &self,
        auth: &AuthContext,
        session_id: Uuid,
        key: &AllocationKey,
        amount: Decimal,
    ) -> Result<PanelView, AppError> {
        let mut session = self.lock(auth, session_id).await?;
        let staged = session.set_amount(key, amount)?;
        tracing::debug!(requested = %amount, staged = %staged, "Allocation set");
        Ok(session.view())
    }

    #[instrument(skip(self, auth), fields(document = %key))]
    pub async fn match_full(
        &self,
        auth: &AuthContext,
        session_id: Uuid,
        key: &AllocationKey,
    ) -> Result<PanelView, AppError> {
        let mut session = self.lock(auth, session_id).await?;
        let staged = session.match_full(key)?;
        tracing::debug!(staged = %staged, "Matched full amount");
        Ok(session.view())
    }

    pub async fn clear(&self, auth: &AuthContext, session_id: Uuid) -> Result<PanelView, AppError> {
        let mut session = self.lock(auth, session_id).await?;
        session.clear()?;
        Ok(session.view())
    }

    #[instrument(skip(self, auth))]
    pub async fn submit(
        &self,
        auth: &AuthContext,
        session_id: Uuid,
    ) -> Result<(SubmitOutcome, PanelView), AppError> {
        let shared = self.session(&session_id)?;
        drop(Self::authorize(shared.clone().lock_owned().await, auth)?);

        let outcome = self.submitter.submit(auth, &shared).await;
        if let SubmitOutcome::Reconciled(event) = &outcome {
            self.reload_after_submit(auth, &shared, &event.transaction_id)
                .await;
        }

        let view = shared.lock().await.view();
        Ok((outcome, view))
    }

    /// Unmount: the ledger is discarded with the session.
    pub async fn close(&self, auth: &AuthContext, session_id: Uuid) -> Result<(), AppError> {
        drop(self.lock(auth, session_id).await?);
        if !self.registry.remove(&session_id) {
            return Err(session_not_found(&session_id));
        }
        set_open_sessions(self.registry.len());
        tracing::info!(session_id = %session_id, "Reconciliation session closed");
        Ok(())
    }

    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let purged = self.registry.purge_idle(max_idle);
        if purged > 0 {
            set_open_sessions(self.registry.len());
            tracing::info!(purged, "Expired idle reconciliation sessions");
        }
        purged
    }

    fn session(&self, session_id: &Uuid) -> Result<SharedSession, AppError> {
        self.registry
            .get(session_id)
            .ok_or_else(|| session_not_found(session_id))
    }

    async fn lock(
        &self,
        auth: &AuthContext,
        session_id: Uuid,
    ) -> Result<OwnedMutexGuard<ReconcileSession>, AppError> {
        let shared = self.session(&session_id)?;
        Self::authorize(shared.lock_owned().await, auth)
    }

    fn authorize(
        session: OwnedMutexGuard<ReconcileSession>,
        auth: &AuthContext,
    ) -> Result<OwnedMutexGuard<ReconcileSession>, AppError> {
        if session.is_owned_by(auth.user_id.as_deref()) {
            Ok(session)
        } else {
            tracing::warn!(
                session_id = %session.id(),
                user_id = ?auth.user_id,
                "Session accessed by another user"
            );
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Reconciliation session belongs to another user"
            )))
        }
    }

    /// Reload the transaction after a recorded submission so the panel
    /// reflects the backend's allocated amount. Suggestions are reloaded
    /// too while anything is left to allocate, since outstanding amounts
    /// changed. A failed reload keeps the locally counted amount.
    async fn reload_after_submit(
        &self,
        auth: &AuthContext,
        shared: &SharedSession,
        transaction_id: &str,
    ) {
        let transaction = match self.transactions.transaction(auth, transaction_id).await {
            Ok(transaction) => transaction,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to reload transaction after submit");
                return;
            }
        };

        let wants_suggestions = {
            let mut session = shared.lock().await;
            session.replace_transaction(transaction);
            session.wants_suggestions()
        };

        if wants_suggestions {
            let result = self.fetch_suggestions(auth, transaction_id).await;
            shared.lock().await.apply_suggestions(result);
        }
    }

    async fn fetch_suggestions(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
    ) -> Result<Vec<Candidate>, String> {
        match self
            .suggestions
            .suggestions(auth, transaction_id, self.suggestion_limit)
            .await
        {
            Ok(candidates) => {
                record_suggestion_fetch("success");
                tracing::debug!(count = candidates.len(), "Suggestions loaded");
                Ok(candidates)
            }
            Err(e) => {
                record_suggestion_fetch("error");
                tracing::warn!(error = %e, "Failed to load suggestions");
                Err(e.to_string())
            }
        }
    }
}

fn session_not_found(session_id: &Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!(
        "Reconciliation session {} not found",
        session_id
    ))
}

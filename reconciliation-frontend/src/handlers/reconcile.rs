//! Allocation matcher endpoints.
//!
//! Every mutating endpoint answers with the refreshed panel so the client
//! never derives totals itself.

use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AllocationKey, AuthContext, DocumentType};
use crate::reconcile::{PanelStatus, PanelView, ReconcileCompleted, SubmitOutcome};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionRequest {
    #[validate(length(min = 1, max = 140))]
    pub transaction_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentRef {
    pub document_type: DocumentType,
    #[validate(length(min = 1, max = 140))]
    pub document_id: String,
}

impl DocumentRef {
    fn key(&self) -> AllocationKey {
        AllocationKey::new(self.document_type, self.document_id.clone())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetAllocationRequest {
    pub document_type: DocumentType,
    #[validate(length(min = 1, max = 140))]
    pub document_id: String,
    /// Zero or less deselects the row.
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub view: PanelView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<ReconcileCompleted>,
    pub view: PanelView,
}

/// Mount a matcher panel for a transaction.
pub async fn open_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    payload.validate()?;

    tracing::info!(
        transaction_id = %payload.transaction_id,
        user_id = ?auth.user_id,
        "Opening reconciliation session"
    );

    let (session_id, view) = state
        .reconcile
        .open(&auth, &payload.transaction_id)
        .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse { session_id, view })))
}

pub async fn get_view(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PanelView>, AppError> {
    Ok(Json(state.reconcile.view(&auth, session_id).await?))
}

pub async fn set_allocation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SetAllocationRequest>,
) -> Result<Json<PanelView>, AppError> {
    payload.validate()?;
    let key = AllocationKey::new(payload.document_type, payload.document_id);
    let view = state
        .reconcile
        .set_amount(&auth, session_id, &key, payload.amount)
        .await?;
    Ok(Json(view))
}

pub async fn match_full(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<DocumentRef>,
) -> Result<Json<PanelView>, AppError> {
    payload.validate()?;
    let view = state
        .reconcile
        .match_full(&auth, session_id, &payload.key())
        .await?;
    Ok(Json(view))
}

pub async fn clear_allocations(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PanelView>, AppError> {
    Ok(Json(state.reconcile.clear(&auth, session_id).await?))
}

pub async fn refresh_suggestions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PanelView>, AppError> {
    let view = state
        .reconcile
        .refresh_suggestions(&auth, session_id)
        .await?;
    Ok(Json(view))
}

/// Submit the staged allocations. Blocked and failed submissions are
/// reported in the body with `200`; the panel shows them inline.
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SubmitResponse>, AppError> {
    let (outcome, view) = state.reconcile.submit(&auth, session_id).await?;

    let label = outcome.label().to_string();
    let (reason, event) = match outcome {
        SubmitOutcome::Reconciled(event) => (None, Some(event)),
        SubmitOutcome::Failed(message) => (Some(message), None),
        SubmitOutcome::Ignored(block) => (Some(block.to_string()), None),
    };

    Ok(Json(SubmitResponse {
        outcome: label,
        reason,
        event,
        view,
    }))
}

pub async fn close_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reconcile.close(&auth, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Server-rendered panel
// ============================================================================

pub struct RowDisplay {
    pub document_type: &'static str,
    pub document_label: &'static str,
    pub document_id: String,
    pub document_name: String,
    pub party_name: String,
    pub due_date: String,
    pub outstanding: String,
    pub match_score: u8,
    pub match_reasons: String,
    pub selected: bool,
    pub allocated: String,
    pub input_max: String,
}

#[derive(Template)]
#[template(path = "pages/reconcile.html")]
pub struct ReconcileTemplate {
    pub session_id: String,
    pub transaction_id: String,
    pub currency: String,
    pub transaction_total: String,
    pub already_allocated: String,
    pub total_allocated: String,
    pub remaining: String,
    pub fully_reconciled: bool,
    pub over_allocated: bool,
    pub can_submit: bool,
    pub submitting: bool,
    pub fetch_error: String,
    pub submit_error: String,
    pub rows: Vec<RowDisplay>,
}

impl ReconcileTemplate {
    pub fn new(session_id: Uuid, view: PanelView) -> Self {
        let rows = view
            .rows
            .into_iter()
            .map(|row| RowDisplay {
                document_type: row.document_type.as_str(),
                document_label: row.document_type.label(),
                document_id: row.document_id,
                document_name: row.document_name,
                party_name: row.party_name.unwrap_or_default(),
                due_date: row.due_date.map(|d| d.to_string()).unwrap_or_default(),
                outstanding: row.outstanding_amount.to_string(),
                match_score: row.match_score,
                match_reasons: row.match_reasons.join(", "),
                selected: row.selected,
                allocated: row.allocated.to_string(),
                input_max: row.input_max.to_string(),
            })
            .collect();

        Self {
            session_id: session_id.to_string(),
            transaction_id: view.transaction_id,
            currency: view.currency,
            transaction_total: view.transaction_total.to_string(),
            already_allocated: view.already_allocated.to_string(),
            total_allocated: view.total_allocated.to_string(),
            remaining: view.remaining.to_string(),
            fully_reconciled: view.status == PanelStatus::FullyReconciled,
            over_allocated: view.over_allocated,
            can_submit: view.can_submit,
            submitting: view.submitting,
            fetch_error: view.fetch_error.unwrap_or_default(),
            submit_error: view.submit_error.unwrap_or_default(),
            rows,
        }
    }
}

pub async fn panel_page(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(session_id): Path<Uuid>,
) -> Result<ReconcileTemplate, AppError> {
    let view = state.reconcile.view(&auth, session_id).await?;
    Ok(ReconcileTemplate::new(session_id, view))
}

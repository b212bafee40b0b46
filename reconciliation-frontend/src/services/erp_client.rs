//! ERP banking API client.
//!
//! Every endpoint answers with a tagged envelope:
//! `{"status": "success", "data": ...}` or
//! `{"status": "error", "code": ..., "message": ...}`. Payloads are decoded
//! into typed models here so malformed responses never reach the panel.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::observability::TraceHeadersExt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ErpApiSettings;
use crate::models::{AuthContext, Candidate, Transaction};
use crate::reconcile::ledger::AllocationLine;
use crate::reconcile::source::{SuggestionSource, TransactionSource};
use crate::reconcile::submitter::ReconciliationGateway;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("ERP API unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { code: String, message: String },

    #[error("ERP API returned {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Malformed ERP response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid ERP payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid ERP base URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rejected { code, .. } => code.eq_ignore_ascii_case("not_found"),
            Self::UnexpectedStatus { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        if err.is_not_found() {
            AppError::NotFound(anyhow::anyhow!(err.to_string()))
        } else {
            AppError::BadGateway(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApiResponse<T> {
    Success { data: T },
    Error { code: String, message: String },
}

/// Acknowledgement of a recorded reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileAck {
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReconcileRequest<'a> {
    allocations: &'a [AllocationLine],
}

#[derive(Clone)]
pub struct ErpClient {
    client: Client,
    base_url: Url,
}

impl ErpClient {
    pub fn new(settings: &ErpApiSettings) -> Result<Self, ClientError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", settings.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(settings.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1", "banking"]).extend(segments);
        }
        url
    }

    fn authorized(&self, builder: RequestBuilder, auth: &AuthContext) -> RequestBuilder {
        let builder = builder
            .bearer_auth(&auth.access_token)
            .with_trace_context()
            .with_request_id(auth.request_id.as_deref());

        match &auth.user_id {
            Some(user_id) => builder.header("x-user-id", user_id),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, bytes = body.len(), "ERP response");

        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(ApiResponse::Success { data }) if status.is_success() => Ok(data),
            Ok(ApiResponse::Error { code, message }) => {
                Err(ClientError::Rejected { code, message })
            }
            Err(e) if status.is_success() => Err(ClientError::Decode(e)),
            _ => Err(ClientError::UnexpectedStatus {
                status,
                body: truncate(body),
            }),
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait]
impl TransactionSource for ErpClient {
    async fn transaction(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
    ) -> Result<Transaction, ClientError> {
        let url = self.endpoint(&["transactions", transaction_id]);
        let response = self
            .authorized(self.client.get(url), auth)
            .send()
            .await?;

        Self::read(response).await
    }
}

#[async_trait]
impl SuggestionSource for ErpClient {
    async fn suggestions(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, ClientError> {
        let url = self.endpoint(&["transactions", transaction_id, "suggestions"]);
        let response = self
            .authorized(self.client.get(url), auth)
            .query(&[("limit", limit)])
            .send()
            .await?;

        let mut candidates: Vec<Candidate> = Self::read(response).await?;

        if let Some(bad) = candidates
            .iter()
            .find(|c| c.match_score > Candidate::MAX_SCORE)
        {
            return Err(ClientError::InvalidPayload(format!(
                "match score {} out of range for {}",
                bad.match_score,
                bad.key()
            )));
        }

        // Stable: equal scores keep backend order.
        candidates.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        candidates.truncate(limit);

        Ok(candidates)
    }
}

#[async_trait]
impl ReconciliationGateway for ErpClient {
    async fn reconcile(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
        lines: &[AllocationLine],
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&["transactions", transaction_id, "reconcile"]);
        let response = self
            .authorized(self.client.post(url), auth)
            .json(&ReconcileRequest { allocations: lines })
            .send()
            .await?;

        let ack: Option<ReconcileAck> = Self::read(response).await?;
        tracing::debug!(
            transaction_id = %transaction_id,
            reference = ?ack.and_then(|a| a.reference),
            "Reconciliation acknowledged"
        );

        Ok(())
    }
}

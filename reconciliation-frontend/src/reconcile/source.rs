use async_trait::async_trait;

use crate::models::{AuthContext, Candidate, Transaction};
use crate::services::erp_client::ClientError;

/// Read side of the ERP banking API.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn transaction(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
    ) -> Result<Transaction, ClientError>;
}

/// Ranked candidate documents for a transaction, highest score first.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggestions(
        &self,
        auth: &AuthContext,
        transaction_id: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, ClientError>;
}

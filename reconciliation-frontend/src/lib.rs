pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod reconcile;
pub mod services;
pub mod startup;

use config::Settings;
use reconcile::{
    BroadcastListener, ReconcileService, ReconciliationGateway, Submitter, SuggestionSource,
    TransactionSource,
};
use services::erp_client::{ClientError, ErpClient};
use std::sync::Arc;

/// Shared application state: the session service, the completion
/// channel and the settings every handler reads from.
#[derive(Clone)]
pub struct AppState {
    pub reconcile: ReconcileService,
    pub events: BroadcastListener,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the state against the ERP REST API described in `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self, ClientError> {
        let erp = Arc::new(ErpClient::new(&settings.erp_api)?);
        Ok(Self::with_backends(settings, erp.clone(), erp.clone(), erp))
    }

    pub fn with_backends(
        settings: Settings,
        transactions: Arc<dyn TransactionSource>,
        suggestions: Arc<dyn SuggestionSource>,
        gateway: Arc<dyn ReconciliationGateway>,
    ) -> Self {
        let events = BroadcastListener::new(settings.reconciliation.event_buffer);
        let submitter = Submitter::new(gateway, Arc::new(events.clone()));
        let reconcile = ReconcileService::new(
            transactions,
            suggestions,
            submitter,
            settings.reconciliation.suggestion_limit,
        );

        Self {
            reconcile,
            events,
            settings: Arc::new(settings),
        }
    }
}

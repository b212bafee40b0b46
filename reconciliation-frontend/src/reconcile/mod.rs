//! Transaction reconciliation: the allocation matcher.

pub mod ledger;
pub mod presenter;
pub mod service;
pub mod session;
pub mod source;
pub mod submitter;

pub use ledger::{Allocation, AllocationLedger, AllocationLine};
pub use presenter::{CandidateRow, PanelStatus, PanelView, SubmitBlock};
pub use service::ReconcileService;
pub use session::{ReconcileSession, SessionError, SessionRegistry, SharedSession};
pub use source::{SuggestionSource, TransactionSource};
pub use submitter::{
    BroadcastListener, ReconcileCompleted, ReconcileListener, ReconciliationGateway,
    SubmitOutcome, SubmitPhase, Submitter,
};

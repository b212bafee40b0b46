pub mod auth;
pub mod document;
pub mod transaction;

pub use auth::AuthContext;
pub use document::{AllocationKey, DocumentType};
pub use transaction::{Candidate, Transaction};

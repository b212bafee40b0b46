pub mod app;
pub mod events;
pub mod metrics;
pub mod reconcile;

pub mod erp_client;
pub mod metrics;

pub use erp_client::{ClientError, ErpClient};

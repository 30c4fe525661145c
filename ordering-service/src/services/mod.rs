//! Services module for ordering-service.

pub mod database;
pub mod metrics;
pub mod money;
pub mod orders;
pub mod quotes;
pub mod stock;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use orders::OrderService;
pub use quotes::QuoteService;

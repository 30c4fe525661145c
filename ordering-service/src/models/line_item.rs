//! Line item models for orders and quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A line on a persisted order. Unit price is a snapshot taken at creation
/// time; later catalog price changes do not flow back into the line.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub barrel_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// A line on a persisted quote.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteItem {
    pub quote_item_id: Uuid,
    pub quote_id: Uuid,
    pub barrel_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Caller-supplied line. The unit price always comes from the catalog, never
/// from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub barrel_id: Uuid,
    pub quantity: i32,
}

//! Order model and status lifecycle for ordering-service.

use crate::models::LineItemInput;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Order fulfilment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "returned" => OrderStatus::Returned,
            _ => OrderStatus::Pending,
        }
    }

    /// Whether `next` is a legal single step from this status.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
                | (Delivered, Returned)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Cancellation (and with it stock release) is only possible before the
    /// order has physically shipped.
    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status, tracked alongside but independent of fulfilment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            "partially_refunded" => PaymentStatus::PartiallyRefunded,
            _ => PaymentStatus::Pending,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer order with frozen monetary amounts.
///
/// Persisted amounts are rounded to 2 decimal places and always satisfy
/// `total_amount = subtotal - discount_amount + tax_amount + shipping_cost`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
    pub tracking_number: Option<String>,
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub paid_utc: Option<DateTime<Utc>>,
    pub shipped_utc: Option<DateTime<Utc>>,
    pub delivered_utc: Option<DateTime<Utc>>,
    pub cancelled_utc: Option<DateTime<Utc>>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::from_string(&self.status)
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.payment_status)
    }
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: Uuid,
    pub items: Vec<LineItemInput>,
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
    pub discount_percentage: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for updating mutable order fields (pending or processing only).
#[derive(Debug, Clone, Default)]
pub struct UpdateOrder {
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

/// Filter parameters for listing orders.
#[derive(Debug, Clone, Default)]
pub struct ListOrdersFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

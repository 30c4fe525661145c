//! Quote model and status lifecycle for ordering-service.

use crate::models::LineItemInput;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Quote lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Converted,
    Cancelled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Converted => "converted",
            QuoteStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => QuoteStatus::Sent,
            "accepted" => QuoteStatus::Accepted,
            "rejected" => QuoteStatus::Rejected,
            "expired" => QuoteStatus::Expired,
            "converted" => QuoteStatus::Converted,
            "cancelled" => QuoteStatus::Cancelled,
            _ => QuoteStatus::Draft,
        }
    }

    /// Whether `next` is a legal single step from this status.
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        use QuoteStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Accepted)
                | (Sent, Rejected)
                | (Sent, Expired)
                | (Accepted, Converted)
                | (Accepted, Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QuoteStatus::Rejected
                | QuoteStatus::Expired
                | QuoteStatus::Converted
                | QuoteStatus::Cancelled
        )
    }

    /// Line items and pricing parameters may only change while drafting.
    pub fn is_editable(self) -> bool {
        matches!(self, QuoteStatus::Draft)
    }

    /// Statuses subject to passive expiry once `valid_until` has passed.
    pub fn expiry_applies(self) -> bool {
        matches!(self, QuoteStatus::Sent | QuoteStatus::Accepted)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer quote with frozen monetary amounts and a validity window.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub quote_id: Uuid,
    pub quote_number: String,
    pub user_id: Uuid,
    pub status: String,
    pub subtotal: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub valid_until: DateTime<Utc>,
    pub converted_to_order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub sent_utc: Option<DateTime<Utc>>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub expired_utc: Option<DateTime<Utc>>,
    pub cancelled_utc: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn status(&self) -> QuoteStatus {
        QuoteStatus::from_string(&self.status)
    }

    pub fn is_past_validity(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }

    /// True when the quote should flip to expired on access.
    pub fn expires_now(&self, now: DateTime<Utc>) -> bool {
        self.status().expiry_applies() && self.is_past_validity(now)
    }
}

/// Input for creating a quote.
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub user_id: Uuid,
    pub items: Vec<LineItemInput>,
    pub discount_percentage: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Input for updating a draft quote. `items: Some(..)` replaces all lines.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuote {
    pub items: Option<Vec<LineItemInput>>,
    pub discount_percentage: Option<Decimal>,
    pub tax_percentage: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Filter parameters for listing quotes.
#[derive(Debug, Clone, Default)]
pub struct ListQuotesFilter {
    pub status: Option<QuoteStatus>,
    pub user_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

//! Tests for the quote status state machine and passive expiry rules.

use chrono::{Duration, Utc};
use ordering_service::models::{Quote, QuoteStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

const ALL: [QuoteStatus; 7] = [
    QuoteStatus::Draft,
    QuoteStatus::Sent,
    QuoteStatus::Accepted,
    QuoteStatus::Rejected,
    QuoteStatus::Expired,
    QuoteStatus::Converted,
    QuoteStatus::Cancelled,
];

fn expected(from: QuoteStatus, to: QuoteStatus) -> bool {
    use QuoteStatus::*;
    match from {
        Draft => matches!(to, Sent | Cancelled),
        Sent => matches!(to, Accepted | Rejected | Expired),
        Accepted => matches!(to, Converted | Expired),
        Rejected | Expired | Converted | Cancelled => false,
    }
}

fn sample_quote(status: QuoteStatus, valid_until: chrono::DateTime<Utc>) -> Quote {
    let now = Utc::now();
    Quote {
        quote_id: Uuid::new_v4(),
        quote_number: "QT-20260825120000-deadbeef".to_string(),
        user_id: Uuid::new_v4(),
        status: status.as_str().to_string(),
        subtotal: Decimal::new(10000, 2),
        discount_percentage: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        tax_percentage: Decimal::new(20, 0),
        tax_amount: Decimal::new(2000, 2),
        shipping_cost: Decimal::ZERO,
        total_amount: Decimal::new(12000, 2),
        valid_until,
        converted_to_order_id: None,
        notes: None,
        created_utc: now,
        updated_utc: now,
        sent_utc: None,
        accepted_utc: None,
        expired_utc: None,
        cancelled_utc: None,
    }
}

#[test]
fn transition_table_is_exact() {
    for from in ALL {
        for to in ALL {
            assert_eq!(
                from.can_transition_to(to),
                expected(from, to),
                "{} -> {}",
                from,
                to
            );
        }
    }
}

#[test]
fn terminal_statuses_accept_nothing() {
    for from in [
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
        QuoteStatus::Converted,
        QuoteStatus::Cancelled,
    ] {
        assert!(from.is_terminal());
        for to in ALL {
            assert!(!from.can_transition_to(to), "{} -> {}", from, to);
        }
    }
}

#[test]
fn only_draft_is_editable() {
    for status in ALL {
        assert_eq!(status.is_editable(), status == QuoteStatus::Draft);
    }
}

#[test]
fn expiry_applies_only_while_awaiting_conversion() {
    for status in ALL {
        let applies = matches!(status, QuoteStatus::Sent | QuoteStatus::Accepted);
        assert_eq!(status.expiry_applies(), applies, "{}", status);
    }
}

#[test]
fn sent_quote_past_validity_expires() {
    let now = Utc::now();
    let quote = sample_quote(QuoteStatus::Sent, now - Duration::hours(1));
    assert!(quote.expires_now(now));
}

#[test]
fn accepted_quote_past_validity_expires() {
    let now = Utc::now();
    let quote = sample_quote(QuoteStatus::Accepted, now - Duration::days(2));
    assert!(quote.expires_now(now));
}

#[test]
fn draft_quote_never_expires_passively() {
    let now = Utc::now();
    let quote = sample_quote(QuoteStatus::Draft, now - Duration::days(30));
    assert!(!quote.expires_now(now));
}

#[test]
fn quote_within_validity_does_not_expire() {
    let now = Utc::now();
    let quote = sample_quote(QuoteStatus::Sent, now + Duration::days(10));
    assert!(!quote.expires_now(now));
}

#[test]
fn status_string_round_trip() {
    for status in ALL {
        assert_eq!(QuoteStatus::from_string(status.as_str()), status);
    }
    assert_eq!(QuoteStatus::from_string("garbage"), QuoteStatus::Draft);
}

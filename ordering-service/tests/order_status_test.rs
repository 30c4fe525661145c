//! Tests for the order status state machine.

use ordering_service::models::{OrderStatus, PaymentStatus};

const ALL: [OrderStatus; 6] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
    OrderStatus::Returned,
];

fn expected(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match from {
        Pending => matches!(to, Processing | Cancelled),
        Processing => matches!(to, Shipped | Cancelled),
        Shipped => matches!(to, Delivered | Returned),
        Delivered => matches!(to, Returned),
        Cancelled | Returned => false,
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
    for from in [OrderStatus::Cancelled, OrderStatus::Returned] {
        assert!(from.is_terminal());
        for to in ALL {
            assert!(!from.can_transition_to(to), "{} -> {}", from, to);
        }
    }
}

#[test]
fn no_self_transitions() {
    for status in ALL {
        assert!(!status.can_transition_to(status));
    }
}

#[test]
fn delivered_can_still_be_returned() {
    assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Returned));
    assert!(!OrderStatus::Delivered.is_terminal());
}

#[test]
fn only_open_orders_are_cancellable() {
    assert!(OrderStatus::Pending.is_cancellable());
    assert!(OrderStatus::Processing.is_cancellable());
    assert!(!OrderStatus::Shipped.is_cancellable());
    assert!(!OrderStatus::Delivered.is_cancellable());
    assert!(!OrderStatus::Cancelled.is_cancellable());
    assert!(!OrderStatus::Returned.is_cancellable());
}

#[test]
fn status_string_round_trip() {
    for status in ALL {
        assert_eq!(OrderStatus::from_string(status.as_str()), status);
    }
    assert_eq!(OrderStatus::from_string("garbage"), OrderStatus::Pending);
}

#[test]
fn payment_status_string_round_trip() {
    for status in [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
    ] {
        assert_eq!(PaymentStatus::from_string(status.as_str()), status);
    }
    assert_eq!(
        PaymentStatus::PartiallyRefunded.as_str(),
        "partially_refunded"
    );
}

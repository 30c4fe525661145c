//! Tests for the stock availability check.

use chrono::Utc;
use ordering_service::models::Barrel;
use ordering_service::services::stock::{aggregate_requests, check_availability, StockRequest};
use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

fn barrel(barrel_id: Uuid, name: &str, stock_quantity: i32) -> Barrel {
    let now = Utc::now();
    Barrel {
        barrel_id,
        name: name.to_string(),
        wood_type: "oak".to_string(),
        previous_content: "red_wine".to_string(),
        condition: "good".to_string(),
        volume_liters: Decimal::new(22500, 2),
        price: Decimal::new(150000, 2),
        stock_quantity,
        created_utc: now,
        updated_utc: now,
    }
}

fn request(barrel_id: Uuid, quantity: i32) -> StockRequest {
    StockRequest {
        barrel_id,
        quantity,
    }
}

#[test]
fn exact_stock_is_available() {
    let id = Uuid::new_v4();
    let barrels = vec![barrel(id, "Bordeaux 225L", 10)];
    assert!(check_availability(&barrels, &[request(id, 10)]).is_ok());
}

#[test]
fn shortfall_is_insufficient_stock() {
    let id = Uuid::new_v4();
    let barrels = vec![barrel(id, "Bordeaux 225L", 10)];
    let err = check_availability(&barrels, &[request(id, 15)]).unwrap_err();

    match err {
        AppError::InsufficientStock(inner) => {
            let message = inner.to_string();
            assert!(message.contains("requested 15"), "{}", message);
            assert!(message.contains("available 10"), "{}", message);
            assert!(message.contains("Bordeaux 225L"), "{}", message);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }
}

#[test]
fn one_short_line_fails_the_whole_batch() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let barrels = vec![barrel(a, "Burgundy 228L", 100), barrel(b, "Sherry 500L", 1)];
    let requests = vec![request(a, 2), request(b, 3)];

    assert!(matches!(
        check_availability(&barrels, &requests),
        Err(AppError::InsufficientStock(_))
    ));
}

#[test]
fn duplicate_lines_are_aggregated() {
    let id = Uuid::new_v4();
    let barrels = vec![barrel(id, "Cognac 350L", 10)];

    // 6 + 6 against 10 must fail even though each line alone would fit
    let requests = vec![request(id, 6), request(id, 6)];
    assert!(matches!(
        check_availability(&barrels, &requests),
        Err(AppError::InsufficientStock(_))
    ));

    // 6 + 4 exactly fits
    let requests = vec![request(id, 6), request(id, 4)];
    assert!(check_availability(&barrels, &requests).is_ok());
}

#[test]
fn unknown_barrel_is_not_found() {
    let known = Uuid::new_v4();
    let barrels = vec![barrel(known, "Port 550L", 5)];
    let err = check_availability(&barrels, &[request(Uuid::new_v4(), 1)]).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn aggregation_merges_and_orders_by_barrel() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let requests = vec![request(a, 2), request(b, 5), request(a, 3)];

    let merged = aggregate_requests(&requests).unwrap();
    assert_eq!(merged.len(), 2);
    for window in merged.windows(2) {
        assert!(window[0].barrel_id < window[1].barrel_id);
    }
    let total_a = merged.iter().find(|r| r.barrel_id == a).unwrap().quantity;
    let total_b = merged.iter().find(|r| r.barrel_id == b).unwrap().quantity;
    assert_eq!(total_a, 5);
    assert_eq!(total_b, 5);
}

#[test]
fn reserve_then_release_restores_stock_exactly() {
    // The reserve and release paths apply the same aggregated quantities as
    // a decrement and an increment, so the net movement must be zero.
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let initial = [(a, 10), (b, 7)];
    let requests = vec![request(a, 3), request(b, 2), request(a, 4)];

    let mut stock: Vec<(Uuid, i32)> = initial.to_vec();
    for req in aggregate_requests(&requests).unwrap() {
        let entry = stock.iter_mut().find(|(id, _)| *id == req.barrel_id).unwrap();
        entry.1 -= req.quantity;
    }
    assert_eq!(stock, vec![(a, 3), (b, 5)]);

    for req in aggregate_requests(&requests).unwrap() {
        let entry = stock.iter_mut().find(|(id, _)| *id == req.barrel_id).unwrap();
        entry.1 += req.quantity;
    }
    assert_eq!(stock, initial.to_vec());
}

#[test]
fn duplicate_line_overflow_rejected() {
    let id = Uuid::new_v4();
    let requests = vec![request(id, i32::MAX), request(id, 1)];

    assert!(matches!(
        aggregate_requests(&requests),
        Err(AppError::Validation(_))
    ));

    // The availability check inherits the same guard
    let barrels = vec![barrel(id, "Madeira 650L", 10)];
    assert!(matches!(
        check_availability(&barrels, &requests),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn zero_stock_refuses_any_request() {
    let id = Uuid::new_v4();
    let barrels = vec![barrel(id, "Whiskey 200L", 0)];
    assert!(matches!(
        check_availability(&barrels, &[request(id, 1)]),
        Err(AppError::InsufficientStock(_))
    ));
}

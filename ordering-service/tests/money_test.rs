//! Tests for monetary calculation and persistence rounding.

use ordering_service::services::money::{
    calculate_amounts, line_total, DocumentAmounts, PricedLine, DEFAULT_TAX_PERCENTAGE,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(quantity: i32, unit_price: &str) -> PricedLine {
    PricedLine {
        quantity,
        unit_price: dec(unit_price),
    }
}

#[test]
fn standard_order_amounts() {
    // 2 x 1500 + 1 x 2000, 5% discount, 20% tax, 50 shipping
    let lines = vec![line(2, "1500.00"), line(1, "2000.00")];
    let amounts = calculate_amounts(&lines, dec("5"), dec("20"), dec("50")).unwrap();

    assert_eq!(amounts.subtotal, dec("5000.00"));
    assert_eq!(amounts.discount_amount, dec("250.00"));
    assert_eq!(amounts.tax_amount, dec("950.00"));
    assert_eq!(amounts.shipping_cost, dec("50"));
    assert_eq!(amounts.total_amount, dec("5750.00"));
}

#[test]
fn total_identity_holds() {
    let lines = vec![line(3, "33.33"), line(7, "149.99")];
    let amounts = calculate_amounts(&lines, dec("12.5"), dec("20"), dec("24.90")).unwrap();

    assert_eq!(
        amounts.total_amount,
        amounts.subtotal - amounts.discount_amount + amounts.tax_amount + amounts.shipping_cost
    );
}

#[test]
fn discount_applies_before_tax() {
    let lines = vec![line(1, "100.00")];
    let amounts = calculate_amounts(&lines, dec("10"), dec("20"), Decimal::ZERO).unwrap();

    // Tax on the discounted 90, not the full 100
    assert_eq!(amounts.discount_amount, dec("10.00"));
    assert_eq!(amounts.tax_amount, dec("18.00"));
    assert_eq!(amounts.total_amount, dec("108.00"));
}

#[test]
fn shipping_is_not_taxed() {
    let lines = vec![line(1, "100.00")];
    let with_shipping = calculate_amounts(&lines, Decimal::ZERO, dec("20"), dec("30")).unwrap();
    let without_shipping =
        calculate_amounts(&lines, Decimal::ZERO, dec("20"), Decimal::ZERO).unwrap();

    assert_eq!(with_shipping.tax_amount, without_shipping.tax_amount);
    assert_eq!(
        with_shipping.total_amount,
        without_shipping.total_amount + dec("30")
    );
}

#[test]
fn rounded_components_midpoint_away_from_zero() {
    let amounts = DocumentAmounts {
        subtotal: dec("10.005"),
        discount_amount: dec("0.125"),
        tax_amount: dec("1.975"),
        shipping_cost: dec("2.00"),
        total_amount: Decimal::ZERO,
    };
    let rounded = amounts.rounded();

    assert_eq!(rounded.subtotal, dec("10.01"));
    assert_eq!(rounded.discount_amount, dec("0.13"));
    assert_eq!(rounded.tax_amount, dec("1.98"));
    assert_eq!(rounded.shipping_cost, dec("2.00"));
}

#[test]
fn rounded_total_recomputed_from_rounded_components() {
    // Exact components: subtotal 99.99, discount 4.9995, tax 18.9981
    let lines = vec![line(3, "33.33")];
    let rounded = calculate_amounts(&lines, dec("5"), dec("20"), Decimal::ZERO)
        .unwrap()
        .rounded();

    assert_eq!(rounded.subtotal, dec("99.99"));
    assert_eq!(rounded.discount_amount, dec("5.00"));
    assert_eq!(rounded.tax_amount, dec("19.00"));
    // Total comes from the rounded components, so the identity survives rounding
    assert_eq!(rounded.total_amount, dec("113.99"));
    assert_eq!(
        rounded.total_amount,
        rounded.subtotal - rounded.discount_amount + rounded.tax_amount + rounded.shipping_cost
    );
}

#[test]
fn hundred_percent_discount_is_allowed() {
    let lines = vec![line(1, "80.00")];
    let amounts = calculate_amounts(&lines, dec("100"), dec("20"), Decimal::ZERO).unwrap();

    assert_eq!(amounts.discount_amount, dec("80.00"));
    assert_eq!(amounts.tax_amount, Decimal::ZERO);
    assert_eq!(amounts.total_amount, Decimal::ZERO);
}

#[test]
fn empty_lines_rejected() {
    let err = calculate_amounts(&[], Decimal::ZERO, dec("20"), Decimal::ZERO).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn non_positive_quantity_rejected() {
    let lines = vec![line(0, "10.00")];
    let err = calculate_amounts(&lines, Decimal::ZERO, dec("20"), Decimal::ZERO).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn non_positive_price_rejected() {
    let lines = vec![line(1, "-10.00")];
    let err = calculate_amounts(&lines, Decimal::ZERO, dec("20"), Decimal::ZERO).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn out_of_range_percentages_rejected() {
    let lines = vec![line(1, "10.00")];
    assert!(matches!(
        calculate_amounts(&lines, dec("100.01"), dec("20"), Decimal::ZERO),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        calculate_amounts(&lines, dec("-1"), dec("20"), Decimal::ZERO),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        calculate_amounts(&lines, Decimal::ZERO, dec("101"), Decimal::ZERO),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn negative_shipping_rejected() {
    let lines = vec![line(1, "10.00")];
    let err = calculate_amounts(&lines, Decimal::ZERO, dec("20"), dec("-0.01")).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn default_tax_is_twenty_percent() {
    assert_eq!(DEFAULT_TAX_PERCENTAGE, dec("20"));
}

#[test]
fn line_total_is_exact() {
    assert_eq!(line_total(4, dec("12.50")), dec("50.00"));
    assert_eq!(line_total(3, dec("0.01")), dec("0.03"));
}

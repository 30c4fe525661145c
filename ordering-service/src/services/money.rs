//! Monetary calculation for orders and quotes.
//!
//! All intermediate arithmetic is exact decimal. Rounding happens once, at
//! persistence, via [`DocumentAmounts::rounded`].

use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;

/// Default VAT percentage applied when the caller does not supply one.
pub const DEFAULT_TAX_PERCENTAGE: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// A quantity/price pair feeding the calculation. Prices are catalog
/// snapshots resolved by the caller.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Computed amounts for an order or quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAmounts {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
}

impl DocumentAmounts {
    /// Round each component to 2 decimal places (half away from zero), then
    /// recompute the total from the rounded components so that
    /// `total = subtotal - discount + tax + shipping` holds exactly on what
    /// gets persisted.
    pub fn rounded(&self) -> DocumentAmounts {
        let round = |d: Decimal| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let subtotal = round(self.subtotal);
        let discount_amount = round(self.discount_amount);
        let tax_amount = round(self.tax_amount);
        let shipping_cost = round(self.shipping_cost);
        let total_amount = subtotal - discount_amount + tax_amount + shipping_cost;
        DocumentAmounts {
            subtotal,
            discount_amount,
            tax_amount,
            shipping_cost,
            total_amount,
        }
    }
}

/// Line total for a single item.
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

/// Compute document amounts from priced lines.
///
/// Discount applies to the subtotal; tax applies to the discounted subtotal;
/// shipping is added last and is neither discounted nor taxed.
pub fn calculate_amounts(
    lines: &[PricedLine],
    discount_percentage: Decimal,
    tax_percentage: Decimal,
    shipping_cost: Decimal,
) -> Result<DocumentAmounts, AppError> {
    if lines.is_empty() {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Document must contain at least one line item"
        )));
    }
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Line quantity must be greater than zero"
            )));
        }
        if line.unit_price <= Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Line unit price must be greater than zero"
            )));
        }
    }
    if discount_percentage < Decimal::ZERO || discount_percentage > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Discount percentage must be between 0 and 100, got {}",
            discount_percentage
        )));
    }
    if tax_percentage < Decimal::ZERO || tax_percentage > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Tax percentage must be between 0 and 100, got {}",
            tax_percentage
        )));
    }
    if shipping_cost < Decimal::ZERO {
        return Err(AppError::Validation(anyhow::anyhow!(
            "Shipping cost must not be negative, got {}",
            shipping_cost
        )));
    }

    let subtotal: Decimal = lines
        .iter()
        .map(|line| line_total(line.quantity, line.unit_price))
        .sum();
    let discount_amount = subtotal * discount_percentage / Decimal::ONE_HUNDRED;
    let taxable = subtotal - discount_amount;
    let tax_amount = taxable * tax_percentage / Decimal::ONE_HUNDRED;
    let total_amount = taxable + tax_amount + shipping_cost;

    Ok(DocumentAmounts {
        subtotal,
        discount_amount,
        tax_amount,
        shipping_cost,
        total_amount,
    })
}

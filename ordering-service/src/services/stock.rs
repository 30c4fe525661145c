//! Barrel stock ledger: locking, availability checks, reservation and
//! release, always inside the caller's transaction.
//!
//! Barrels are locked with `SELECT .. FOR UPDATE` in ascending id order so
//! that concurrent reservations acquire locks in the same order.

use crate::models::Barrel;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

/// A requested quantity against one barrel.
#[derive(Debug, Clone)]
pub struct StockRequest {
    pub barrel_id: Uuid,
    pub quantity: i32,
}

/// Collapse duplicate barrel references into one request per barrel, in
/// ascending barrel id order.
///
/// Quantities are caller-controlled, so the sum is overflow-checked.
pub fn aggregate_requests(requests: &[StockRequest]) -> Result<Vec<StockRequest>, AppError> {
    let mut merged: Vec<StockRequest> = Vec::new();
    for request in requests {
        match merged
            .iter_mut()
            .find(|r| r.barrel_id == request.barrel_id)
        {
            Some(existing) => {
                existing.quantity =
                    existing.quantity.checked_add(request.quantity).ok_or_else(|| {
                        AppError::Validation(anyhow::anyhow!(
                            "Requested quantity overflows for barrel {}",
                            request.barrel_id
                        ))
                    })?;
            }
            None => merged.push(request.clone()),
        }
    }
    merged.sort_by_key(|r| r.barrel_id);
    Ok(merged)
}

/// Lock the referenced barrels for update, in ascending id order.
///
/// Errors with `NotFound` if any requested barrel does not exist.
pub async fn lock_barrels(
    tx: &mut Transaction<'_, Postgres>,
    barrel_ids: &[Uuid],
) -> Result<Vec<Barrel>, AppError> {
    let mut ids = barrel_ids.to_vec();
    ids.sort();
    ids.dedup();

    let barrels = sqlx::query_as::<_, Barrel>(
        r#"
        SELECT barrel_id, name, wood_type, previous_content, condition,
            volume_liters, price, stock_quantity, created_utc, updated_utc
        FROM barrels
        WHERE barrel_id = ANY($1)
        ORDER BY barrel_id
        FOR UPDATE
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to lock barrels: {}", e)))?;

    if barrels.len() != ids.len() {
        for id in &ids {
            if !barrels.iter().any(|b| b.barrel_id == *id) {
                return Err(AppError::NotFound(anyhow::anyhow!("Barrel {} not found", id)));
            }
        }
    }

    Ok(barrels)
}

/// Check that every request can be satisfied from the given barrels.
///
/// All-or-nothing: the first shortfall fails the whole batch and no caller
/// may apply a partial reservation.
pub fn check_availability(barrels: &[Barrel], requests: &[StockRequest]) -> Result<(), AppError> {
    for request in aggregate_requests(requests)? {
        let barrel = barrels
            .iter()
            .find(|b| b.barrel_id == request.barrel_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Barrel {} not found", request.barrel_id))
            })?;
        if barrel.stock_quantity < request.quantity {
            return Err(AppError::InsufficientStock(anyhow::anyhow!(
                "Insufficient stock for '{}': requested {}, available {}",
                barrel.name,
                request.quantity,
                barrel.stock_quantity
            )));
        }
    }
    Ok(())
}

/// Lock, validate, and decrement stock for the whole batch.
///
/// Returns the locked barrels (pre-decrement) so callers can snapshot catalog
/// prices from the same consistent read.
#[instrument(skip(tx, requests), fields(request_count = requests.len()))]
pub async fn reserve(
    tx: &mut Transaction<'_, Postgres>,
    requests: &[StockRequest],
) -> Result<Vec<Barrel>, AppError> {
    let ids: Vec<Uuid> = requests.iter().map(|r| r.barrel_id).collect();
    let barrels = lock_barrels(tx, &ids).await?;
    check_availability(&barrels, requests)?;

    for request in aggregate_requests(requests)? {
        sqlx::query(
            r#"
            UPDATE barrels
            SET stock_quantity = stock_quantity - $2,
                updated_utc = NOW()
            WHERE barrel_id = $1
            "#,
        )
        .bind(request.barrel_id)
        .bind(request.quantity)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to reserve stock: {}", e)))?;
    }

    info!(barrels = barrels.len(), "Stock reserved");

    Ok(barrels)
}

/// Lock and validate without decrementing. Used where availability must be
/// confirmed but no reservation is taken, e.g. drafting a quote.
pub async fn ensure_available(
    tx: &mut Transaction<'_, Postgres>,
    requests: &[StockRequest],
) -> Result<Vec<Barrel>, AppError> {
    let ids: Vec<Uuid> = requests.iter().map(|r| r.barrel_id).collect();
    let barrels = lock_barrels(tx, &ids).await?;
    check_availability(&barrels, requests)?;
    Ok(barrels)
}

/// Return previously reserved quantities to stock.
///
/// The increment is not bounded by any prior reservation record; callers are
/// trusted to release only what they reserved.
#[instrument(skip(tx, requests), fields(request_count = requests.len()))]
pub async fn release(
    tx: &mut Transaction<'_, Postgres>,
    requests: &[StockRequest],
) -> Result<(), AppError> {
    let ids: Vec<Uuid> = requests.iter().map(|r| r.barrel_id).collect();
    lock_barrels(tx, &ids).await?;

    for request in aggregate_requests(requests)? {
        sqlx::query(
            r#"
            UPDATE barrels
            SET stock_quantity = stock_quantity + $2,
                updated_utc = NOW()
            WHERE barrel_id = $1
            "#,
        )
        .bind(request.barrel_id)
        .bind(request.quantity)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to release stock: {}", e)))?;
    }

    info!("Stock released");

    Ok(())
}

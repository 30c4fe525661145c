//! Quote lifecycle service, including passive expiry and conversion to
//! orders.

use crate::models::{
    CreateQuote, ListQuotesFilter, Order, OrderItem, Quote, QuoteItem, QuoteStatus, UpdateQuote,
};
use crate::services::database::Database;
use crate::services::metrics::{
    DB_QUERY_DURATION, ORDERS_TOTAL, QUOTES_TOTAL, STOCK_MOVEMENTS_TOTAL,
};
use crate::services::money::{self, PricedLine, DEFAULT_TAX_PERCENTAGE};
use crate::services::orders::{generate_order_number, ORDER_COLUMNS, ORDER_ITEM_COLUMNS};
use crate::services::stock::{self, StockRequest};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

/// Validity window applied when the caller does not set one.
const DEFAULT_VALIDITY_DAYS: i64 = 30;

const QUOTE_COLUMNS: &str = "quote_id, quote_number, user_id, status, \
    subtotal, discount_percentage, discount_amount, tax_percentage, tax_amount, shipping_cost, \
    total_amount, valid_until, converted_to_order_id, notes, \
    created_utc, updated_utc, sent_utc, accepted_utc, expired_utc, cancelled_utc";

const QUOTE_ITEM_COLUMNS: &str =
    "quote_item_id, quote_id, barrel_id, quantity, unit_price, total_price, created_utc";

/// Generate a unique quote number: QT-<timestamp>-<random>.
fn generate_quote_number() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let random_part = Uuid::new_v4().simple().to_string();
    format!("QT-{}-{}", timestamp, &random_part[..8])
}

async fn load_quote_items<'c, E>(executor: E, quote_id: Uuid) -> Result<Vec<QuoteItem>, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, QuoteItem>(&format!(
        "SELECT {QUOTE_ITEM_COLUMNS} FROM quote_items WHERE quote_id = $1 ORDER BY created_utc"
    ))
    .bind(quote_id)
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load quote items: {}", e)))
}

async fn insert_quote_items(
    tx: &mut Transaction<'_, Postgres>,
    quote_id: Uuid,
    items: &[(Uuid, i32, Decimal)],
) -> Result<Vec<QuoteItem>, AppError> {
    let mut inserted = Vec::with_capacity(items.len());
    for (barrel_id, quantity, unit_price) in items {
        let item = sqlx::query_as::<_, QuoteItem>(&format!(
            r#"
            INSERT INTO quote_items (quote_item_id, quote_id, barrel_id, quantity, unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {QUOTE_ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(quote_id)
        .bind(barrel_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(money::line_total(*quantity, *unit_price))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert quote item: {}", e))
        })?;
        inserted.push(item);
    }
    Ok(inserted)
}

/// Quote state machine and persistence.
#[derive(Clone)]
pub struct QuoteService {
    db: Database,
}

impl QuoteService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a draft quote. Availability is confirmed so the quoted lines
    /// are honest, but no stock is reserved until conversion.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_quote(
        &self,
        input: &CreateQuote,
    ) -> Result<(Quote, Vec<QuoteItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_quote"])
            .start_timer();

        if input.items.is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "A quote must contain at least one line item"
            )));
        }
        for item in &input.items {
            if item.quantity <= 0 {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Line quantity must be greater than zero"
                )));
            }
        }

        let now = Utc::now();
        if let Some(valid_until) = input.valid_until {
            if valid_until <= now {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Validity date must be in the future"
                )));
            }
        }
        let valid_until = input
            .valid_until
            .unwrap_or_else(|| now + Duration::days(DEFAULT_VALIDITY_DAYS));

        let discount_percentage = input.discount_percentage.unwrap_or(Decimal::ZERO);
        let tax_percentage = input.tax_percentage.unwrap_or(DEFAULT_TAX_PERCENTAGE);
        let shipping_cost = input.shipping_cost.unwrap_or(Decimal::ZERO);

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let requests: Vec<StockRequest> = input
            .items
            .iter()
            .map(|item| StockRequest {
                barrel_id: item.barrel_id,
                quantity: item.quantity,
            })
            .collect();
        let barrels = stock::ensure_available(&mut tx, &requests).await?;

        let mut lines = Vec::with_capacity(input.items.len());
        let mut item_rows = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let barrel = barrels
                .iter()
                .find(|b| b.barrel_id == item.barrel_id)
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("Barrel {} not found", item.barrel_id))
                })?;
            lines.push(PricedLine {
                quantity: item.quantity,
                unit_price: barrel.price,
            });
            item_rows.push((item.barrel_id, item.quantity, barrel.price));
        }
        let amounts =
            money::calculate_amounts(&lines, discount_percentage, tax_percentage, shipping_cost)?
                .rounded();

        let quote_id = Uuid::new_v4();
        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            INSERT INTO quotes (
                quote_id, quote_number, user_id, status,
                subtotal, discount_percentage, discount_amount, tax_percentage, tax_amount,
                shipping_cost, total_amount, valid_until, notes
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .bind(generate_quote_number())
        .bind(input.user_id)
        .bind(amounts.subtotal)
        .bind(discount_percentage)
        .bind(amounts.discount_amount)
        .bind(tax_percentage)
        .bind(amounts.tax_amount)
        .bind(amounts.shipping_cost)
        .bind(amounts.total_amount)
        .bind(valid_until)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create quote: {}", e)))?;

        let quote_items = insert_quote_items(&mut tx, quote_id, &item_rows).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        QUOTES_TOTAL.with_label_values(&["draft"]).inc();

        info!(
            quote_id = %quote.quote_id,
            quote_number = %quote.quote_number,
            total_amount = %quote.total_amount,
            "Quote created"
        );

        Ok((quote, quote_items))
    }

    /// Flip a sent or accepted quote to expired once its validity date has
    /// passed. Status-guarded, so concurrent calls converge on one outcome.
    async fn expire_if_due(&self, quote_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'expired',
                expired_utc = NOW(),
                updated_utc = NOW()
            WHERE quote_id = $1
              AND valid_until < NOW()
              AND status IN ('sent', 'accepted')
            "#,
        )
        .bind(quote_id)
        .execute(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to expire quote: {}", e)))?;

        if result.rows_affected() > 0 {
            QUOTES_TOTAL.with_label_values(&["expired"]).inc();
            info!(quote_id = %quote_id, "Quote expired on access");
        }

        Ok(())
    }

    /// Get a quote with its line items, applying passive expiry first.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn get_quote(&self, quote_id: Uuid) -> Result<(Quote, Vec<QuoteItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_quote"])
            .start_timer();

        self.expire_if_due(quote_id).await?;

        let quote = self.fetch_quote(quote_id).await?;
        let items = load_quote_items(self.db.pool(), quote_id).await?;

        timer.observe_duration();

        Ok((quote, items))
    }

    async fn fetch_quote(&self, quote_id: Uuid) -> Result<Quote, AppError> {
        sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = $1"
        ))
        .bind(quote_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quote: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))
    }

    /// List quotes with optional filters and keyset pagination. Overdue
    /// quotes are swept to expired first so listings never show a stale
    /// sent or accepted status.
    #[instrument(skip(self, filter))]
    pub async fn list_quotes(&self, filter: &ListQuotesFilter) -> Result<Vec<Quote>, AppError> {
        self.expire_due_quotes().await?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_quotes"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let quotes = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Quote>(&format!(
                r#"
                SELECT {QUOTE_COLUMNS}
                FROM quotes
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR user_id = $2)
                  AND ($3::timestamptz IS NULL OR created_utc >= $3)
                  AND ($4::timestamptz IS NULL OR created_utc <= $4)
                  AND quote_id > $5
                ORDER BY quote_id
                LIMIT $6
                "#
            ))
            .bind(&status_str)
            .bind(filter.user_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await
        } else {
            sqlx::query_as::<_, Quote>(&format!(
                r#"
                SELECT {QUOTE_COLUMNS}
                FROM quotes
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR user_id = $2)
                  AND ($3::timestamptz IS NULL OR created_utc >= $3)
                  AND ($4::timestamptz IS NULL OR created_utc <= $4)
                ORDER BY quote_id
                LIMIT $5
                "#
            ))
            .bind(&status_str)
            .bind(filter.user_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list quotes: {}", e)))?;

        timer.observe_duration();

        Ok(quotes)
    }

    /// Sweep all overdue sent and accepted quotes to expired. Returns the
    /// number of quotes expired.
    #[instrument(skip(self))]
    pub async fn expire_due_quotes(&self) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["expire_due_quotes"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'expired',
                expired_utc = NOW(),
                updated_utc = NOW()
            WHERE valid_until < NOW()
              AND status IN ('sent', 'accepted')
            "#,
        )
        .execute(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to expire quotes: {}", e)))?;

        timer.observe_duration();

        let expired = result.rows_affected();
        if expired > 0 {
            QUOTES_TOTAL
                .with_label_values(&["expired"])
                .inc_by(expired as f64);
            info!(expired = expired, "Expired overdue quotes");
        }

        Ok(expired)
    }

    /// Update a draft quote. Replacing line items re-checks availability and
    /// re-snapshots catalog prices; amounts are recomputed either way.
    #[instrument(skip(self, input), fields(quote_id = %quote_id))]
    pub async fn update_quote(
        &self,
        quote_id: Uuid,
        input: &UpdateQuote,
    ) -> Result<(Quote, Vec<QuoteItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quote"])
            .start_timer();

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = $1 FOR UPDATE"
        ))
        .bind(quote_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quote: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?;

        let status = existing.status();
        if !status.is_editable() {
            return Err(AppError::InvalidStateForOperation(anyhow::anyhow!(
                "Cannot update quote with status: {}",
                status
            )));
        }

        if let Some(valid_until) = input.valid_until {
            if valid_until <= Utc::now() {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Validity date must be in the future"
                )));
            }
        }

        let discount_percentage = input
            .discount_percentage
            .unwrap_or(existing.discount_percentage);
        let tax_percentage = input.tax_percentage.unwrap_or(existing.tax_percentage);
        let shipping_cost = input.shipping_cost.unwrap_or(existing.shipping_cost);

        let (lines, quote_items) = if let Some(items) = &input.items {
            if items.is_empty() {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "A quote must contain at least one line item"
                )));
            }
            for item in items {
                if item.quantity <= 0 {
                    return Err(AppError::Validation(anyhow::anyhow!(
                        "Line quantity must be greater than zero"
                    )));
                }
            }

            sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
                .bind(quote_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to replace quote items: {}",
                        e
                    ))
                })?;

            let requests: Vec<StockRequest> = items
                .iter()
                .map(|item| StockRequest {
                    barrel_id: item.barrel_id,
                    quantity: item.quantity,
                })
                .collect();
            let barrels = stock::ensure_available(&mut tx, &requests).await?;

            let mut lines = Vec::with_capacity(items.len());
            let mut item_rows = Vec::with_capacity(items.len());
            for item in items {
                let barrel = barrels
                    .iter()
                    .find(|b| b.barrel_id == item.barrel_id)
                    .ok_or_else(|| {
                        AppError::NotFound(anyhow::anyhow!("Barrel {} not found", item.barrel_id))
                    })?;
                lines.push(PricedLine {
                    quantity: item.quantity,
                    unit_price: barrel.price,
                });
                item_rows.push((item.barrel_id, item.quantity, barrel.price));
            }
            let inserted = insert_quote_items(&mut tx, quote_id, &item_rows).await?;
            (lines, inserted)
        } else {
            let items = load_quote_items(&mut *tx, quote_id).await?;
            let lines: Vec<PricedLine> = items
                .iter()
                .map(|item| PricedLine {
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect();
            (lines, items)
        };

        let amounts =
            money::calculate_amounts(&lines, discount_percentage, tax_percentage, shipping_cost)?
                .rounded();

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            UPDATE quotes
            SET subtotal = $2,
                discount_percentage = $3,
                discount_amount = $4,
                tax_percentage = $5,
                tax_amount = $6,
                shipping_cost = $7,
                total_amount = $8,
                valid_until = COALESCE($9, valid_until),
                notes = COALESCE($10, notes),
                updated_utc = NOW()
            WHERE quote_id = $1
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .bind(amounts.subtotal)
        .bind(discount_percentage)
        .bind(amounts.discount_amount)
        .bind(tax_percentage)
        .bind(amounts.tax_amount)
        .bind(amounts.shipping_cost)
        .bind(amounts.total_amount)
        .bind(input.valid_until)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update quote: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(quote_id = %quote.quote_id, "Quote updated");

        Ok((quote, quote_items))
    }

    /// Send a draft quote to the customer.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn send_quote(&self, quote_id: Uuid) -> Result<Quote, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["send_quote"])
            .start_timer();

        self.expire_if_due(quote_id).await?;

        let existing = self.fetch_quote(quote_id).await?;
        if existing.status() != QuoteStatus::Draft {
            return Err(AppError::InvalidStateForOperation(anyhow::anyhow!(
                "Cannot send quote with status: {}",
                existing.status()
            )));
        }

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            UPDATE quotes
            SET status = 'sent',
                sent_utc = NOW(),
                updated_utc = NOW()
            WHERE quote_id = $1 AND status = 'draft'
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to send quote: {}", e)))?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Quote {} changed status during send",
                quote_id
            ))
        })?;

        timer.observe_duration();

        QUOTES_TOTAL.with_label_values(&["sent"]).inc();

        info!(quote_id = %quote.quote_id, quote_number = %quote.quote_number, "Quote sent");

        Ok(quote)
    }

    /// Apply a status transition (accept, reject, expire, send, cancel).
    /// Conversion goes through [`Self::convert_quote_to_order`].
    #[instrument(skip(self), fields(quote_id = %quote_id, new_status = %new_status))]
    pub async fn update_quote_status(
        &self,
        quote_id: Uuid,
        new_status: QuoteStatus,
    ) -> Result<Quote, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quote_status"])
            .start_timer();

        if new_status == QuoteStatus::Converted {
            return Err(AppError::BusinessLogic(anyhow::anyhow!(
                "Quotes are converted through order conversion, not a direct status change"
            )));
        }

        self.expire_if_due(quote_id).await?;

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let quote = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = $1 FOR UPDATE"
        ))
        .bind(quote_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quote: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?;

        let current = quote.status();
        if !current.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition(anyhow::anyhow!(
                "Invalid status transition: {} -> {}",
                current,
                new_status
            )));
        }

        let now = Utc::now();
        let sent_utc = (new_status == QuoteStatus::Sent).then_some(now);
        let accepted_utc = (new_status == QuoteStatus::Accepted).then_some(now);
        let expired_utc = (new_status == QuoteStatus::Expired).then_some(now);
        let cancelled_utc = (new_status == QuoteStatus::Cancelled).then_some(now);

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            UPDATE quotes
            SET status = $2,
                updated_utc = NOW(),
                sent_utc = COALESCE($3, sent_utc),
                accepted_utc = COALESCE($4, accepted_utc),
                expired_utc = COALESCE($5, expired_utc),
                cancelled_utc = COALESCE($6, cancelled_utc)
            WHERE quote_id = $1
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .bind(new_status.as_str())
        .bind(sent_utc)
        .bind(accepted_utc)
        .bind(expired_utc)
        .bind(cancelled_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update quote status: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        QUOTES_TOTAL.with_label_values(&[new_status.as_str()]).inc();

        info!(
            quote_id = %quote.quote_id,
            from = %current,
            to = %new_status,
            "Quote status updated"
        );

        Ok(quote)
    }

    /// Cancel a draft quote. The record is kept with a terminal status; no
    /// stock was ever reserved for it.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn cancel_quote(&self, quote_id: Uuid) -> Result<Quote, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_quote"])
            .start_timer();

        let existing = self.fetch_quote(quote_id).await?;
        if existing.status() != QuoteStatus::Draft {
            return Err(AppError::BusinessLogic(anyhow::anyhow!(
                "Cannot cancel quote with status: {}",
                existing.status()
            )));
        }

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r#"
            UPDATE quotes
            SET status = 'cancelled',
                cancelled_utc = NOW(),
                updated_utc = NOW()
            WHERE quote_id = $1 AND status = 'draft'
            RETURNING {QUOTE_COLUMNS}
            "#
        ))
        .bind(quote_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel quote: {}", e)))?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Quote {} changed status during cancel",
                quote_id
            ))
        })?;

        timer.observe_duration();

        QUOTES_TOTAL.with_label_values(&["cancelled"]).inc();

        info!(quote_id = %quote.quote_id, "Quote cancelled");

        Ok(quote)
    }

    /// Convert an accepted quote into a pending order.
    ///
    /// Stock is reserved fresh at conversion time; nothing was held while the
    /// quote circulated. Quoted unit prices carry over unchanged even if the
    /// catalog moved in the meantime.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn convert_quote_to_order(
        &self,
        quote_id: Uuid,
    ) -> Result<(Order, Vec<OrderItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quote_to_order"])
            .start_timer();

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let quote = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_id = $1 FOR UPDATE"
        ))
        .bind(quote_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get quote: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quote {} not found", quote_id)))?;

        let now = Utc::now();
        if quote.expires_now(now) {
            sqlx::query(
                r#"
                UPDATE quotes
                SET status = 'expired',
                    expired_utc = NOW(),
                    updated_utc = NOW()
                WHERE quote_id = $1
                "#,
            )
            .bind(quote_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to expire quote: {}", e))
            })?;
            tx.commit().await.map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
            })?;
            QUOTES_TOTAL.with_label_values(&["expired"]).inc();
            return Err(AppError::BusinessLogic(anyhow::anyhow!(
                "Quote {} has expired",
                quote.quote_number
            )));
        }

        if quote.status() != QuoteStatus::Accepted {
            return Err(AppError::BusinessLogic(anyhow::anyhow!(
                "Cannot convert quote with status: {}",
                quote.status()
            )));
        }

        let quote_items = load_quote_items(&mut *tx, quote_id).await?;
        if quote_items.is_empty() {
            return Err(AppError::BusinessLogic(anyhow::anyhow!(
                "Quote {} has no line items",
                quote.quote_number
            )));
        }

        let requests: Vec<StockRequest> = quote_items
            .iter()
            .map(|item| StockRequest {
                barrel_id: item.barrel_id,
                quantity: item.quantity,
            })
            .collect();
        stock::reserve(&mut tx, &requests).await?;

        let lines: Vec<PricedLine> = quote_items
            .iter()
            .map(|item| PricedLine {
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        let amounts = money::calculate_amounts(
            &lines,
            quote.discount_percentage,
            quote.tax_percentage,
            quote.shipping_cost,
        )?
        .rounded();

        let order_id = Uuid::new_v4();
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                order_id, order_number, user_id, status, payment_status,
                subtotal, discount_percentage, discount_amount, tax_percentage, tax_amount,
                shipping_cost, total_amount, notes
            )
            VALUES ($1, $2, $3, 'pending', 'pending', $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(generate_order_number())
        .bind(quote.user_id)
        .bind(amounts.subtotal)
        .bind(quote.discount_percentage)
        .bind(amounts.discount_amount)
        .bind(quote.tax_percentage)
        .bind(amounts.tax_amount)
        .bind(amounts.shipping_cost)
        .bind(amounts.total_amount)
        .bind(&quote.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create order: {}", e)))?;

        let mut order_items = Vec::with_capacity(quote_items.len());
        for item in &quote_items {
            let order_item = sqlx::query_as::<_, OrderItem>(&format!(
                r#"
                INSERT INTO order_items (order_item_id, order_id, barrel_id, quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ORDER_ITEM_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(item.barrel_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(money::line_total(item.quantity, item.unit_price))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert order item: {}", e))
            })?;
            order_items.push(order_item);
        }

        sqlx::query(
            r#"
            UPDATE quotes
            SET status = 'converted',
                converted_to_order_id = $2,
                updated_utc = NOW()
            WHERE quote_id = $1
            "#,
        )
        .bind(quote_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark quote converted: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        ORDERS_TOTAL.with_label_values(&["pending"]).inc();
        QUOTES_TOTAL.with_label_values(&["converted"]).inc();
        STOCK_MOVEMENTS_TOTAL.with_label_values(&["reserve"]).inc();

        info!(
            quote_id = %quote.quote_id,
            order_id = %order.order_id,
            order_number = %order.order_number,
            "Quote converted to order"
        );

        Ok((order, order_items))
    }
}

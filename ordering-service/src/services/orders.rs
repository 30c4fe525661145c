//! Order lifecycle service.

use crate::models::{
    CreateOrder, ListOrdersFilter, Order, OrderItem, OrderStatus, PaymentStatus, UpdateOrder,
};
use crate::services::database::Database;
use crate::services::metrics::{DB_QUERY_DURATION, ORDERS_TOTAL, STOCK_MOVEMENTS_TOTAL};
use crate::services::money::{self, PricedLine, DEFAULT_TAX_PERCENTAGE};
use crate::services::stock::{self, StockRequest};
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::Postgres;
use tracing::{info, instrument};
use uuid::Uuid;

pub(crate) const ORDER_COLUMNS: &str = "order_id, order_number, user_id, status, payment_status, \
    shipping_address_id, billing_address_id, shipping_method, payment_method, tracking_number, \
    subtotal, discount_percentage, discount_amount, tax_percentage, tax_amount, shipping_cost, \
    total_amount, notes, created_utc, updated_utc, paid_utc, shipped_utc, delivered_utc, cancelled_utc";

pub(crate) const ORDER_ITEM_COLUMNS: &str =
    "order_item_id, order_id, barrel_id, quantity, unit_price, total_price, created_utc";

/// Generate a unique order number: ORD-<timestamp>-<random>.
pub(crate) fn generate_order_number() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let random_part = Uuid::new_v4().simple().to_string();
    format!("ORD-{}-{}", timestamp, &random_part[..8])
}

pub(crate) async fn load_order_items<'c, E>(
    executor: E,
    order_id: Uuid,
) -> Result<Vec<OrderItem>, AppError>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_utc"
    ))
    .bind(order_id)
    .fetch_all(executor)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load order items: {}", e)))
}

/// Order state machine and persistence.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
}

impl OrderService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an order: reserve stock, snapshot catalog prices, compute and
    /// freeze amounts, all in one transaction.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_order(
        &self,
        input: &CreateOrder,
    ) -> Result<(Order, Vec<OrderItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        if input.items.is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "An order must contain at least one line item"
            )));
        }
        for item in &input.items {
            if item.quantity <= 0 {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "Line quantity must be greater than zero"
                )));
            }
        }

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
        let barrels = stock::reserve(&mut tx, &requests).await?;

        let mut lines = Vec::with_capacity(input.items.len());
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
        }
        let amounts =
            money::calculate_amounts(&lines, discount_percentage, tax_percentage, shipping_cost)?
                .rounded();

        let order_id = Uuid::new_v4();
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                order_id, order_number, user_id, status, payment_status,
                shipping_address_id, billing_address_id, shipping_method, payment_method,
                subtotal, discount_percentage, discount_amount, tax_percentage, tax_amount,
                shipping_cost, total_amount, notes
            )
            VALUES ($1, $2, $3, 'pending', 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(generate_order_number())
        .bind(input.user_id)
        .bind(input.shipping_address_id)
        .bind(input.billing_address_id)
        .bind(&input.shipping_method)
        .bind(&input.payment_method)
        .bind(amounts.subtotal)
        .bind(discount_percentage)
        .bind(amounts.discount_amount)
        .bind(tax_percentage)
        .bind(amounts.tax_amount)
        .bind(amounts.shipping_cost)
        .bind(amounts.total_amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create order: {}", e)))?;

        let mut order_items = Vec::with_capacity(input.items.len());
        for (item, line) in input.items.iter().zip(&lines) {
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
            .bind(line.unit_price)
            .bind(money::line_total(item.quantity, line.unit_price))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert order item: {}", e))
            })?;
            order_items.push(order_item);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        ORDERS_TOTAL.with_label_values(&["pending"]).inc();
        STOCK_MOVEMENTS_TOTAL.with_label_values(&["reserve"]).inc();

        info!(
            order_id = %order.order_id,
            order_number = %order.order_number,
            total_amount = %order.total_amount,
            "Order created"
        );

        Ok((order, order_items))
    }

    /// Get an order with its line items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<(Order, Vec<OrderItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = self.fetch_order(order_id).await?;
        let items = load_order_items(self.db.pool(), order_id).await?;

        timer.observe_duration();

        Ok((order, items))
    }

    async fn fetch_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))
    }

    /// List orders with optional filters and keyset pagination.
    #[instrument(skip(self, filter))]
    pub async fn list_orders(&self, filter: &ListOrdersFilter) -> Result<Vec<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_orders"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let orders = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Order>(&format!(
                r#"
                SELECT {ORDER_COLUMNS}
                FROM orders
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR user_id = $2)
                  AND ($3::timestamptz IS NULL OR created_utc >= $3)
                  AND ($4::timestamptz IS NULL OR created_utc <= $4)
                  AND order_id > $5
                ORDER BY order_id
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
            sqlx::query_as::<_, Order>(&format!(
                r#"
                SELECT {ORDER_COLUMNS}
                FROM orders
                WHERE ($1::varchar IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR user_id = $2)
                  AND ($3::timestamptz IS NULL OR created_utc >= $3)
                  AND ($4::timestamptz IS NULL OR created_utc <= $4)
                ORDER BY order_id
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
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list orders: {}", e)))?;

        timer.observe_duration();

        Ok(orders)
    }

    /// Update mutable order fields. Allowed while pending or processing;
    /// amounts and line items are frozen at creation and never change here.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        input: &UpdateOrder,
    ) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_order"])
            .start_timer();

        let existing = self.fetch_order(order_id).await?;
        let status = existing.status();
        if !matches!(status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(AppError::InvalidStateForOperation(anyhow::anyhow!(
                "Cannot update order with status: {}",
                status
            )));
        }

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET shipping_address_id = COALESCE($2, shipping_address_id),
                billing_address_id = COALESCE($3, billing_address_id),
                shipping_method = COALESCE($4, shipping_method),
                tracking_number = COALESCE($5, tracking_number),
                notes = COALESCE($6, notes),
                updated_utc = NOW()
            WHERE order_id = $1 AND status IN ('pending', 'processing')
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(input.shipping_address_id)
        .bind(input.billing_address_id)
        .bind(&input.shipping_method)
        .bind(&input.tracking_number)
        .bind(&input.notes)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update order: {}", e)))?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Order {} changed status during update",
                order_id
            ))
        })?;

        timer.observe_duration();

        info!(order_id = %order.order_id, "Order updated");

        Ok(order)
    }

    /// Apply a fulfilment status transition. Cancellation returns reserved
    /// stock in the same transaction.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_order_status"])
            .start_timer();

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))?;

        let current = order.status();
        if !current.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition(anyhow::anyhow!(
                "Invalid status transition: {} -> {}",
                current,
                new_status
            )));
        }

        let mut released = false;
        if new_status == OrderStatus::Cancelled {
            let items = load_order_items(&mut *tx, order_id).await?;
            let requests: Vec<StockRequest> = items
                .iter()
                .map(|item| StockRequest {
                    barrel_id: item.barrel_id,
                    quantity: item.quantity,
                })
                .collect();
            stock::release(&mut tx, &requests).await?;
            released = true;
        }

        let now = Utc::now();
        let shipped_utc = (new_status == OrderStatus::Shipped).then_some(now);
        let delivered_utc = (new_status == OrderStatus::Delivered).then_some(now);
        let cancelled_utc = (new_status == OrderStatus::Cancelled).then_some(now);

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = $2,
                updated_utc = NOW(),
                shipped_utc = COALESCE($3, shipped_utc),
                delivered_utc = COALESCE($4, delivered_utc),
                cancelled_utc = COALESCE($5, cancelled_utc)
            WHERE order_id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(new_status.as_str())
        .bind(shipped_utc)
        .bind(delivered_utc)
        .bind(cancelled_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update order status: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        ORDERS_TOTAL.with_label_values(&[new_status.as_str()]).inc();
        if released {
            STOCK_MOVEMENTS_TOTAL.with_label_values(&["release"]).inc();
        }

        info!(
            order_id = %order.order_id,
            from = %current,
            to = %new_status,
            "Order status updated"
        );

        Ok(order)
    }

    /// Update the payment status. Payment state is tracked, not enforced by
    /// the fulfilment state machine.
    #[instrument(skip(self), fields(order_id = %order_id, payment_status = %new_payment_status))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        new_payment_status: PaymentStatus,
    ) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_payment_status"])
            .start_timer();

        let paid_utc = (new_payment_status == PaymentStatus::Paid).then(Utc::now);

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET payment_status = $2,
                paid_utc = COALESCE($3, paid_utc),
                updated_utc = NOW()
            WHERE order_id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(new_payment_status.as_str())
        .bind(paid_utc)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update payment status: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))?;

        timer.observe_duration();

        info!(order_id = %order.order_id, payment_status = %new_payment_status, "Payment status updated");

        Ok(order)
    }

    /// Cancel an order and return its stock. Only pending and processing
    /// orders are eligible; the record is kept with a terminal status.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_order"])
            .start_timer();

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))?;

        let current = order.status();
        if !current.is_cancellable() {
            return Err(AppError::BusinessLogic(anyhow::anyhow!(
                "Cannot cancel order with status: {}",
                current
            )));
        }

        let items = load_order_items(&mut *tx, order_id).await?;
        let requests: Vec<StockRequest> = items
            .iter()
            .map(|item| StockRequest {
                barrel_id: item.barrel_id,
                quantity: item.quantity,
            })
            .collect();
        stock::release(&mut tx, &requests).await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = 'cancelled',
                cancelled_utc = NOW(),
                updated_utc = NOW()
            WHERE order_id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel order: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        ORDERS_TOTAL.with_label_values(&["cancelled"]).inc();
        STOCK_MOVEMENTS_TOTAL.with_label_values(&["release"]).inc();

        info!(order_id = %order.order_id, "Order cancelled");

        Ok(order)
    }
}

//! Orders and order items.
//!
//! An order and all of its items are written in one transaction, so a reader never
//! sees a partial order. Status changes are compare-and-set on the current status.

use crate::{store_error, to_i32, to_u32};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use storefront_core::order::{Order, OrderItem, OrderStatus, OrderStore, OrderTotals};
use storefront_core::types::{AddressId, OrderId, ProductId, ServiceAreaId, SlotId, UserId};
use storefront_core::{Money, StoreError, StoreFuture};
use uuid::Uuid;

const ORDER_COLUMNS: &str = r"
    id, user_id, address_id, service_area_id, slot_id, delivery_date,
    subtotal, discount, fees, tax, delivery_fee, total, coupon_code,
    status, payment_method, payment_status, created_at, updated_at
";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    address_id: i64,
    service_area_id: i64,
    slot_id: i64,
    delivery_date: NaiveDate,
    subtotal: i64,
    discount: i64,
    fees: i64,
    tax: i64,
    delivery_fee: i64,
    total: i64,
    coupon_code: Option<String>,
    status: String,
    payment_method: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let data_error = |e: storefront_core::order::ParseEnumError| StoreError::Data(e.to_string());

        Ok(Order {
            id: OrderId::from_uuid(self.id),
            user_id: UserId::new(self.user_id),
            address_id: AddressId::new(self.address_id),
            service_area_id: ServiceAreaId::new(self.service_area_id),
            slot_id: SlotId::new(self.slot_id),
            delivery_date: self.delivery_date,
            items,
            totals: OrderTotals {
                subtotal: Money::from_cents(self.subtotal),
                discount: Money::from_cents(self.discount),
                fees: Money::from_cents(self.fees),
                tax: Money::from_cents(self.tax),
                delivery_fee: Money::from_cents(self.delivery_fee),
                total: Money::from_cents(self.total),
            },
            coupon_code: self.coupon_code,
            status: self.status.parse().map_err(data_error)?,
            payment_method: self.payment_method.parse().map_err(data_error)?,
            payment_status: self.payment_status.parse().map_err(data_error)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// `PostgreSQL` order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Create an order store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Items for the given orders, grouped by order, in insertion order.
    async fn items_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT order_id, product_id, product_name, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id").map_err(store_error)?;
            items.entry(order_id).or_default().push(OrderItem {
                product_id: ProductId::new(row.try_get("product_id").map_err(store_error)?),
                name: row.try_get("product_name").map_err(store_error)?,
                quantity: to_u32(row.try_get("quantity").map_err(store_error)?, "quantity")?,
                unit_price: Money::from_cents(row.try_get("unit_price").map_err(store_error)?),
            });
        }
        Ok(items)
    }
}

impl OrderStore for PostgresOrderStore {
    fn insert_order<'a>(&'a self, order: &'a Order) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(store_error)?;

            sqlx::query(&format!(
                r"
                INSERT INTO orders ({ORDER_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
                "
            ))
            .bind(order.id.as_uuid())
            .bind(order.user_id.as_str())
            .bind(order.address_id.get())
            .bind(order.service_area_id.get())
            .bind(order.slot_id.get())
            .bind(order.delivery_date)
            .bind(order.totals.subtotal.cents())
            .bind(order.totals.discount.cents())
            .bind(order.totals.fees.cents())
            .bind(order.totals.tax.cents())
            .bind(order.totals.delivery_fee.cents())
            .bind(order.totals.total.cents())
            .bind(order.coupon_code.as_deref())
            .bind(order.status.as_str())
            .bind(order.payment_method.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

            let mut product_ids = Vec::with_capacity(order.items.len());
            let mut names = Vec::with_capacity(order.items.len());
            let mut quantities = Vec::with_capacity(order.items.len());
            let mut unit_prices = Vec::with_capacity(order.items.len());
            let mut line_totals = Vec::with_capacity(order.items.len());
            for item in &order.items {
                product_ids.push(item.product_id.get());
                names.push(item.name.clone());
                quantities.push(to_i32(item.quantity, "quantity")?);
                unit_prices.push(item.unit_price.cents());
                line_totals.push(item.total().cents());
            }

            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, line_total)
                SELECT $1::UUID, *
                FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::INTEGER[], $5::BIGINT[], $6::BIGINT[])
                ",
            )
            .bind(order.id.as_uuid())
            .bind(&product_ids)
            .bind(&names)
            .bind(&quantities)
            .bind(&unit_prices)
            .bind(&line_totals)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

            tx.commit().await.map_err(store_error)?;

            tracing::debug!(
                order_id = %order.id,
                items = order.items.len(),
                "Order persisted"
            );

            Ok(())
        })
    }

    fn order(&self, id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move {
            let row: Option<OrderRow> =
                sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(store_error)?;

            let Some(row) = row else {
                return Ok(None);
            };

            let mut items = self.items_for(&[row.id]).await?;
            let items = items.remove(&row.id).unwrap_or_default();
            row.into_order(items).map(Some)
        })
    }

    fn orders_for_user<'a>(&'a self, user: &'a UserId, limit: u32) -> StoreFuture<'a, Vec<Order>> {
        Box::pin(async move {
            let rows: Vec<OrderRow> = sqlx::query_as(&format!(
                r"
                SELECT {ORDER_COLUMNS}
                FROM orders
                WHERE user_id = $1
                ORDER BY created_at DESC, id
                LIMIT $2
                "
            ))
            .bind(user.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
            let mut items = self.items_for(&ids).await?;

            rows.into_iter()
                .map(|row| {
                    let order_items = items.remove(&row.id).unwrap_or_default();
                    row.into_order(order_items)
                })
                .collect()
        })
    }

    fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
            )
            .bind(id.as_uuid())
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

            let updated = result.rows_affected() == 1;
            if updated {
                tracing::info!(order_id = %id, from = %from, to = %to, "Order status updated");
            }
            Ok(updated)
        })
    }
}

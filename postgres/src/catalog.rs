//! Read-only catalog queries.

use crate::{store_error, to_u32};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::PgPool;
use storefront_core::catalog::{
    Address, Catalog, DeliverySlot, FeeKind, FeeRule, Product, ServiceArea,
};
use storefront_core::coupon::{Coupon, DiscountKind};
use storefront_core::types::{AddressId, ProductId, ServiceAreaId, SlotId, UserId};
use storefront_core::{Money, StoreError, StoreFuture};

const SERVICE_AREA_COLUMNS: &str =
    "id, name, postal_codes, delivery_charge, free_delivery_above, is_active";
const SLOT_COLUMNS: &str = "id, service_area_id, start_time, end_time, max_orders, is_active";

#[derive(sqlx::FromRow)]
struct ServiceAreaRow {
    id: i64,
    name: String,
    postal_codes: Vec<String>,
    delivery_charge: i64,
    free_delivery_above: Option<i64>,
    is_active: bool,
}

impl From<ServiceAreaRow> for ServiceArea {
    fn from(row: ServiceAreaRow) -> Self {
        Self {
            id: ServiceAreaId::new(row.id),
            name: row.name,
            postal_codes: row.postal_codes,
            delivery_charge: Money::from_cents(row.delivery_charge),
            free_delivery_above: row.free_delivery_above.map(Money::from_cents),
            is_active: row.is_active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: i64,
    user_id: String,
    line1: String,
    line2: Option<String>,
    city: String,
    postal_code: String,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            line1: row.line1,
            line2: row.line2,
            city: row.city,
            postal_code: row.postal_code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: i64,
    stock_quantity: i32,
    is_active: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: Money::from_cents(row.price),
            stock_quantity: to_u32(row.stock_quantity, "stock_quantity")?,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: i64,
    service_area_id: i64,
    start_time: NaiveTime,
    end_time: NaiveTime,
    max_orders: i32,
    is_active: bool,
}

impl TryFrom<SlotRow> for DeliverySlot {
    type Error = StoreError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SlotId::new(row.id),
            service_area_id: ServiceAreaId::new(row.service_area_id),
            start_time: row.start_time,
            end_time: row.end_time,
            max_orders: to_u32(row.max_orders, "max_orders")?,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    code: String,
    discount_type: String,
    discount_value: i64,
    min_order_value: i64,
    max_discount_value: Option<i64>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let kind = match row.discount_type.as_str() {
            "fixed" => DiscountKind::Fixed {
                amount: Money::from_cents(row.discount_value),
            },
            "percentage" => DiscountKind::Percentage {
                basis_points: basis_points(row.discount_value)?,
            },
            other => {
                return Err(StoreError::Data(format!("Invalid discount type: {other}")));
            }
        };

        Ok(Self {
            code: row.code,
            kind,
            min_order_value: Money::from_cents(row.min_order_value),
            max_discount_value: row.max_discount_value.map(Money::from_cents),
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FeeRuleRow {
    name: String,
    fee_type: String,
    amount: i64,
    applies_below: Option<i64>,
    is_active: bool,
}

impl TryFrom<FeeRuleRow> for FeeRule {
    type Error = StoreError;

    fn try_from(row: FeeRuleRow) -> Result<Self, Self::Error> {
        let kind = match row.fee_type.as_str() {
            "fixed" => FeeKind::Fixed {
                amount: Money::from_cents(row.amount),
            },
            "percentage" => FeeKind::Percentage {
                basis_points: basis_points(row.amount)?,
            },
            other => return Err(StoreError::Data(format!("Invalid fee type: {other}"))),
        };

        Ok(Self {
            name: row.name,
            kind,
            applies_below: row.applies_below.map(Money::from_cents),
            is_active: row.is_active,
        })
    }
}

fn basis_points(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value)
        .ok()
        .filter(|bps| *bps <= 10_000)
        .ok_or_else(|| StoreError::Data(format!("Percentage out of range: {value} bps")))
}

/// `PostgreSQL` catalog.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Create a catalog over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Catalog for PostgresCatalog {
    fn products<'a>(&'a self, ids: &'a [ProductId]) -> StoreFuture<'a, Vec<Product>> {
        Box::pin(async move {
            let ids: Vec<i64> = ids.iter().map(ProductId::get).collect();

            let rows: Vec<ProductRow> = sqlx::query_as(
                "SELECT id, name, price, stock_quantity, is_active FROM products WHERE id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            rows.into_iter().map(Product::try_from).collect()
        })
    }

    fn address(&self, id: AddressId) -> StoreFuture<'_, Option<Address>> {
        Box::pin(async move {
            let row: Option<AddressRow> = sqlx::query_as(
                "SELECT id, user_id, line1, line2, city, postal_code FROM addresses WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.map(Address::from))
        })
    }

    fn service_area(&self, id: ServiceAreaId) -> StoreFuture<'_, Option<ServiceArea>> {
        Box::pin(async move {
            let row: Option<ServiceAreaRow> = sqlx::query_as(&format!(
                "SELECT {SERVICE_AREA_COLUMNS} FROM service_areas WHERE id = $1"
            ))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.map(ServiceArea::from))
        })
    }

    fn service_area_for_postal_code<'a>(
        &'a self,
        postal_code: &'a str,
    ) -> StoreFuture<'a, Option<ServiceArea>> {
        Box::pin(async move {
            // Prefer an active area when an inactive one lists the same code.
            let row: Option<ServiceAreaRow> = sqlx::query_as(&format!(
                r"
                SELECT {SERVICE_AREA_COLUMNS}
                FROM service_areas
                WHERE $1 = ANY(postal_codes)
                ORDER BY is_active DESC, id
                LIMIT 1
                "
            ))
            .bind(postal_code.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            Ok(row.map(ServiceArea::from))
        })
    }

    fn delivery_slot(&self, id: SlotId) -> StoreFuture<'_, Option<DeliverySlot>> {
        Box::pin(async move {
            let row: Option<SlotRow> =
                sqlx::query_as(&format!("SELECT {SLOT_COLUMNS} FROM delivery_slots WHERE id = $1"))
                    .bind(id.get())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(store_error)?;

            row.map(DeliverySlot::try_from).transpose()
        })
    }

    fn slots_for_area(&self, area: ServiceAreaId) -> StoreFuture<'_, Vec<DeliverySlot>> {
        Box::pin(async move {
            let rows: Vec<SlotRow> = sqlx::query_as(&format!(
                r"
                SELECT {SLOT_COLUMNS}
                FROM delivery_slots
                WHERE service_area_id = $1
                ORDER BY start_time, id
                "
            ))
            .bind(area.get())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            rows.into_iter().map(DeliverySlot::try_from).collect()
        })
    }

    fn coupon_by_code<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<Coupon>> {
        Box::pin(async move {
            let row: Option<CouponRow> = sqlx::query_as(
                r"
                SELECT code, discount_type, discount_value, min_order_value,
                       max_discount_value, starts_at, ends_at, is_active
                FROM coupons
                WHERE upper(code) = upper($1)
                ",
            )
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            row.map(Coupon::try_from).transpose()
        })
    }

    fn fee_rules(&self) -> StoreFuture<'_, Vec<FeeRule>> {
        Box::pin(async move {
            let rows: Vec<FeeRuleRow> = sqlx::query_as(
                r"
                SELECT name, fee_type, amount, applies_below, is_active
                FROM fee_rules
                WHERE is_active
                ORDER BY id
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            rows.into_iter().map(FeeRule::try_from).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coupon_row(discount_type: &str, discount_value: i64) -> CouponRow {
        CouponRow {
            code: "SAVE10".to_string(),
            discount_type: discount_type.to_string(),
            discount_value,
            min_order_value: 10_000,
            max_discount_value: Some(5_000),
            starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            ends_at: Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).single().unwrap_or_default(),
            is_active: true,
        }
    }

    #[test]
    fn percentage_coupons_map_to_basis_points() {
        let coupon = Coupon::try_from(coupon_row("percentage", 1000));
        assert_eq!(
            coupon.map(|c| c.kind),
            Ok(DiscountKind::Percentage { basis_points: 1000 })
        );
    }

    #[test]
    fn unknown_discount_types_are_data_errors() {
        assert!(matches!(
            Coupon::try_from(coupon_row("bogo", 1)),
            Err(StoreError::Data(_))
        ));
        assert!(Coupon::try_from(coupon_row("percentage", 20_000)).is_err());
    }

    #[test]
    fn negative_capacity_is_rejected() {
        let row = SlotRow {
            id: 1,
            service_area_id: 1,
            start_time: NaiveTime::MIN,
            end_time: NaiveTime::MIN,
            max_orders: -1,
            is_active: true,
        };
        assert!(DeliverySlot::try_from(row).is_err());
    }
}

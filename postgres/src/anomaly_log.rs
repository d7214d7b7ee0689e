//! Anomaly log for checkout invariant violations.
//!
//! Stores every reservation that outlived its order (and every cancelled order whose
//! booking could not be given back) until an operator reconciles the ledger and
//! marks the entry resolved.

use crate::store_error;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use storefront_core::anomaly::{Anomaly, AnomalyKind, AnomalyLog};
use storefront_core::types::{OrderId, SlotId, UserId};
use storefront_core::{StoreError, StoreFuture};
use uuid::Uuid;

/// A stored anomaly plus its resolution state.
#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    /// Unique identifier for this entry
    pub id: i64,

    /// What went wrong
    pub anomaly: Anomaly,

    /// When an operator resolved it
    pub resolved_at: Option<DateTime<Utc>>,

    /// Who resolved it
    pub resolved_by: Option<String>,

    /// What was done about it
    pub resolution_notes: Option<String>,
}

impl AnomalyRecord {
    /// Whether the entry still needs attention.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// `PostgreSQL`-backed anomaly log.
///
/// # Example
///
/// ```no_run
/// use storefront_postgres::PostgresAnomalyLog;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let log = PostgresAnomalyLog::new(pool);
///
/// for record in log.list_open(50).await? {
///     println!("{} {} {}", record.id, record.anomaly.kind, record.anomaly.slot_id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresAnomalyLog {
    pool: PgPool,
}

impl PostgresAnomalyLog {
    /// Create an anomaly log over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unresolved entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the classified [`StoreError`] if the query fails or a row cannot be decoded.
    pub async fn list_open(&self, limit: u32) -> Result<Vec<AnomalyRecord>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, kind, order_id, slot_id, delivery_date, user_id, error,
                compensated, occurred_at, resolved_at, resolved_by, resolution_notes
            FROM intake_anomalies
            WHERE resolved_at IS NULL
            ORDER BY occurred_at ASC, id ASC
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Mark an entry as resolved.
    ///
    /// Returns `false` if the entry does not exist or was already resolved.
    ///
    /// # Errors
    ///
    /// Returns the classified [`StoreError`] if the update fails.
    pub async fn resolve(
        &self,
        id: i64,
        resolved_by: &str,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE intake_anomalies
            SET resolved_at = NOW(),
                resolved_by = $1,
                resolution_notes = $2
            WHERE id = $3 AND resolved_at IS NULL
            ",
        )
        .bind(resolved_by)
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let resolved = result.rows_affected() == 1;
        if resolved {
            tracing::info!(anomaly_id = id, resolved_by, "Anomaly marked as resolved");
            metrics::counter!("checkout_anomalies_resolved_total").increment(1);
        }

        Ok(resolved)
    }

    /// Number of unresolved entries.
    ///
    /// # Errors
    ///
    /// Returns the classified [`StoreError`] if the query fails.
    pub async fn count_open(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM intake_anomalies WHERE resolved_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    fn row_to_record(row: &PgRow) -> Result<AnomalyRecord, StoreError> {
        let kind: String = row.try_get("kind").map_err(store_error)?;
        let order_id: Uuid = row.try_get("order_id").map_err(store_error)?;
        let delivery_date: NaiveDate = row.try_get("delivery_date").map_err(store_error)?;
        let user_id: String = row.try_get("user_id").map_err(store_error)?;

        Ok(AnomalyRecord {
            id: row.try_get("id").map_err(store_error)?,
            anomaly: Anomaly {
                kind: kind
                    .parse::<AnomalyKind>()
                    .map_err(|e| StoreError::Data(e.to_string()))?,
                order_id: OrderId::from_uuid(order_id),
                slot_id: SlotId::new(row.try_get("slot_id").map_err(store_error)?),
                delivery_date,
                user_id: UserId::new(user_id),
                error: row.try_get("error").map_err(store_error)?,
                compensated: row.try_get("compensated").map_err(store_error)?,
                occurred_at: row.try_get("occurred_at").map_err(store_error)?,
            },
            resolved_at: row.try_get("resolved_at").map_err(store_error)?,
            resolved_by: row.try_get("resolved_by").map_err(store_error)?,
            resolution_notes: row.try_get("resolution_notes").map_err(store_error)?,
        })
    }
}

impl AnomalyLog for PostgresAnomalyLog {
    fn record<'a>(&'a self, anomaly: &'a Anomaly) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO intake_anomalies (
                    kind, order_id, slot_id, delivery_date, user_id,
                    error, compensated, occurred_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                ",
            )
            .bind(anomaly.kind.as_str())
            .bind(anomaly.order_id.as_uuid())
            .bind(anomaly.slot_id.get())
            .bind(anomaly.delivery_date)
            .bind(anomaly.user_id.as_str())
            .bind(&anomaly.error)
            .bind(anomaly.compensated)
            .bind(anomaly.occurred_at)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

            tracing::warn!(
                anomaly_id = id,
                kind = %anomaly.kind,
                order_id = %anomaly.order_id,
                slot_id = %anomaly.slot_id,
                delivery_date = %anomaly.delivery_date,
                compensated = anomaly.compensated,
                "Checkout anomaly recorded"
            );

            Ok(id)
        })
    }
}

//! `PostgreSQL` storage for the storefront checkout.
//!
//! This crate implements the storage seams from `storefront-core` on top of a
//! shared `sqlx` connection pool:
//!
//! - [`PostgresSlotLedger`]: per-(slot, date) bookings, each reservation and release
//!   a single conditional statement
//! - [`PostgresCatalog`]: products, addresses, service areas, slots, coupons, fees
//! - [`PostgresOrderStore`]: orders and their items written in one transaction
//! - [`PostgresAnomalyLog`]: durable record of checkout invariant violations
//!
//! # Example
//!
//! ```ignore
//! use storefront_postgres::{PoolSettings, PostgresSlotLedger, connect, migrate};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect(&PoolSettings::new("postgres://localhost/storefront")).await?;
//!     migrate(&pool).await?;
//!     let ledger = PostgresSlotLedger::new(pool);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use storefront_core::StoreError;

pub mod anomaly_log;
pub mod catalog;
pub mod ledger;
pub mod orders;

pub use anomaly_log::{AnomalyRecord, PostgresAnomalyLog};
pub use catalog::PostgresCatalog;
pub use ledger::PostgresSlotLedger;
pub use orders::PostgresOrderStore;

/// Serialization failure, deadlock, lock timeout, statement timeout.
const TRANSIENT_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Connection URL
    pub url: String,
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout` for every connection
    pub statement_timeout: Duration,
    /// Idle connections above `min_connections` are closed after this long
    pub idle_timeout: Duration,
}

impl PoolSettings {
    /// Settings for `url` with the default pool sizing.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the URL is malformed and the classified
/// connection error if the database cannot be reached.
pub async fn connect(settings: &PoolSettings) -> Result<PgPool, StoreError> {
    let options = PgConnectOptions::from_str(&settings.url)
        .map_err(|e| StoreError::Database(format!("Invalid database URL: {e}")))?
        .options([(
            "statement_timeout",
            format!("{}ms", settings.statement_timeout.as_millis()),
        )]);

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect_with(options)
        .await
        .map_err(store_error)?;

    tracing::info!(
        max_connections = settings.max_connections,
        "Connected to PostgreSQL"
    );

    Ok(pool)
}

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;

    tracing::info!("Database migrations applied");
    Ok(())
}

/// Classify a `sqlx` error for the intake service's retry decision.
///
/// Pool exhaustion, serialization failures, deadlocks and timeouts are transient:
/// the server rolled the statement back or never received it. A broken connection
/// is indeterminate because the statement may have committed before the reply was
/// lost. Integrity violations are constraint errors. Decoding problems mean a row
/// does not fit the domain type.
#[must_use]
pub fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let transient = db_err
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()));

            if transient {
                StoreError::Transient(err.to_string())
            } else if db_err.is_unique_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_check_violation()
            {
                StoreError::Constraint(err.to_string())
            } else {
                StoreError::Database(err.to_string())
            }
        }
        sqlx::Error::PoolTimedOut => StoreError::Transient(err.to_string()),
        sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => StoreError::Indeterminate(err.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Data(err.to_string()),
        _ => StoreError::Database(err.to_string()),
    }
}

/// Convert a non-negative database integer into a count.
pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Data(format!("Negative {column}: {value}")))
}

/// Convert a count into a database integer.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Data(format!("{column} out of range: {value}")))
}

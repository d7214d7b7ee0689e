//! Readiness probe for the database.

use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use storefront_runtime::health::{HealthCheck, HealthProbe};

/// Checks that the pool can run a trivial query.
#[derive(Clone)]
pub struct DatabaseProbe {
    pool: PgPool,
}

impl DatabaseProbe {
    /// Probe backed by `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl HealthProbe for DatabaseProbe {
    fn check(&self) -> Pin<Box<dyn Future<Output = HealthCheck> + Send + '_>> {
        Box::pin(async move {
            match sqlx::query("SELECT 1").execute(&self.pool).await {
                Ok(_) => HealthCheck::healthy("database"),
                Err(e) => {
                    tracing::warn!(error = %e, "Database readiness probe failed");
                    HealthCheck::unhealthy("database", e.to_string())
                }
            }
        })
    }
}

//! Storage errors shared by every backend.
//!
//! Backends map their native errors (sqlx, poisoned locks, ...) into [`StoreError`] so
//! the intake service can decide what to retry without knowing which store it talks to.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by the storage traits.
///
/// The traits use explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so they stay dyn-compatible (`Arc<dyn SlotLedger>`) and the futures are `Send`.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Contention or timeout that is expected to clear on retry.
    ///
    /// Serialization failures, deadlocks, lock timeouts, statement timeouts and
    /// pool exhaustion land here. The database rejected or never saw the request,
    /// so running it again cannot apply it twice.
    #[error("Transient store error: {0}")]
    Transient(String),

    /// The connection failed after the request was sent.
    ///
    /// The statement may or may not have been applied. Counter updates must not be
    /// retried after this, or a single order could be counted twice.
    #[error("Store outcome unknown: {0}")]
    Indeterminate(String),

    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be mapped into a domain type.
    #[error("Data error: {0}")]
    Data(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the failed write may have been applied anyway.
    #[must_use]
    pub const fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate(_))
    }
}

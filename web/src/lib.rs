//! Axum HTTP surface for storefront checkout.
//!
//! Handlers are a thin imperative shell: they read the authenticated user and the
//! JSON body, call the [`OrderIntakeService`](storefront_runtime::OrderIntakeService),
//! and map its result to a response.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives; the correlation layer tags it
//! 2. **Extract** the user from the identity gateway's headers, then the body
//! 3. **Call** the intake service
//! 4. **Map** the order or [`IntakeError`](storefront_runtime::IntakeError) to a response
//!
//! # Example
//!
//! ```ignore
//! use storefront_web::{AppState, router};
//!
//! let app = router(AppState::new(intake, vec![database_probe]));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AdminUser, AuthenticatedUser, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use router::router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

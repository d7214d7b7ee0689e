//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by resource.

pub mod admin;
pub mod coupons;
pub mod health;
pub mod orders;
pub mod slots;

// Re-export common handler utilities
pub use health::{health_check, ready};

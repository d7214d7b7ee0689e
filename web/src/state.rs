//! Application state for Axum handlers.

use std::sync::Arc;
use storefront_runtime::OrderIntakeService;
use storefront_runtime::health::HealthProbe;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: the intake service shares its collaborators through `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Checkout orchestration
    pub intake: OrderIntakeService,
    /// Dependencies checked by `/ready`
    pub probes: Arc<[Arc<dyn HealthProbe>]>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(intake: OrderIntakeService, probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            intake,
            probes: probes.into(),
        }
    }
}

//! Application state management

use seesay_core::VqaService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VqaService>,
}

impl AppState {
    pub fn new(service: VqaService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

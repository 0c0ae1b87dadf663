// src/state.rs
use std::sync::Arc;

use crate::services::orchestrator::Orchestrator;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub orchestrator: Arc<dyn Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

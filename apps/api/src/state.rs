use std::sync::Arc;

use crate::interview::InterviewEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InterviewEngine>,
}

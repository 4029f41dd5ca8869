pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

/// Upper bound for a recorded answer upload.
const MAX_AUDIO_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interviews
        .route(
            "/api/v1/interviews",
            post(handlers::handle_create_interview).get(handlers::handle_list_interviews),
        )
        .route(
            "/api/v1/interviews/:id",
            get(handlers::handle_get_interview).delete(handlers::handle_delete_interview),
        )
        .route(
            "/api/v1/interviews/:id/start",
            post(handlers::handle_start_interview),
        )
        .route(
            "/api/v1/interviews/:id/pause",
            post(handlers::handle_pause_interview),
        )
        .route(
            "/api/v1/interviews/:id/resume",
            post(handlers::handle_resume_interview),
        )
        .route(
            "/api/v1/interviews/:id/abandon",
            post(handlers::handle_abandon_interview),
        )
        .route(
            "/api/v1/interviews/:id/evaluation",
            get(handlers::handle_get_evaluation),
        )
        // Rounds
        .route("/api/v1/rounds/:id/start", post(handlers::handle_start_round))
        .route("/api/v1/rounds/:id/retry", post(handlers::handle_retry_round))
        .route("/api/v1/rounds/:id/close", post(handlers::handle_close_round))
        .route(
            "/api/v1/rounds/:id/questions",
            post(handlers::handle_ask_question),
        )
        .route("/api/v1/rounds/:id/turns", get(handlers::handle_round_turns))
        .route(
            "/api/v1/rounds/:id/answers",
            post(handlers::handle_submit_answer),
        )
        .route(
            "/api/v1/rounds/:id/answers/audio",
            post(handlers::handle_submit_audio_answer)
                .layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES)),
        )
        .with_state(state)
}

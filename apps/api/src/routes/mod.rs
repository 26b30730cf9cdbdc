pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/personae", post(handlers::handle_generate_personae))
        .route(
            "/api/v1/objectives",
            post(handlers::handle_generate_objectives),
        )
        .route(
            "/api/v1/interview/turns",
            post(handlers::handle_interview_turn),
        )
        .route("/api/v1/grading", post(handlers::handle_grade))
        .with_state(state)
}

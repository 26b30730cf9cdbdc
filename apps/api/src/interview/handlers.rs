//! Axum route handlers for the interview API.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::interview::dialogue::InterviewTurnRequest;
use crate::interview::grading::{combine_answers, GradeRequest};
use crate::interview::models::{
    GradingResult, InterviewLogEntry, InterviewTurn, ObjectivesResult, PersonaGenerationResult,
};
use crate::interview::objectives::ObjectivesRequest;
use crate::interview::persona::PersonaRequest;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// Grading input as the UI holds it: one answer per objective title.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub objectives: ObjectivesResult,
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub interview_log: Vec<InterviewLogEntry>,
    #[serde(default)]
    pub weights: Option<String>,
    #[serde(default)]
    pub originality_rules: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/personae
///
/// Generates 1–3 persona cards (or a fallback proposal) with portraits.
pub async fn handle_generate_personae(
    State(state): State<AppState>,
    Json(request): Json<PersonaRequest>,
) -> Result<Json<PersonaGenerationResult>, AppError> {
    require_non_blank("topic", &request.topic)?;
    require_non_blank("subject", &request.subject)?;
    require_non_blank("grade_level", &request.grade_level)?;

    let result = state.orchestrator.generate_personae(&request).await?;
    Ok(Json(result))
}

/// POST /api/v1/objectives
pub async fn handle_generate_objectives(
    State(state): State<AppState>,
    Json(request): Json<ObjectivesRequest>,
) -> Result<Json<ObjectivesResult>, AppError> {
    require_non_blank("topic", &request.topic)?;
    require_non_blank("subject", &request.subject)?;
    require_non_blank("grade_level", &request.grade_level)?;

    let result = state.orchestrator.generate_objectives(&request).await?;
    Ok(Json(result))
}

/// POST /api/v1/interview/turns
///
/// One persona reply to the student's question. History is trimmed to the
/// most recent turns before it reaches the model.
pub async fn handle_interview_turn(
    State(state): State<AppState>,
    Json(request): Json<InterviewTurnRequest>,
) -> Result<Json<InterviewTurn>, AppError> {
    require_non_blank("student_question", &request.student_question)?;

    let turn = state.orchestrator.generate_interview_turn(&request).await?;
    Ok(Json(turn))
}

/// POST /api/v1/grading
///
/// Combines the per-objective answers and grades them against the rubric.
pub async fn handle_grade(
    State(state): State<AppState>,
    Json(request): Json<SubmitAnswersRequest>,
) -> Result<Json<GradingResult>, AppError> {
    if request.objectives.objectives.is_empty() {
        return Err(AppError::Validation(
            "objectives cannot be empty".to_string(),
        ));
    }

    let student_answer = combine_answers(&request.objectives, &request.answers)?;
    let grade_request = GradeRequest {
        objectives: request.objectives,
        student_answer,
        interview_log: request.interview_log,
        weights: request.weights,
        originality_rules: request.originality_rules,
    };

    let result = state.orchestrator.grade_answer(&grade_request).await?;
    Ok(Json(result))
}

fn require_non_blank(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

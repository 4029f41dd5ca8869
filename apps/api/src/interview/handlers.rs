//! Axum route handlers for the Interview API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::engine::{AnswerContent, AnswerInput, AnswerResult, RoundStart};
use crate::interview::state_machine::RoundOutcome;
use crate::models::evaluation::Evaluation;
use crate::models::interview::{Interview, InterviewDetail, NewInterview, Round};
use crate::models::turn::ConversationTurn;
use crate::speech::AnswerAudio;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListInterviewsQuery {
    pub owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_turn_id: Option<Uuid>,
    pub answer_text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Interviews
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interviews
pub async fn handle_create_interview(
    State(state): State<AppState>,
    Json(request): Json<NewInterview>,
) -> Result<(StatusCode, Json<InterviewDetail>), AppError> {
    let detail = state.engine.create_interview(request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/interviews?owner_id=
pub async fn handle_list_interviews(
    State(state): State<AppState>,
    Query(query): Query<ListInterviewsQuery>,
) -> Result<Json<Vec<Interview>>, AppError> {
    Ok(Json(state.engine.list_interviews(query.owner_id).await?))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<InterviewDetail>, AppError> {
    Ok(Json(state.engine.get_interview(interview_id).await?))
}

/// DELETE /api/v1/interviews/:id
///
/// Completed interviews are kept; deleting one is a 409.
pub async fn handle_delete_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_interview(interview_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/interviews/:id/start
pub async fn handle_start_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    Ok(Json(state.engine.start_interview(interview_id).await?))
}

/// POST /api/v1/interviews/:id/pause
pub async fn handle_pause_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    Ok(Json(state.engine.pause_interview(interview_id).await?))
}

/// POST /api/v1/interviews/:id/resume
pub async fn handle_resume_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    Ok(Json(state.engine.resume_interview(interview_id).await?))
}

/// POST /api/v1/interviews/:id/abandon
pub async fn handle_abandon_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<Interview>, AppError> {
    Ok(Json(state.engine.abandon_interview(interview_id).await?))
}

/// GET /api/v1/interviews/:id/evaluation
///
/// 404 until the interview is completed.
pub async fn handle_get_evaluation(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
) -> Result<Json<Evaluation>, AppError> {
    Ok(Json(state.engine.get_evaluation(interview_id).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Rounds
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/rounds/:id/start
///
/// Starts the round and returns the question to answer first.
pub async fn handle_start_round(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
) -> Result<Json<RoundStart>, AppError> {
    Ok(Json(state.engine.start_round(round_id).await?))
}

/// POST /api/v1/rounds/:id/retry
pub async fn handle_retry_round(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
) -> Result<Json<Round>, AppError> {
    Ok(Json(state.engine.retry_round(round_id).await?))
}

/// POST /api/v1/rounds/:id/close
pub async fn handle_close_round(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
) -> Result<Json<RoundOutcome>, AppError> {
    Ok(Json(state.engine.close_round(round_id).await?))
}

/// POST /api/v1/rounds/:id/questions
pub async fn handle_ask_question(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
) -> Result<Json<ConversationTurn>, AppError> {
    Ok(Json(state.engine.ask_next_question(round_id).await?))
}

/// GET /api/v1/rounds/:id/turns
pub async fn handle_round_turns(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
) -> Result<Json<Vec<ConversationTurn>>, AppError> {
    Ok(Json(state.engine.round_transcript(round_id).await?))
}

/// POST /api/v1/rounds/:id/answers
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<AnswerResult>, AppError> {
    let input = AnswerInput {
        question_turn_id: request.question_turn_id,
        content: AnswerContent::Text(request.answer_text),
    };
    Ok(Json(state.engine.submit_answer(round_id, input).await?))
}

/// POST /api/v1/rounds/:id/answers/audio
///
/// Multipart form: `audio` (the recording) and optional `question_turn_id`.
pub async fn handle_submit_audio_answer(
    State(state): State<AppState>,
    Path(round_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<AnswerResult>, AppError> {
    let mut audio: Option<AnswerAudio> = None;
    let mut question_turn_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or("answer").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("could not read audio: {e}")))?;
                audio = Some(AnswerAudio {
                    bytes,
                    file_name,
                    content_type,
                });
            }
            "question_turn_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("invalid question_turn_id: {e}")))?;
                let id = text
                    .trim()
                    .parse::<Uuid>()
                    .map_err(|e| AppError::Validation(format!("invalid question_turn_id: {e}")))?;
                question_turn_id = Some(id);
            }
            _ => {}
        }
    }

    let audio = audio
        .filter(|a| !a.bytes.is_empty())
        .ok_or_else(|| AppError::Validation("answer cannot be empty".to_string()))?;

    let input = AnswerInput {
        question_turn_id,
        content: AnswerContent::Audio(audio),
    };
    Ok(Json(state.engine.submit_answer(round_id, input).await?))
}

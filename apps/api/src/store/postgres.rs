use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::state_machine::{InterviewSnapshot, Transition};
use crate::models::evaluation::Evaluation;
use crate::models::interview::{Interview, Round};
use crate::models::turn::ConversationTurn;
use crate::store::InterviewStore;

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgInterviewStore {
    pool: PgPool,
}

impl PgInterviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl InterviewStore for PgInterviewStore {
    async fn insert_interview(
        &self,
        interview: &Interview,
        rounds: &[Round],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO interviews
                (id, owner_id, mode, company_name, job_description, topics, total_rounds,
                 current_round, status, overall_score, pass_fail_status, created_at,
                 started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(interview.id)
        .bind(interview.owner_id)
        .bind(interview.mode)
        .bind(&interview.company_name)
        .bind(&interview.job_description)
        .bind(&interview.topics)
        .bind(interview.total_rounds)
        .bind(interview.current_round)
        .bind(interview.status)
        .bind(interview.overall_score)
        .bind(interview.pass_fail_status)
        .bind(interview.created_at)
        .bind(interview.started_at)
        .bind(interview.completed_at)
        .execute(&mut *tx)
        .await?;

        for round in rounds {
            sqlx::query(
                r#"
                INSERT INTO rounds
                    (id, interview_id, round_number, round_type, difficulty, status,
                     pass_threshold, max_questions, attempt, score, pass_status,
                     feedback_summary, strengths, weaknesses, started_at, completed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(round.id)
            .bind(round.interview_id)
            .bind(round.round_number)
            .bind(round.round_type)
            .bind(round.difficulty)
            .bind(round.status)
            .bind(round.pass_threshold)
            .bind(round.max_questions)
            .bind(round.attempt)
            .bind(round.score)
            .bind(round.pass_status)
            .bind(&round.feedback_summary)
            .bind(&round.strengths)
            .bind(&round.weaknesses)
            .bind(round.started_at)
            .bind(round.completed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_snapshot(
        &self,
        interview_id: Uuid,
    ) -> Result<Option<InterviewSnapshot>, AppError> {
        let interview: Option<Interview> =
            sqlx::query_as("SELECT * FROM interviews WHERE id = $1")
                .bind(interview_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(interview) = interview else {
            return Ok(None);
        };

        let rounds: Vec<Round> = sqlx::query_as(
            "SELECT * FROM rounds WHERE interview_id = $1 ORDER BY round_number ASC",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(InterviewSnapshot { interview, rounds }))
    }

    async fn find_round(&self, round_id: Uuid) -> Result<Option<Round>, AppError> {
        Ok(sqlx::query_as::<_, Round>("SELECT * FROM rounds WHERE id = $1")
            .bind(round_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_interviews(&self, owner_id: Uuid) -> Result<Vec<Interview>, AppError> {
        Ok(sqlx::query_as::<_, Interview>(
            "SELECT * FROM interviews WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn apply(&self, transition: &Transition) -> Result<(), AppError> {
        let interview = &transition.interview;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE interviews
            SET current_round = $2, status = $3, overall_score = $4, pass_fail_status = $5,
                started_at = $6, completed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(interview.id)
        .bind(interview.current_round)
        .bind(interview.status)
        .bind(interview.overall_score)
        .bind(interview.pass_fail_status)
        .bind(interview.started_at)
        .bind(interview.completed_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Interview {} not found", interview.id)));
        }

        for round in &transition.rounds {
            let updated = sqlx::query(
                r#"
                UPDATE rounds
                SET status = $2, attempt = $3, score = $4, pass_status = $5,
                    feedback_summary = $6, strengths = $7, weaknesses = $8,
                    started_at = $9, completed_at = $10
                WHERE id = $1
                "#,
            )
            .bind(round.id)
            .bind(round.status)
            .bind(round.attempt)
            .bind(round.score)
            .bind(round.pass_status)
            .bind(&round.feedback_summary)
            .bind(&round.strengths)
            .bind(&round.weaknesses)
            .bind(round.started_at)
            .bind(round.completed_at)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("Round {} not found", round.id)));
            }
        }

        if let Some(evaluation) = &transition.evaluation {
            let inserted = sqlx::query(
                r#"
                INSERT INTO evaluations
                    (id, interview_id, technical_score, communication_score,
                     problem_solving_score, confidence_score, overall_score, passed,
                     strengths, weaknesses, recommendations, suggested_topics,
                     next_interview_date, source, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(evaluation.id)
            .bind(evaluation.interview_id)
            .bind(evaluation.technical_score)
            .bind(evaluation.communication_score)
            .bind(evaluation.problem_solving_score)
            .bind(evaluation.confidence_score)
            .bind(evaluation.overall_score)
            .bind(evaluation.passed)
            .bind(&evaluation.strengths)
            .bind(&evaluation.weaknesses)
            .bind(&evaluation.recommendations)
            .bind(&evaluation.suggested_topics)
            .bind(evaluation.next_interview_date)
            .bind(&evaluation.source)
            .bind(evaluation.created_at)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if is_unique_violation(&e) {
                    return Err(AppError::InvalidState(format!(
                        "interview {} already has an evaluation",
                        interview.id
                    )));
                }
                return Err(e.into());
            }
        }

        tx.commit().await?;
        debug!(
            "Applied transition for interview {} ({} rounds)",
            interview.id,
            transition.rounds.len()
        );
        Ok(())
    }

    async fn delete_interview(&self, interview_id: Uuid) -> Result<(), AppError> {
        // rounds, turns and evaluations cascade
        sqlx::query("DELETE FROM interviews WHERE id = $1")
            .bind(interview_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_turn(&self, turn: &ConversationTurn) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_turns
                (id, interview_id, round_id, attempt, sequence, speaker, message_text,
                 audio_reference, category, expected_answer_points, answer_score,
                 confidence_level, sentiment_score, feedback, strengths, improvements,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(turn.id)
        .bind(turn.interview_id)
        .bind(turn.round_id)
        .bind(turn.attempt)
        .bind(turn.sequence)
        .bind(turn.speaker)
        .bind(&turn.message_text)
        .bind(&turn.audio_reference)
        .bind(&turn.category)
        .bind(&turn.expected_answer_points)
        .bind(turn.answer_score)
        .bind(&turn.confidence_level)
        .bind(turn.sentiment_score)
        .bind(&turn.feedback)
        .bind(&turn.strengths)
        .bind(&turn.improvements)
        .bind(turn.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_turn(&self, turn: &ConversationTurn) -> Result<(), AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE conversation_turns
            SET audio_reference = $2, answer_score = $3, confidence_level = $4,
                sentiment_score = $5, feedback = $6, strengths = $7, improvements = $8
            WHERE id = $1
            "#,
        )
        .bind(turn.id)
        .bind(&turn.audio_reference)
        .bind(turn.answer_score)
        .bind(&turn.confidence_level)
        .bind(turn.sentiment_score)
        .bind(&turn.feedback)
        .bind(&turn.strengths)
        .bind(&turn.improvements)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Turn {} not found", turn.id)));
        }
        Ok(())
    }

    async fn round_turns(&self, round_id: Uuid) -> Result<Vec<ConversationTurn>, AppError> {
        Ok(sqlx::query_as::<_, ConversationTurn>(
            "SELECT * FROM conversation_turns WHERE round_id = $1 ORDER BY sequence ASC",
        )
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn interview_turns(
        &self,
        interview_id: Uuid,
    ) -> Result<Vec<ConversationTurn>, AppError> {
        Ok(sqlx::query_as::<_, ConversationTurn>(
            r#"
            SELECT t.*
            FROM conversation_turns t
            JOIN rounds r ON r.id = t.round_id
            WHERE t.interview_id = $1
            ORDER BY r.round_number ASC, t.sequence ASC
            "#,
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_evaluation(&self, interview_id: Uuid) -> Result<Option<Evaluation>, AppError> {
        Ok(
            sqlx::query_as::<_, Evaluation>("SELECT * FROM evaluations WHERE interview_id = $1")
                .bind(interview_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

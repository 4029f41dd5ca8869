//! Interview engine: the operations the HTTP layer exposes.
//!
//! Each operation loads a fresh snapshot, runs the pure state machine and
//! hands the resulting transition to the store. Operations on one interview
//! are serialized by a per-interview async lock, so turns are strictly
//! ordered and a round closes only after its last evaluation is stored.
//! Different interviews never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::errors::AppError;
use crate::interview::aggregator;
use crate::interview::backend::GenerationBackend;
use crate::interview::pipeline::{self, Provenance};
use crate::interview::state_machine::{self, InterviewSnapshot, RoundOutcome, Transition};
use crate::models::evaluation::Evaluation;
use crate::models::interview::{Interview, InterviewDetail, NewInterview, Round};
use crate::models::turn::ConversationTurn;
use crate::speech::{AnswerAudio, Synthesizer, Transcriber};
use crate::store::InterviewStore;

/// What the candidate submitted.
#[derive(Debug, Clone)]
pub enum AnswerContent {
    Text(String),
    Audio(AnswerAudio),
}

#[derive(Debug, Clone)]
pub struct AnswerInput {
    /// The question being answered; defaults to the one awaiting an answer.
    pub question_turn_id: Option<Uuid>,
    pub content: AnswerContent,
}

impl AnswerInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            question_turn_id: None,
            content: AnswerContent::Text(text.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundStart {
    pub round: Round,
    pub question: ConversationTurn,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: ConversationTurn,
    pub evaluation_source: Provenance,
    /// Set while the round continues.
    pub next_question: Option<ConversationTurn>,
    /// Set when this answer closed the round.
    pub round_outcome: Option<RoundOutcome>,
}

pub struct InterviewEngine {
    store: Arc<dyn InterviewStore>,
    backend: Arc<dyn GenerationBackend>,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    config: EngineConfig,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl InterviewEngine {
    pub fn new(
        store: Arc<dyn InterviewStore>,
        backend: Arc<dyn GenerationBackend>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            transcriber,
            synthesizer,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, interview_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().await;
            // A slot only the map references has no holder and no waiter.
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(locks.entry(interview_id).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn snapshot(&self, interview_id: Uuid) -> Result<InterviewSnapshot, AppError> {
        self.store
            .load_snapshot(interview_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Interview {interview_id} not found")))
    }

    async fn find_round(&self, round_id: Uuid) -> Result<Round, AppError> {
        self.store
            .find_round(round_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Round {round_id} not found")))
    }

    // ── Interviews ─────────────────────────────────────────────────────────

    pub async fn create_interview(&self, request: NewInterview) -> Result<InterviewDetail, AppError> {
        let (interview, rounds) =
            state_machine::build_interview(&request, &self.config, Utc::now())?;
        self.store.insert_interview(&interview, &rounds).await?;

        info!(
            "Created {} interview {} with {} rounds for owner {}",
            interview.mode.as_str(),
            interview.id,
            rounds.len(),
            interview.owner_id
        );
        Ok(InterviewDetail::new(interview, rounds))
    }

    pub async fn get_interview(&self, interview_id: Uuid) -> Result<InterviewDetail, AppError> {
        let snapshot = self.snapshot(interview_id).await?;
        Ok(InterviewDetail::new(snapshot.interview, snapshot.rounds))
    }

    pub async fn list_interviews(&self, owner_id: Uuid) -> Result<Vec<Interview>, AppError> {
        self.store.list_interviews(owner_id).await
    }

    async fn step_interview(
        &self,
        interview_id: Uuid,
        label: &str,
        step: impl FnOnce(&InterviewSnapshot) -> Result<Transition, AppError>,
    ) -> Result<Interview, AppError> {
        let _guard = self.lock(interview_id).await;
        let snapshot = self.snapshot(interview_id).await?;
        let transition = step(&snapshot)?;
        self.store.apply(&transition).await?;
        info!("Interview {interview_id} {label}");
        Ok(transition.interview)
    }

    pub async fn start_interview(&self, interview_id: Uuid) -> Result<Interview, AppError> {
        self.step_interview(interview_id, "started", |s| {
            state_machine::start_interview(s, Utc::now())
        })
        .await
    }

    pub async fn pause_interview(&self, interview_id: Uuid) -> Result<Interview, AppError> {
        self.step_interview(interview_id, "paused", state_machine::pause_interview)
            .await
    }

    pub async fn resume_interview(&self, interview_id: Uuid) -> Result<Interview, AppError> {
        self.step_interview(interview_id, "resumed", state_machine::resume_interview)
            .await
    }

    pub async fn abandon_interview(&self, interview_id: Uuid) -> Result<Interview, AppError> {
        self.step_interview(interview_id, "abandoned", state_machine::abandon_interview)
            .await
    }

    pub async fn delete_interview(&self, interview_id: Uuid) -> Result<(), AppError> {
        let _guard = self.lock(interview_id).await;
        let snapshot = self.snapshot(interview_id).await?;
        state_machine::ensure_deletable(&snapshot)?;
        self.store.delete_interview(interview_id).await?;
        info!("Deleted interview {interview_id}");
        Ok(())
    }

    pub async fn get_evaluation(&self, interview_id: Uuid) -> Result<Evaluation, AppError> {
        self.snapshot(interview_id).await?;
        self.store
            .get_evaluation(interview_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Interview {interview_id} has no evaluation yet"))
            })
    }

    // ── Rounds ─────────────────────────────────────────────────────────────

    /// Starts or re-enters a round and returns the question awaiting an answer,
    /// asking the first one if needed.
    pub async fn start_round(&self, round_id: Uuid) -> Result<RoundStart, AppError> {
        let interview_id = self.find_round(round_id).await?.interview_id;
        let _guard = self.lock(interview_id).await;

        let snapshot = self.snapshot(interview_id).await?;
        let transition = state_machine::start_round(&snapshot, round_id, Utc::now())?;
        self.store.apply(&transition).await?;

        let snapshot = snapshot.after(&transition);
        let round = snapshot.round(round_id)?;
        info!(
            "Round {} of interview {interview_id} in progress (attempt {})",
            round.round_number, round.attempt
        );

        let turns = self.store.round_turns(round_id).await?;
        let question = match pipeline::pending_question(round, &turns) {
            Some(pending) => pending.clone(),
            None if pipeline::should_continue(round, &turns) => {
                self.ask(&snapshot, round, &turns).await?
            }
            None => {
                return Err(AppError::InvalidState(format!(
                    "round {} has asked all of its questions and only needs closing",
                    round.round_number
                )));
            }
        };

        Ok(RoundStart {
            round: round.clone(),
            question,
        })
    }

    pub async fn retry_round(&self, round_id: Uuid) -> Result<Round, AppError> {
        let interview_id = self.find_round(round_id).await?.interview_id;
        let _guard = self.lock(interview_id).await;

        let snapshot = self.snapshot(interview_id).await?;
        let transition =
            state_machine::retry_round(&snapshot, round_id, self.config.failed_round_policy)?;
        self.store.apply(&transition).await?;

        let round = snapshot.after(&transition).round(round_id)?.clone();
        info!(
            "Round {} of interview {interview_id} reopened for attempt {}",
            round.round_number, round.attempt
        );
        Ok(round)
    }

    /// Returns the question awaiting an answer, or asks a new one.
    pub async fn ask_next_question(&self, round_id: Uuid) -> Result<ConversationTurn, AppError> {
        let interview_id = self.find_round(round_id).await?.interview_id;
        let _guard = self.lock(interview_id).await;

        let snapshot = self.snapshot(interview_id).await?;
        let round = state_machine::ensure_round_active(&snapshot, round_id)?;
        let turns = self.store.round_turns(round_id).await?;

        if let Some(pending) = pipeline::pending_question(round, &turns) {
            return Ok(pending.clone());
        }
        if !pipeline::should_continue(round, &turns) {
            return Err(AppError::InvalidState(format!(
                "round {} has already asked {} questions",
                round.round_number, round.max_questions
            )));
        }
        self.ask(&snapshot, round, &turns).await
    }

    /// Generates, voices and stores the next question. Caller holds the lock.
    async fn ask(
        &self,
        snapshot: &InterviewSnapshot,
        round: &Round,
        turns: &[ConversationTurn],
    ) -> Result<ConversationTurn, AppError> {
        let (generated, provenance) =
            pipeline::produce_question(self.backend.as_ref(), &snapshot.interview, round, turns)
                .await;

        let mut turn = ConversationTurn::question(
            snapshot.interview.id,
            round.id,
            round.attempt,
            pipeline::next_sequence(turns),
            generated.question.clone(),
            generated.category.clone(),
            generated.evaluation_points(),
            pipeline::next_timestamp(turns, Utc::now()),
        );

        turn.audio_reference = match self.synthesizer.synthesize(&turn.message_text).await {
            Ok(reference) => reference,
            Err(e) => {
                warn!("Question audio unavailable for round {}: {e}", round.id);
                None
            }
        };

        self.store.insert_turn(&turn).await?;
        debug!(
            "Asked question {} (seq {}, {:?}) in round {}",
            turn.id, turn.sequence, provenance, round.id
        );
        Ok(turn)
    }

    /// Records and scores an answer, then either asks the next question or
    /// closes the round.
    pub async fn submit_answer(
        &self,
        round_id: Uuid,
        input: AnswerInput,
    ) -> Result<AnswerResult, AppError> {
        let interview_id = self.find_round(round_id).await?.interview_id;
        let _guard = self.lock(interview_id).await;

        let snapshot = self.snapshot(interview_id).await?;
        let round = state_machine::ensure_round_active(&snapshot, round_id)?;
        let mut turns = self.store.round_turns(round_id).await?;

        let question = pipeline::pending_question(round, &turns)
            .cloned()
            .ok_or_else(|| AppError::InvalidState("no question is awaiting an answer".to_string()))?;
        if let Some(requested) = input.question_turn_id {
            if requested != question.id {
                return Err(AppError::InvalidState(format!(
                    "question {requested} is not the one awaiting an answer"
                )));
            }
        }

        let (text, audio_reference) = match input.content {
            AnswerContent::Text(text) => (pipeline::resolve_answer_text(&text)?, None),
            AnswerContent::Audio(audio) => {
                let transcription = self.transcriber.transcribe(&audio).await?;
                (
                    pipeline::resolve_answer_text(&transcription.text)?,
                    transcription.audio_reference,
                )
            }
        };

        let mut answer = ConversationTurn::answer(
            interview_id,
            round.id,
            round.attempt,
            pipeline::next_sequence(&turns),
            text,
            pipeline::next_timestamp(&turns, Utc::now()),
        );
        answer.audio_reference = audio_reference;
        self.store.insert_turn(&answer).await?;

        let (evaluation, evaluation_source) =
            pipeline::evaluate_answer(self.backend.as_ref(), round, &question, &answer.message_text)
                .await;
        pipeline::record_evaluation(&mut answer, &evaluation);
        self.store.update_turn(&answer).await?;
        turns.push(answer.clone());

        if pipeline::should_continue(round, &turns) {
            let next = self.ask(&snapshot, round, &turns).await?;
            return Ok(AnswerResult {
                answer,
                evaluation_source,
                next_question: Some(next),
                round_outcome: None,
            });
        }

        let outcome = self.close(&snapshot, round_id, &turns).await?;
        Ok(AnswerResult {
            answer,
            evaluation_source,
            next_question: None,
            round_outcome: Some(outcome),
        })
    }

    /// Closes the round on what has been answered so far. Refused while a
    /// question still awaits its answer.
    pub async fn close_round(&self, round_id: Uuid) -> Result<RoundOutcome, AppError> {
        let interview_id = self.find_round(round_id).await?.interview_id;
        let _guard = self.lock(interview_id).await;

        let snapshot = self.snapshot(interview_id).await?;
        let round = snapshot.round(round_id)?;
        let turns = self.store.round_turns(round_id).await?;
        if let Some(pending) = pipeline::pending_question(round, &turns) {
            return Err(AppError::InvalidState(format!(
                "round {} has an unanswered question ({})",
                round.round_number, pending.id
            )));
        }
        self.close(&snapshot, round_id, &turns).await
    }

    /// Caller holds the lock. Completing the last round runs the aggregator
    /// and stores the evaluation in the same update as the round close.
    async fn close(
        &self,
        snapshot: &InterviewSnapshot,
        round_id: Uuid,
        turns: &[ConversationTurn],
    ) -> Result<RoundOutcome, AppError> {
        let now = Utc::now();
        let closure = state_machine::close_round(
            snapshot,
            round_id,
            turns,
            self.config.failed_round_policy,
            now,
        )?;

        let transition = if closure.completes_interview {
            let closed = snapshot.after(&closure.transition);
            let all_turns = self.store.interview_turns(snapshot.interview.id).await?;
            let evaluation = aggregator::final_evaluation(
                self.backend.as_ref(),
                &closed,
                &all_turns,
                &self.config,
                now,
            )
            .await;
            state_machine::complete_interview(closure.transition, evaluation, now)
        } else {
            closure.transition
        };

        self.store.apply(&transition).await?;

        let outcome = closure.outcome;
        info!(
            "Round {} of interview {} closed: score {:.1}, passed {}, interview {:?}",
            outcome.round_number,
            snapshot.interview.id,
            outcome.score,
            outcome.passed,
            outcome.interview_status
        );
        Ok(outcome)
    }

    /// Every turn of the round across attempts, in order.
    pub async fn round_transcript(&self, round_id: Uuid) -> Result<Vec<ConversationTurn>, AppError> {
        self.find_round(round_id).await?;
        self.store.round_turns(round_id).await
    }
}

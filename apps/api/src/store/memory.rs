use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::state_machine::{InterviewSnapshot, Transition};
use crate::models::evaluation::Evaluation;
use crate::models::interview::{Interview, Round};
use crate::models::turn::ConversationTurn;
use crate::store::InterviewStore;

#[derive(Default)]
struct Tables {
    interviews: HashMap<Uuid, Interview>,
    rounds: HashMap<Uuid, Round>,
    turns: HashMap<Uuid, ConversationTurn>,
    evaluations: HashMap<Uuid, Evaluation>,
}

/// In-process store. A single lock over all tables makes `apply` atomic.
#[derive(Default)]
pub struct MemoryInterviewStore {
    tables: RwLock<Tables>,
}

impl MemoryInterviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InterviewStore for MemoryInterviewStore {
    async fn insert_interview(
        &self,
        interview: &Interview,
        rounds: &[Round],
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.interviews.insert(interview.id, interview.clone());
        for round in rounds {
            tables.rounds.insert(round.id, round.clone());
        }
        Ok(())
    }

    async fn load_snapshot(
        &self,
        interview_id: Uuid,
    ) -> Result<Option<InterviewSnapshot>, AppError> {
        let tables = self.tables.read().await;
        let Some(interview) = tables.interviews.get(&interview_id) else {
            return Ok(None);
        };
        let mut rounds: Vec<Round> = tables
            .rounds
            .values()
            .filter(|r| r.interview_id == interview_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|r| r.round_number);
        Ok(Some(InterviewSnapshot {
            interview: interview.clone(),
            rounds,
        }))
    }

    async fn find_round(&self, round_id: Uuid) -> Result<Option<Round>, AppError> {
        Ok(self.tables.read().await.rounds.get(&round_id).cloned())
    }

    async fn list_interviews(&self, owner_id: Uuid) -> Result<Vec<Interview>, AppError> {
        let tables = self.tables.read().await;
        let mut interviews: Vec<Interview> = tables
            .interviews
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        interviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(interviews)
    }

    async fn apply(&self, transition: &Transition) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let interview_id = transition.interview.id;

        // Validate everything before touching any table.
        if !tables.interviews.contains_key(&interview_id) {
            return Err(AppError::NotFound(format!("Interview {interview_id} not found")));
        }
        if let Some(missing) = transition
            .rounds
            .iter()
            .find(|r| !tables.rounds.contains_key(&r.id))
        {
            return Err(AppError::NotFound(format!("Round {} not found", missing.id)));
        }
        if transition.evaluation.is_some() && tables.evaluations.contains_key(&interview_id) {
            return Err(AppError::InvalidState(format!(
                "interview {interview_id} already has an evaluation"
            )));
        }

        tables
            .interviews
            .insert(interview_id, transition.interview.clone());
        for round in &transition.rounds {
            tables.rounds.insert(round.id, round.clone());
        }
        if let Some(evaluation) = &transition.evaluation {
            tables.evaluations.insert(interview_id, evaluation.clone());
        }
        Ok(())
    }

    async fn delete_interview(&self, interview_id: Uuid) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.interviews.remove(&interview_id);
        tables.rounds.retain(|_, r| r.interview_id != interview_id);
        tables.turns.retain(|_, t| t.interview_id != interview_id);
        tables.evaluations.remove(&interview_id);
        Ok(())
    }

    async fn insert_turn(&self, turn: &ConversationTurn) -> Result<(), AppError> {
        self.tables.write().await.turns.insert(turn.id, turn.clone());
        Ok(())
    }

    async fn update_turn(&self, turn: &ConversationTurn) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.turns.get_mut(&turn.id) {
            Some(existing) => {
                *existing = turn.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Turn {} not found", turn.id))),
        }
    }

    async fn round_turns(&self, round_id: Uuid) -> Result<Vec<ConversationTurn>, AppError> {
        let tables = self.tables.read().await;
        let mut turns: Vec<ConversationTurn> = tables
            .turns
            .values()
            .filter(|t| t.round_id == round_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.sequence);
        Ok(turns)
    }

    async fn interview_turns(
        &self,
        interview_id: Uuid,
    ) -> Result<Vec<ConversationTurn>, AppError> {
        let tables = self.tables.read().await;
        let round_number = |round_id: &Uuid| {
            tables
                .rounds
                .get(round_id)
                .map(|r| r.round_number)
                .unwrap_or(i32::MAX)
        };
        let mut turns: Vec<ConversationTurn> = tables
            .turns
            .values()
            .filter(|t| t.interview_id == interview_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| (round_number(&t.round_id), t.sequence));
        Ok(turns)
    }

    async fn get_evaluation(&self, interview_id: Uuid) -> Result<Option<Evaluation>, AppError> {
        Ok(self.tables.read().await.evaluations.get(&interview_id).cloned())
    }
}

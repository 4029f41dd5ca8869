//! Durable store for interviews, rounds, conversation turns and evaluations.
//!
//! The engine holds an `Arc<dyn InterviewStore>`. `PgInterviewStore` is the
//! production backend; `MemoryInterviewStore` backs tests and local runs.
//! `apply` is the only way status changes reach the store, and it is atomic.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::state_machine::{InterviewSnapshot, Transition};
use crate::models::evaluation::Evaluation;
use crate::models::interview::{Interview, Round};
use crate::models::turn::ConversationTurn;

pub mod memory;
pub mod postgres;

pub use memory::MemoryInterviewStore;
pub use postgres::PgInterviewStore;

#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn insert_interview(&self, interview: &Interview, rounds: &[Round])
        -> Result<(), AppError>;

    /// The interview with its rounds ordered by round number.
    async fn load_snapshot(&self, interview_id: Uuid)
        -> Result<Option<InterviewSnapshot>, AppError>;

    async fn find_round(&self, round_id: Uuid) -> Result<Option<Round>, AppError>;

    /// Newest first.
    async fn list_interviews(&self, owner_id: Uuid) -> Result<Vec<Interview>, AppError>;

    /// Writes the transition's interview, rounds and evaluation as one unit.
    /// Fails if the transition carries an evaluation and one already exists.
    async fn apply(&self, transition: &Transition) -> Result<(), AppError>;

    /// Removes the interview with all of its rounds and turns.
    async fn delete_interview(&self, interview_id: Uuid) -> Result<(), AppError>;

    async fn insert_turn(&self, turn: &ConversationTurn) -> Result<(), AppError>;

    /// Overwrites the mutable fields of an existing turn.
    async fn update_turn(&self, turn: &ConversationTurn) -> Result<(), AppError>;

    /// Every turn of the round across attempts, ordered by sequence.
    async fn round_turns(&self, round_id: Uuid) -> Result<Vec<ConversationTurn>, AppError>;

    /// Every turn of the interview, ordered by round number then sequence.
    async fn interview_turns(&self, interview_id: Uuid)
        -> Result<Vec<ConversationTurn>, AppError>;

    async fn get_evaluation(&self, interview_id: Uuid) -> Result<Option<Evaluation>, AppError>;
}

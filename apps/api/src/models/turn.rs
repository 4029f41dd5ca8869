use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "speaker", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    System,
    Candidate,
}

/// One system question or one candidate answer within a round.
///
/// System turns carry `category` and `expected_answer_points`; candidate turns
/// carry the evaluation fields once scored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub round_id: Uuid,
    pub attempt: i32,
    /// Position within the round across all attempts, starting at 1.
    pub sequence: i32,
    pub speaker: Speaker,
    pub message_text: String,
    pub audio_reference: Option<String>,
    pub category: Option<String>,
    pub expected_answer_points: Vec<String>,
    pub answer_score: Option<f64>,
    pub confidence_level: Option<String>,
    pub sentiment_score: Option<f64>,
    pub feedback: Option<String>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    fn blank(
        interview_id: Uuid,
        round_id: Uuid,
        attempt: i32,
        sequence: i32,
        speaker: Speaker,
        message_text: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            interview_id,
            round_id,
            attempt,
            sequence,
            speaker,
            message_text,
            audio_reference: None,
            category: None,
            expected_answer_points: vec![],
            answer_score: None,
            confidence_level: None,
            sentiment_score: None,
            feedback: None,
            strengths: vec![],
            improvements: vec![],
            created_at,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn question(
        interview_id: Uuid,
        round_id: Uuid,
        attempt: i32,
        sequence: i32,
        text: String,
        category: String,
        expected_answer_points: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            category: Some(category),
            expected_answer_points,
            ..Self::blank(
                interview_id,
                round_id,
                attempt,
                sequence,
                Speaker::System,
                text,
                created_at,
            )
        }
    }

    pub fn answer(
        interview_id: Uuid,
        round_id: Uuid,
        attempt: i32,
        sequence: i32,
        text: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::blank(
            interview_id,
            round_id,
            attempt,
            sequence,
            Speaker::Candidate,
            text,
            created_at,
        )
    }

    pub fn is_question(&self) -> bool {
        self.speaker == Speaker::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_and_answer_constructors_set_speaker() {
        let (interview_id, round_id) = (Uuid::new_v4(), Uuid::new_v4());
        let q = ConversationTurn::question(
            interview_id,
            round_id,
            1,
            1,
            "Explain ownership".to_string(),
            "technical".to_string(),
            vec!["moves".to_string()],
            Utc::now(),
        );
        let a = ConversationTurn::answer(
            interview_id,
            round_id,
            1,
            2,
            "Each value has one owner".to_string(),
            Utc::now(),
        );

        assert!(q.is_question());
        assert_eq!(q.category.as_deref(), Some("technical"));
        assert!(!a.is_question());
        assert!(a.answer_score.is_none());
        assert!(a.expected_answer_points.is_empty());
    }
}

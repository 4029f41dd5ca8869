//! Question/Answer Pipeline.
//!
//! Produces the next question of a round and evaluates submitted answers.
//! Neither step can fail because of the generation backend: a failed,
//! empty or repeated question is replaced by the fallback synthesizer, and a
//! failed evaluation is replaced by a neutral one.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::backend::{
    AnswerEvaluation, AnswerRequest, GeneratedQuestion, GenerationBackend, HistoryEntry,
    QuestionRequest,
};
use crate::interview::fallback::{normalize_question, synthesize_question};
use crate::interview::state_machine::current_attempt;
use crate::models::interview::{Interview, Round};
use crate::models::turn::{ConversationTurn, Speaker};

/// Score given to an answer the backend could not evaluate.
pub const NEUTRAL_SCORE: f64 = 50.0;

const NEUTRAL_FEEDBACK: &str = "Your answer was recorded, but detailed feedback is not \
    available for it right now.";

/// Where a question or evaluation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Backend,
    Fallback,
}

/// Every question text asked in the round, across all attempts.
pub fn asked_questions(round_id: Uuid, turns: &[ConversationTurn]) -> Vec<String> {
    turns
        .iter()
        .filter(|t| t.round_id == round_id && t.is_question())
        .map(|t| t.message_text.clone())
        .collect()
}

/// Number of questions asked in the round's current attempt.
pub fn questions_in_attempt(round: &Round, turns: &[ConversationTurn]) -> usize {
    current_attempt(round, turns)
        .filter(|t| t.is_question())
        .count()
}

/// Count-based continuation: another question follows while the current
/// attempt is below the round's cap.
pub fn should_continue(round: &Round, turns: &[ConversationTurn]) -> bool {
    questions_in_attempt(round, turns) < round.max_questions.max(0) as usize
}

/// The latest question of the current attempt if no answer follows it yet.
pub fn pending_question<'t>(round: &Round, turns: &'t [ConversationTurn]) -> Option<&'t ConversationTurn> {
    current_attempt(round, turns)
        .last()
        .filter(|t| t.is_question())
}

/// Next sequence number within the round, shared by all attempts.
pub fn next_sequence(turns: &[ConversationTurn]) -> i32 {
    turns.iter().map(|t| t.sequence).max().unwrap_or(0) + 1
}

/// A creation time strictly after every existing turn of the round.
pub fn next_timestamp(turns: &[ConversationTurn], now: DateTime<Utc>) -> DateTime<Utc> {
    match turns.iter().map(|t| t.created_at).max() {
        Some(last) if last >= now => last + Duration::microseconds(1),
        _ => now,
    }
}

pub fn question_request(
    interview: &Interview,
    round: &Round,
    turns: &[ConversationTurn],
) -> QuestionRequest {
    QuestionRequest {
        mode: interview.mode,
        context_name: interview.context_name(),
        context_text: interview.context_text(),
        round_type: round.round_type,
        difficulty: round.difficulty,
        history: current_attempt(round, turns)
            .map(|t| HistoryEntry {
                speaker: t.speaker,
                text: t.message_text.clone(),
            })
            .collect(),
    }
}

/// Asks the backend for the next question, falling back to the synthesizer
/// on failure, on an empty question, or on a repeat of an earlier question.
pub async fn produce_question(
    backend: &dyn GenerationBackend,
    interview: &Interview,
    round: &Round,
    turns: &[ConversationTurn],
) -> (GeneratedQuestion, Provenance) {
    let asked = asked_questions(round.id, turns);
    let forbidden: HashSet<String> = asked.iter().map(|q| normalize_question(q)).collect();

    let request = question_request(interview, round, turns);
    let rejection = match backend.generate_question(&request).await {
        Ok(mut generated) => {
            generated.question = generated.question.trim().to_string();
            if generated.question.is_empty() {
                "backend returned an empty question".to_string()
            } else if forbidden.contains(&normalize_question(&generated.question)) {
                "backend repeated an earlier question".to_string()
            } else {
                return (generated, Provenance::Backend);
            }
        }
        Err(e) => e.to_string(),
    };

    warn!(
        "Round {} of interview {}: using fallback question ({rejection})",
        round.round_number, interview.id
    );
    let fallback = synthesize_question(
        round.round_type,
        &interview.context_text(),
        &interview.topics,
        &asked,
    );
    (fallback, Provenance::Fallback)
}

/// Trims a submitted answer and rejects it when nothing is left.
pub fn resolve_answer_text(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("answer cannot be empty".to_string()));
    }
    Ok(text.to_string())
}

pub fn neutral_evaluation() -> AnswerEvaluation {
    AnswerEvaluation {
        score: NEUTRAL_SCORE,
        content_score: NEUTRAL_SCORE,
        clarity_score: NEUTRAL_SCORE,
        depth_score: NEUTRAL_SCORE,
        strengths: vec![],
        improvements: vec![],
        feedback: NEUTRAL_FEEDBACK.to_string(),
        pass: false,
        confidence_level: "unknown".to_string(),
    }
}

/// Scores one answer against its question. Never fails.
pub async fn evaluate_answer(
    backend: &dyn GenerationBackend,
    round: &Round,
    question: &ConversationTurn,
    answer: &str,
) -> (AnswerEvaluation, Provenance) {
    let request = AnswerRequest {
        question: question.message_text.clone(),
        answer: answer.to_string(),
        expected_points: question.expected_answer_points.clone(),
        round_type: round.round_type,
    };

    match backend.evaluate_answer(&request).await {
        Ok(evaluation) => (evaluation, Provenance::Backend),
        Err(e) => {
            warn!(
                "Round {}: answer to turn {} scored neutrally ({e})",
                round.round_number, question.id
            );
            (neutral_evaluation(), Provenance::Fallback)
        }
    }
}

/// Copies an evaluation onto the candidate turn it scores.
pub fn record_evaluation(turn: &mut ConversationTurn, evaluation: &AnswerEvaluation) {
    debug_assert_eq!(turn.speaker, Speaker::Candidate);
    turn.answer_score = Some(evaluation.score);
    turn.confidence_level = Some(evaluation.confidence_level.clone());
    turn.feedback = Some(evaluation.feedback.clone());
    turn.strengths = evaluation.strengths.clone();
    turn.improvements = evaluation.improvements.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::interview::backend::MockGenerationBackend;
    use crate::interview::fallback::GENERIC_QUESTION;
    use crate::interview::state_machine::build_interview;
    use crate::llm_client::LlmError;
    use crate::models::interview::{Difficulty, InterviewMode, NewInterview, RoundConfig, RoundType};

    fn fixture() -> (Interview, Round) {
        let request = NewInterview {
            owner_id: Uuid::new_v4(),
            mode: InterviewMode::CustomTopic,
            company_name: None,
            job_description: None,
            topics: vec!["graphs".to_string(), "caching".to_string()],
            rounds: vec![RoundConfig {
                round_type: RoundType::Technical,
                difficulty: Difficulty::Hard,
                pass_threshold: None,
                question_count: Some(2),
            }],
        };
        let (interview, mut rounds) =
            build_interview(&request, &EngineConfig::default(), Utc::now()).unwrap();
        (interview, rounds.remove(0))
    }

    fn question_turn(round: &Round, sequence: i32, text: &str) -> ConversationTurn {
        ConversationTurn::question(
            round.interview_id,
            round.id,
            round.attempt,
            sequence,
            text.to_string(),
            "technical".to_string(),
            vec![],
            Utc::now(),
        )
    }

    fn generated(text: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            question: text.to_string(),
            category: "algorithms".to_string(),
            what_to_look_for: vec!["complexity".to_string()],
            sample_answer_points: vec![],
        }
    }

    #[tokio::test]
    async fn test_backend_question_is_used_when_fresh() {
        let (interview, round) = fixture();
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate_question()
            .withf(|req| req.difficulty == Difficulty::Hard && req.context_text == "graphs, caching")
            .returning(|_| Ok(generated("  How would you detect a cycle in a graph?  ")));

        let (question, provenance) = produce_question(&backend, &interview, &round, &[]).await;
        assert_eq!(provenance, Provenance::Backend);
        assert_eq!(question.question, "How would you detect a cycle in a graph?");
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back() {
        let (interview, round) = fixture();
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate_question()
            .returning(|_| Err(LlmError::EmptyContent));

        let (question, provenance) = produce_question(&backend, &interview, &round, &[]).await;
        assert_eq!(provenance, Provenance::Fallback);
        // equal counts, so the alphabetically first topic leads
        assert!(question.question.contains("caching"));
        assert_eq!(question.category, "technical");
    }

    #[tokio::test]
    async fn test_repeated_question_is_replaced() {
        let (interview, round) = fixture();
        let turns = vec![question_turn(&round, 1, "What is a B-tree?")];
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate_question()
            .returning(|_| Ok(generated("what is a  b-tree?")));

        let (question, provenance) = produce_question(&backend, &interview, &round, &turns).await;
        assert_eq!(provenance, Provenance::Fallback);
        assert_ne!(normalize_question(&question.question), "what is a b-tree?");
    }

    #[tokio::test]
    async fn test_questions_from_earlier_attempts_stay_forbidden() {
        let (interview, mut round) = fixture();
        let earlier = question_turn(&round, 1, "Explain consistent hashing.");
        round.attempt = 2;
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate_question()
            .withf(|req| req.history.is_empty())
            .returning(|_| Ok(generated("Explain consistent hashing.")));

        let (_, provenance) = produce_question(&backend, &interview, &round, &[earlier]).await;
        assert_eq!(provenance, Provenance::Fallback);
    }

    #[tokio::test]
    async fn test_blank_backend_question_falls_back_to_generic_when_pool_exhausted() {
        let (interview, round) = fixture();
        let mut turns = Vec::new();
        for i in 0..10 {
            let (q, _) = {
                let mut failing = MockGenerationBackend::new();
                failing
                    .expect_generate_question()
                    .returning(|_| Ok(generated("   ")));
                produce_question(&failing, &interview, &round, &turns).await
            };
            turns.push(question_turn(&round, i + 1, &q.question));
        }
        assert_eq!(turns.last().unwrap().message_text, GENERIC_QUESTION);
    }

    #[tokio::test]
    async fn test_evaluation_failure_is_neutral() {
        let (_, round) = fixture();
        let question = question_turn(&round, 1, "What is a heap?");
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_evaluate_answer()
            .returning(|_| Err(LlmError::Schema("score must be within 0-100".to_string())));

        let (evaluation, provenance) =
            evaluate_answer(&backend, &round, &question, "A priority queue").await;
        assert_eq!(provenance, Provenance::Fallback);
        assert_eq!(evaluation.score, NEUTRAL_SCORE);
        assert!(!evaluation.pass);
        assert!(!evaluation.feedback.is_empty());
    }

    #[test]
    fn test_blank_answers_are_rejected() {
        assert!(matches!(resolve_answer_text(" \n\t "), Err(AppError::Validation(_))));
        assert_eq!(resolve_answer_text("  yes  ").unwrap(), "yes");
    }

    #[test]
    fn test_continuation_counts_current_attempt_questions() {
        let (_, mut round) = fixture();
        let mut turns = vec![question_turn(&round, 1, "q1")];
        assert!(should_continue(&round, &turns));
        turns.push(question_turn(&round, 3, "q2"));
        assert!(!should_continue(&round, &turns));

        round.attempt = 2;
        assert!(should_continue(&round, &turns));
        assert_eq!(questions_in_attempt(&round, &turns), 0);
    }

    #[test]
    fn test_pending_question_and_ordering_helpers() {
        let (_, round) = fixture();
        let q = question_turn(&round, 1, "q1");
        let now = q.created_at;
        let turns = vec![q.clone()];
        assert_eq!(pending_question(&round, &turns).map(|t| t.id), Some(q.id));
        assert_eq!(next_sequence(&turns), 2);
        assert!(next_timestamp(&turns, now) > now);

        let answer = ConversationTurn::answer(
            round.interview_id,
            round.id,
            round.attempt,
            2,
            "a1".to_string(),
            now,
        );
        let turns = vec![q, answer];
        assert!(pending_question(&round, &turns).is_none());
        assert_eq!(next_sequence(&[]), 1);
    }

    #[test]
    fn test_record_evaluation_copies_fields() {
        let (_, round) = fixture();
        let mut turn = ConversationTurn::answer(
            round.interview_id,
            round.id,
            1,
            2,
            "answer".to_string(),
            Utc::now(),
        );
        let mut evaluation = neutral_evaluation();
        evaluation.score = 82.0;
        evaluation.strengths = vec!["concise".to_string()];
        record_evaluation(&mut turn, &evaluation);
        assert_eq!(turn.answer_score, Some(82.0));
        assert_eq!(turn.strengths, vec!["concise"]);
        assert_eq!(turn.confidence_level.as_deref(), Some("unknown"));
    }
}

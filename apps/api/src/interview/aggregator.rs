//! Final Evaluation Aggregator.
//!
//! Runs once, when the last round passes. The backend writes the report from
//! a condensed transcript; if it fails, a baseline report built from the
//! round scores is stored instead. Either way exactly one evaluation exists
//! for a completed interview.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::interview::backend::{
    FinalEvaluationReport, FinalEvaluationRequest, GenerationBackend, RoundScore, TranscriptEntry,
};
use crate::interview::fallback::focus_keywords;
use crate::interview::state_machine::{current_attempt, InterviewSnapshot};
use crate::models::evaluation::Evaluation;
use crate::models::interview::RoundStatus;
use crate::models::turn::{ConversationTurn, Speaker};

/// Answers longer than this are cut in the transcript sent to the backend.
const MAX_TRANSCRIPT_ANSWER_CHARS: usize = 500;

const BASELINE_RECOMMENDATION: &str =
    "Review the feedback on each round and revisit the answers that scored lowest.";

/// Scores of every closed round, in round order.
pub fn round_scores(snapshot: &InterviewSnapshot) -> Vec<RoundScore> {
    snapshot
        .rounds
        .iter()
        .filter(|round| round.is_closed())
        .filter_map(|round| {
            round.score.map(|score| RoundScore {
                round_number: round.round_number,
                round_type: round.round_type,
                score,
            })
        })
        .collect()
}

/// Mean of the round scores, 0 with none.
pub fn baseline_score(scores: &[RoundScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
}

/// Question/answer pairs of each round's final attempt, answers truncated.
pub fn condensed_transcript(
    snapshot: &InterviewSnapshot,
    turns: &[ConversationTurn],
) -> Vec<TranscriptEntry> {
    let mut transcript = Vec::new();
    for round in &snapshot.rounds {
        let mut question: Option<&ConversationTurn> = None;
        for turn in current_attempt(round, turns) {
            match turn.speaker {
                Speaker::System => question = Some(turn),
                Speaker::Candidate => {
                    if let Some(q) = question.take() {
                        transcript.push(TranscriptEntry {
                            round_number: round.round_number,
                            question: q.message_text.clone(),
                            answer: truncate_chars(&turn.message_text, MAX_TRANSCRIPT_ANSWER_CHARS),
                        });
                    }
                }
            }
        }
    }
    transcript
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Builds the interview's evaluation. Never fails.
pub async fn final_evaluation(
    backend: &dyn GenerationBackend,
    snapshot: &InterviewSnapshot,
    turns: &[ConversationTurn],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Evaluation {
    let interview = &snapshot.interview;
    let scores = round_scores(snapshot);
    let baseline = baseline_score(&scores);

    let request = FinalEvaluationRequest {
        mode: interview.mode,
        context_name: interview.context_name(),
        round_scores: scores,
        transcript: condensed_transcript(snapshot, turns),
    };

    let (report, source) = match backend.generate_final_evaluation(&request).await {
        Ok(report) => (report, "llm"),
        Err(e) => {
            warn!(
                "Interview {}: final evaluation from baseline {baseline:.1} ({e})",
                interview.id
            );
            let all_passed = snapshot
                .rounds
                .iter()
                .all(|r| r.status == RoundStatus::Passed);
            (baseline_report(baseline, all_passed), "baseline")
        }
    };

    info!(
        "Interview {} evaluated: overall {:.1}, passed {} ({source})",
        interview.id, report.overall_score, report.pass
    );

    Evaluation {
        id: Uuid::new_v4(),
        interview_id: interview.id,
        technical_score: report.technical_score,
        communication_score: report.communication_score,
        problem_solving_score: report.problem_solving_score,
        confidence_score: report.confidence_score,
        overall_score: report.overall_score,
        passed: report.pass,
        strengths: report.strengths,
        weaknesses: report.weaknesses,
        recommendations: report.recommendations,
        suggested_topics: focus_keywords(&interview.context_text(), &interview.topics),
        next_interview_date: now + Duration::days(config.next_interview_offset_days),
        source: source.to_string(),
        created_at: now,
    }
}

fn baseline_report(baseline: f64, passed: bool) -> FinalEvaluationReport {
    FinalEvaluationReport {
        overall_score: baseline,
        technical_score: baseline,
        communication_score: baseline,
        problem_solving_score: baseline,
        confidence_score: baseline,
        strengths: vec![],
        weaknesses: vec![],
        recommendations: vec![BASELINE_RECOMMENDATION.to_string()],
        pass: passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::backend::MockGenerationBackend;
    use crate::interview::state_machine::build_interview;
    use crate::llm_client::LlmError;
    use crate::models::interview::{
        Difficulty, InterviewMode, NewInterview, RoundConfig, RoundType,
    };

    fn completed_snapshot(scores: &[f64]) -> InterviewSnapshot {
        let request = NewInterview {
            owner_id: Uuid::new_v4(),
            mode: InterviewMode::CompanySpecific,
            company_name: Some("Acme".to_string()),
            job_description: Some("Rust services on Kubernetes. Rust and Postgres.".to_string()),
            topics: vec![],
            rounds: scores
                .iter()
                .map(|_| RoundConfig {
                    round_type: RoundType::Technical,
                    difficulty: Difficulty::Medium,
                    pass_threshold: None,
                    question_count: None,
                })
                .collect(),
        };
        let (interview, mut rounds) =
            build_interview(&request, &EngineConfig::default(), Utc::now()).unwrap();
        for (round, score) in rounds.iter_mut().zip(scores) {
            round.score = Some(*score);
            round.status = RoundStatus::Passed;
        }
        InterviewSnapshot { interview, rounds }
    }

    fn pair(snapshot: &InterviewSnapshot, answer: &str) -> Vec<ConversationTurn> {
        let round = &snapshot.rounds[0];
        vec![
            ConversationTurn::question(
                round.interview_id,
                round.id,
                1,
                1,
                "Why Postgres?".to_string(),
                "databases".to_string(),
                vec![],
                Utc::now(),
            ),
            ConversationTurn::answer(round.interview_id, round.id, 1, 2, answer.to_string(), Utc::now()),
        ]
    }

    #[test]
    fn test_baseline_is_mean_of_round_scores() {
        let snapshot = completed_snapshot(&[80.0, 90.0, 70.0]);
        assert!((baseline_score(&round_scores(&snapshot)) - 80.0).abs() < 1e-9);
        assert_eq!(baseline_score(&[]), 0.0);
    }

    #[test]
    fn test_transcript_truncates_long_answers() {
        let snapshot = completed_snapshot(&[80.0]);
        let turns = pair(&snapshot, &"x".repeat(600));
        let transcript = condensed_transcript(&snapshot, &turns);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].question, "Why Postgres?");
        assert_eq!(transcript[0].answer.chars().count(), MAX_TRANSCRIPT_ANSWER_CHARS + 1);
    }

    #[tokio::test]
    async fn test_backend_failure_yields_baseline_evaluation() {
        let snapshot = completed_snapshot(&[80.0, 90.0]);
        let turns = pair(&snapshot, "It is reliable.");
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate_final_evaluation()
            .returning(|_| Err(LlmError::RateLimited { retries: 3 }));

        let now = Utc::now();
        let evaluation =
            final_evaluation(&backend, &snapshot, &turns, &EngineConfig::default(), now).await;

        assert_eq!(evaluation.source, "baseline");
        assert!((evaluation.overall_score - 85.0).abs() < 1e-9);
        assert!((evaluation.technical_score - 85.0).abs() < 1e-9);
        assert!(evaluation.passed);
        assert!(evaluation.strengths.is_empty());
        assert_eq!(evaluation.next_interview_date, now + Duration::days(7));
        assert_eq!(evaluation.suggested_topics[0], "rust");
    }

    #[tokio::test]
    async fn test_backend_report_is_used() {
        let snapshot = completed_snapshot(&[75.0]);
        let turns = pair(&snapshot, "It is reliable.");
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate_final_evaluation()
            .withf(|req| req.transcript.len() == 1 && req.round_scores.len() == 1)
            .returning(|_| {
                Ok(FinalEvaluationReport {
                    overall_score: 77.0,
                    technical_score: 80.0,
                    communication_score: 70.0,
                    problem_solving_score: 78.0,
                    confidence_score: 72.0,
                    strengths: vec!["database fundamentals".to_string()],
                    weaknesses: vec![],
                    recommendations: vec![],
                    pass: true,
                })
            });

        let evaluation = final_evaluation(
            &backend,
            &snapshot,
            &turns,
            &EngineConfig::default(),
            Utc::now(),
        )
        .await;
        assert_eq!(evaluation.source, "llm");
        assert_eq!(evaluation.overall_score, 77.0);
        assert_eq!(evaluation.strengths, vec!["database fundamentals"]);
    }
}

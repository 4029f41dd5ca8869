//! Generation Backend: the seam between the interview engine and the LLM.
//!
//! The engine holds an `Arc<dyn GenerationBackend>`; production wires in
//! `LlmGenerationBackend`, tests substitute scripted stubs or `mockall` mocks.
//! Every method may fail; callers treat a decode or validation failure exactly
//! like a transport failure.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::interview::prompts::{
    ANSWER_PROMPT_TEMPLATE, ANSWER_TASK, FINAL_PROMPT_TEMPLATE, FINAL_TASK,
    QUESTION_PROMPT_TEMPLATE, QUESTION_TASK,
};
use crate::llm_client::prompts::{fill_template, system_prompt};
use crate::llm_client::{check_score, LlmClient, LlmError, StructuredOutput};
use crate::models::interview::{Difficulty, InterviewMode, RoundType};
use crate::models::turn::Speaker;

/// Hard cap on generated question length, in characters.
const MAX_QUESTION_CHARS: usize = 1_000;

// ────────────────────────────────────────────────────────────────────────────
// Request payloads
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionRequest {
    pub mode: InterviewMode,
    pub context_name: String,
    pub context_text: String,
    pub round_type: RoundType,
    pub difficulty: Difficulty,
    /// This round's turns only, oldest first.
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerRequest {
    pub question: String,
    pub answer: String,
    pub expected_points: Vec<String>,
    pub round_type: RoundType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundScore {
    pub round_number: i32,
    pub round_type: RoundType,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub round_number: i32,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalEvaluationRequest {
    pub mode: InterviewMode,
    pub context_name: String,
    pub round_scores: Vec<RoundScore>,
    pub transcript: Vec<TranscriptEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Decoded outputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub category: String,
    #[serde(default)]
    pub what_to_look_for: Vec<String>,
    #[serde(default)]
    pub sample_answer_points: Vec<String>,
}

impl GeneratedQuestion {
    /// Evaluation hints stored on the question turn: look-for signals first,
    /// then sample points, without duplicates.
    pub fn evaluation_points(&self) -> Vec<String> {
        let mut points: Vec<String> = Vec::new();
        for point in self
            .what_to_look_for
            .iter()
            .chain(self.sample_answer_points.iter())
        {
            let point = point.trim();
            if !point.is_empty() && !points.iter().any(|p| p == point) {
                points.push(point.to_string());
            }
        }
        points
    }
}

impl StructuredOutput for GeneratedQuestion {
    fn validate(&self) -> Result<(), String> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err("question is empty".to_string());
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(format!("question exceeds {MAX_QUESTION_CHARS} characters"));
        }
        if self.category.trim().is_empty() {
            return Err("category is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub score: f64,
    pub content_score: f64,
    pub clarity_score: f64,
    pub depth_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub feedback: String,
    pub pass: bool,
    pub confidence_level: String,
}

impl StructuredOutput for AnswerEvaluation {
    fn validate(&self) -> Result<(), String> {
        check_score("score", self.score)?;
        check_score("content_score", self.content_score)?;
        check_score("clarity_score", self.clarity_score)?;
        check_score("depth_score", self.depth_score)?;
        if self.feedback.trim().is_empty() {
            return Err("feedback is empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalEvaluationReport {
    pub overall_score: f64,
    pub technical_score: f64,
    pub communication_score: f64,
    pub problem_solving_score: f64,
    pub confidence_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub pass: bool,
}

impl StructuredOutput for FinalEvaluationReport {
    fn validate(&self) -> Result<(), String> {
        check_score("overall_score", self.overall_score)?;
        check_score("technical_score", self.technical_score)?;
        check_score("communication_score", self.communication_score)?;
        check_score("problem_solving_score", self.problem_solving_score)?;
        check_score("confidence_score", self.confidence_score)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_question(
        &self,
        request: &QuestionRequest,
    ) -> Result<GeneratedQuestion, LlmError>;

    async fn evaluate_answer(&self, request: &AnswerRequest)
        -> Result<AnswerEvaluation, LlmError>;

    async fn generate_final_evaluation(
        &self,
        request: &FinalEvaluationRequest,
    ) -> Result<FinalEvaluationReport, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmGenerationBackend
// ────────────────────────────────────────────────────────────────────────────

/// Claude-backed generation through the shared `LlmClient`.
pub struct LlmGenerationBackend {
    llm: LlmClient,
}

impl LlmGenerationBackend {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl GenerationBackend for LlmGenerationBackend {
    async fn generate_question(
        &self,
        request: &QuestionRequest,
    ) -> Result<GeneratedQuestion, LlmError> {
        let prompt = build_question_prompt(request)?;
        self.llm
            .call_structured(&prompt, &system_prompt(QUESTION_TASK))
            .await
    }

    async fn evaluate_answer(
        &self,
        request: &AnswerRequest,
    ) -> Result<AnswerEvaluation, LlmError> {
        let prompt = build_answer_prompt(request)?;
        self.llm
            .call_structured(&prompt, &system_prompt(ANSWER_TASK))
            .await
    }

    async fn generate_final_evaluation(
        &self,
        request: &FinalEvaluationRequest,
    ) -> Result<FinalEvaluationReport, LlmError> {
        let prompt = build_final_prompt(request)?;
        self.llm
            .call_structured(&prompt, &system_prompt(FINAL_TASK))
            .await
    }
}

fn build_question_prompt(request: &QuestionRequest) -> Result<String, LlmError> {
    let history_json = serde_json::to_string_pretty(&request.history)?;
    Ok(fill_template(
        QUESTION_PROMPT_TEMPLATE,
        &[
            ("mode", request.mode.as_str()),
            ("context_name", request.context_name.as_str()),
            ("context_text", request.context_text.as_str()),
            ("round_type", request.round_type.as_str()),
            ("difficulty", request.difficulty.as_str()),
            ("history_json", history_json.as_str()),
        ],
    ))
}

fn build_answer_prompt(request: &AnswerRequest) -> Result<String, LlmError> {
    let expected_points_json = serde_json::to_string_pretty(&request.expected_points)?;
    Ok(fill_template(
        ANSWER_PROMPT_TEMPLATE,
        &[
            ("round_type", request.round_type.as_str()),
            ("question", request.question.as_str()),
            ("expected_points_json", expected_points_json.as_str()),
            ("answer", request.answer.as_str()),
        ],
    ))
}

fn build_final_prompt(request: &FinalEvaluationRequest) -> Result<String, LlmError> {
    let round_scores_json = serde_json::to_string_pretty(&request.round_scores)?;
    let transcript_json = serde_json::to_string_pretty(&request.transcript)?;
    Ok(fill_template(
        FINAL_PROMPT_TEMPLATE,
        &[
            ("mode", request.mode.as_str()),
            ("context_name", request.context_name.as_str()),
            ("round_scores_json", round_scores_json.as_str()),
            ("transcript_json", transcript_json.as_str()),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::decode_structured;

    #[test]
    fn test_generated_question_decodes_with_default_lists() {
        let q: GeneratedQuestion = decode_structured(
            r#"{"question": "How would you shard a Postgres table?", "category": "databases"}"#,
        )
        .unwrap();
        assert_eq!(q.category, "databases");
        assert!(q.evaluation_points().is_empty());
    }

    #[test]
    fn test_generated_question_rejects_blank_question() {
        let err = decode_structured::<GeneratedQuestion>(r#"{"question": "  ", "category": "x"}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[test]
    fn test_generated_question_requires_category() {
        let err = decode_structured::<GeneratedQuestion>(r#"{"question": "Why Rust?"}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_evaluation_points_merge_without_duplicates() {
        let q = GeneratedQuestion {
            question: "Describe a conflict".to_string(),
            category: "teamwork".to_string(),
            what_to_look_for: vec!["ownership".to_string(), "empathy".to_string()],
            sample_answer_points: vec!["empathy".to_string(), " outcome ".to_string()],
        };
        assert_eq!(q.evaluation_points(), vec!["ownership", "empathy", "outcome"]);
    }

    #[test]
    fn test_answer_evaluation_rejects_out_of_range_sub_score() {
        let json = r#"{
            "score": 80, "content_score": 80, "clarity_score": 101, "depth_score": 70,
            "strengths": [], "improvements": [], "feedback": "Good.",
            "pass": true, "confidence_level": "high"
        }"#;
        let err = decode_structured::<AnswerEvaluation>(json).unwrap_err();
        assert!(matches!(err, LlmError::Schema(msg) if msg.contains("clarity_score")));
    }

    #[test]
    fn test_final_report_decodes() {
        let json = r#"{
            "overall_score": 78, "technical_score": 81, "communication_score": 74,
            "problem_solving_score": 79, "confidence_score": 70,
            "strengths": ["clear structure"], "weaknesses": ["shallow on testing"],
            "recommendations": ["practice property-based tests"], "pass": true
        }"#;
        let report: FinalEvaluationReport = decode_structured(json).unwrap();
        assert!(report.pass);
        assert_eq!(report.weaknesses.len(), 1);
    }

    #[test]
    fn test_question_prompt_contains_history_and_context() {
        let request = QuestionRequest {
            mode: InterviewMode::CompanySpecific,
            context_name: "Acme".to_string(),
            context_text: "Rust backend engineer".to_string(),
            round_type: RoundType::Technical,
            difficulty: Difficulty::Hard,
            history: vec![HistoryEntry {
                speaker: Speaker::System,
                text: "What is a lifetime?".to_string(),
            }],
        };
        let prompt = build_question_prompt(&request).unwrap();
        assert!(prompt.contains("company_specific"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("What is a lifetime?"));
        assert!(prompt.contains("Difficulty: hard"));
        assert!(!prompt.contains("{history_json}"));
    }

    #[test]
    fn test_placeholders_in_job_description_are_left_alone() {
        let request = QuestionRequest {
            mode: InterviewMode::CompanySpecific,
            context_name: "Acme".to_string(),
            context_text: "Must know {difficulty} and {history_json}".to_string(),
            round_type: RoundType::Technical,
            difficulty: Difficulty::Hard,
            history: vec![],
        };
        let prompt = build_question_prompt(&request).unwrap();
        assert!(prompt.contains("Must know {difficulty} and {history_json}"));
        assert!(prompt.contains("Difficulty: hard"));
    }

    #[test]
    fn test_answer_prompt_keeps_candidate_text_verbatim() {
        let request = AnswerRequest {
            question: "What does {answer} mean here?".to_string(),
            answer: "It is a template slot like {question}.".to_string(),
            expected_points: vec![],
            round_type: RoundType::Communication,
        };
        let prompt = build_answer_prompt(&request).unwrap();
        assert!(prompt.contains("What does {answer} mean here?"));
        assert!(prompt.contains("It is a template slot like {question}."));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The closing report of a completed interview. Exactly one per interview.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Evaluation {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub technical_score: f64,
    pub communication_score: f64,
    pub problem_solving_score: f64,
    pub confidence_score: f64,
    pub overall_score: f64,
    pub passed: bool,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub suggested_topics: Vec<String>,
    pub next_interview_date: DateTime<Utc>,
    /// "llm" | "baseline", for transparency.
    pub source: String,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Default minimum average score for a round to pass.
pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interview_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InterviewMode {
    CompanySpecific,
    CustomTopic,
}

impl InterviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewMode::CompanySpecific => "company_specific",
            InterviewMode::CustomTopic => "custom_topic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interview_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "round_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Locked,
    Unlocked,
    InProgress,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "round_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Technical,
    Hr,
    Behavioral,
    Communication,
}

impl RoundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundType::Technical => "technical",
            RoundType::Hr => "hr",
            RoundType::Behavioral => "behavioral",
            RoundType::Communication => "communication",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "difficulty", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// One mock-interview session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Interview {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub mode: InterviewMode,
    pub company_name: Option<String>,
    pub job_description: Option<String>,
    pub topics: Vec<String>,
    pub total_rounds: i32,
    /// 1-based number of the active round.
    pub current_round: i32,
    pub status: InterviewStatus,
    /// Set only once the interview is completed.
    pub overall_score: Option<f64>,
    pub pass_fail_status: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Interview {
    pub fn duration(&self) -> Option<Duration> {
        Some(self.completed_at? - self.started_at?)
    }

    /// Text the question generator works from: the job description for
    /// company interviews, the topic list otherwise.
    pub fn context_text(&self) -> String {
        match self.mode {
            InterviewMode::CompanySpecific => {
                self.job_description.clone().unwrap_or_default()
            }
            InterviewMode::CustomTopic => self.topics.join(", "),
        }
    }

    /// Short label used in prompts and summaries.
    pub fn context_name(&self) -> String {
        match self.mode {
            InterviewMode::CompanySpecific => self.company_name.clone().unwrap_or_default(),
            InterviewMode::CustomTopic => self.topics.join(", "),
        }
    }
}

/// One stage of an interview.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Round {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub round_number: i32,
    pub round_type: RoundType,
    pub difficulty: Difficulty,
    pub status: RoundStatus,
    pub pass_threshold: f64,
    /// Questions asked per attempt before the round closes.
    pub max_questions: i32,
    /// Starts at 1; bumped each time a failed round is retried.
    pub attempt: i32,
    pub score: Option<f64>,
    pub pass_status: Option<bool>,
    pub feedback_summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn duration(&self) -> Option<Duration> {
        Some(self.completed_at? - self.started_at?)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, RoundStatus::Passed | RoundStatus::Failed)
    }
}

/// Caller-supplied configuration for one round at interview creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    pub round_type: RoundType,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub pass_threshold: Option<f64>,
    /// Optional per-round cap, bounded above by the engine-wide maximum.
    pub question_count: Option<u32>,
}

/// Request body for creating an interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInterview {
    pub owner_id: Uuid,
    pub mode: InterviewMode,
    pub company_name: Option<String>,
    pub job_description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub rounds: Vec<RoundConfig>,
}

/// An interview together with its rounds, ordered by round number.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewDetail {
    pub interview: Interview,
    pub rounds: Vec<Round>,
    /// Start to completion, once completed.
    pub duration_seconds: Option<i64>,
}

impl InterviewDetail {
    pub fn new(interview: Interview, rounds: Vec<Round>) -> Self {
        Self {
            duration_seconds: interview.duration().map(|d| d.num_seconds()),
            interview,
            rounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_is_snake_case() {
        let json = serde_json::to_string(&InterviewStatus::NotStarted).unwrap();
        assert_eq!(json, r#""not_started""#);
        let status: RoundStatus = serde_json::from_str(r#""in_progress""#).unwrap();
        assert_eq!(status, RoundStatus::InProgress);
    }

    #[test]
    fn test_round_config_defaults_difficulty_to_medium() {
        let config: RoundConfig =
            serde_json::from_str(r#"{"round_type": "hr", "pass_threshold": null, "question_count": null}"#)
                .unwrap();
        assert_eq!(config.round_type, RoundType::Hr);
        assert_eq!(config.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_duration_requires_both_timestamps() {
        let now = Utc::now();
        let mut interview = Interview {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            mode: InterviewMode::CustomTopic,
            company_name: None,
            job_description: None,
            topics: vec!["rust".to_string(), "tokio".to_string()],
            total_rounds: 1,
            current_round: 1,
            status: InterviewStatus::InProgress,
            overall_score: None,
            pass_fail_status: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        };
        assert!(interview.duration().is_none());

        interview.completed_at = Some(now + Duration::minutes(42));
        assert_eq!(interview.duration(), Some(Duration::minutes(42)));
        assert_eq!(interview.context_text(), "rust, tokio");
    }
}

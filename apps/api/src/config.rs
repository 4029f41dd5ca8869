use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::models::interview::DEFAULT_PASS_THRESHOLD;

/// Questions asked in a round before it closes, unless the round's own
/// configuration asks for fewer.
pub const MAX_QUESTIONS_PER_ROUND: u32 = 5;
/// Days between interview completion and the suggested follow-up interview.
pub const NEXT_INTERVIEW_OFFSET_DAYS: i64 = 7;
/// Upper bound on the follow-up offset, keeping the date arithmetic in range.
pub const MAX_NEXT_INTERVIEW_OFFSET_DAYS: i64 = 365;

/// What happens to an interview when one of its rounds fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailedRoundPolicy {
    /// The interview stays in progress and the failed round can be retried.
    #[default]
    Retry,
    /// The interview is abandoned together with the failed round's close.
    Abandon,
}

impl FromStr for FailedRoundPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(FailedRoundPolicy::Retry),
            "abandon" => Ok(FailedRoundPolicy::Abandon),
            other => bail!("unknown failed round policy '{other}' (expected 'retry' or 'abandon')"),
        }
    }
}

/// Which durable store backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => bail!("unknown store '{other}' (expected 'postgres' or 'memory')"),
        }
    }
}

/// Tunables the interview engine reads. Constructed from `Config` in
/// production and via `Default` in tests.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_questions_per_round: u32,
    pub default_pass_threshold: f64,
    pub next_interview_offset_days: i64,
    pub failed_round_policy: FailedRoundPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_questions_per_round: MAX_QUESTIONS_PER_ROUND,
            default_pass_threshold: DEFAULT_PASS_THRESHOLD,
            next_interview_offset_days: NEXT_INTERVIEW_OFFSET_DAYS,
            failed_round_policy: FailedRoundPolicy::Retry,
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store: StoreKind = optional_env("STORE", "postgres")?;
        let database_url = match store {
            StoreKind::Postgres => Some(require_env("DATABASE_URL")?),
            StoreKind::Memory => std::env::var("DATABASE_URL").ok(),
        };

        let max_questions_per_round: u32 =
            optional_env("MAX_QUESTIONS_PER_ROUND", &MAX_QUESTIONS_PER_ROUND.to_string())?;
        if max_questions_per_round == 0 {
            bail!("MAX_QUESTIONS_PER_ROUND must be at least 1");
        }

        let default_pass_threshold: f64 =
            optional_env("DEFAULT_PASS_THRESHOLD", &DEFAULT_PASS_THRESHOLD.to_string())?;
        if !(0.0..=100.0).contains(&default_pass_threshold) {
            bail!("DEFAULT_PASS_THRESHOLD must be between 0 and 100");
        }

        let next_interview_offset_days = check_offset_days(optional_env(
            "NEXT_INTERVIEW_OFFSET_DAYS",
            &NEXT_INTERVIEW_OFFSET_DAYS.to_string(),
        )?)?;

        Ok(Config {
            store,
            database_url,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            port: optional_env("PORT", "8080")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            engine: EngineConfig {
                max_questions_per_round,
                default_pass_threshold,
                next_interview_offset_days,
                failed_round_policy: optional_env("FAILED_ROUND_POLICY", "retry")?,
            },
        })
    }
}

fn check_offset_days(days: i64) -> Result<i64> {
    if !(0..=MAX_NEXT_INTERVIEW_OFFSET_DAYS).contains(&days) {
        bail!("NEXT_INTERVIEW_OFFSET_DAYS must be between 0 and {MAX_NEXT_INTERVIEW_OFFSET_DAYS}");
    }
    Ok(days)
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_round_policy_parses_case_insensitively() {
        assert_eq!("Retry".parse::<FailedRoundPolicy>().unwrap(), FailedRoundPolicy::Retry);
        assert_eq!(" abandon ".parse::<FailedRoundPolicy>().unwrap(), FailedRoundPolicy::Abandon);
        assert!("stall".parse::<FailedRoundPolicy>().is_err());
    }

    #[test]
    fn test_store_kind_parses() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!("sqlite".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_questions_per_round, 5);
        assert_eq!(config.next_interview_offset_days, 7);
        assert!((config.default_pass_threshold - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.failed_round_policy, FailedRoundPolicy::Retry);
    }

    #[test]
    fn test_offset_days_are_bounded() {
        assert_eq!(check_offset_days(7).unwrap(), 7);
        assert_eq!(check_offset_days(0).unwrap(), 0);
        assert!(check_offset_days(-1).is_err());
        assert!(check_offset_days(MAX_NEXT_INTERVIEW_OFFSET_DAYS + 1).is_err());
        assert!(check_offset_days(i64::MAX).is_err());
    }
}

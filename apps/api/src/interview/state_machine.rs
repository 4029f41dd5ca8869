//! Round & Interview State Machine.
//!
//! Every function here is pure: it reads an `InterviewSnapshot` and returns a
//! `Transition` holding the new versions of whatever changed. Nothing is
//! written until the engine hands the transition to the store, which applies
//! it atomically. A rejected operation returns an error and leaves no trace.
//!
//! Interview: not_started → in_progress → {completed | abandoned}, in_progress ⇄ paused
//! Round:     locked → unlocked → in_progress → {passed | failed}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{EngineConfig, FailedRoundPolicy};
use crate::errors::AppError;
use crate::models::evaluation::Evaluation;
use crate::models::interview::{
    Interview, InterviewMode, InterviewStatus, NewInterview, Round, RoundStatus,
};
use crate::models::turn::{ConversationTurn, Speaker};

/// Cap on strengths / weaknesses carried into a round summary.
const MAX_SUMMARY_ITEMS: usize = 5;

/// An interview and its rounds as read from the store, rounds ordered by number.
#[derive(Debug, Clone)]
pub struct InterviewSnapshot {
    pub interview: Interview,
    pub rounds: Vec<Round>,
}

impl InterviewSnapshot {
    pub fn round(&self, round_id: Uuid) -> Result<&Round, AppError> {
        self.rounds
            .iter()
            .find(|r| r.id == round_id)
            .ok_or_else(|| AppError::NotFound(format!("Round {round_id} not found")))
    }

    pub fn round_by_number(&self, round_number: i32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number == round_number)
    }

    pub fn active_round(&self) -> Option<&Round> {
        self.rounds
            .iter()
            .find(|r| r.status == RoundStatus::InProgress)
    }

    /// The snapshot as it will read once `transition` is applied.
    pub fn after(&self, transition: &Transition) -> InterviewSnapshot {
        let rounds = self
            .rounds
            .iter()
            .map(|round| {
                transition
                    .rounds
                    .iter()
                    .find(|changed| changed.id == round.id)
                    .unwrap_or(round)
                    .clone()
            })
            .collect();
        InterviewSnapshot {
            interview: transition.interview.clone(),
            rounds,
        }
    }
}

/// The new state produced by one state-machine step.
#[derive(Debug, Clone)]
pub struct Transition {
    pub interview: Interview,
    /// Only the rounds this step changed.
    pub rounds: Vec<Round>,
    /// Present only on the step that completes the interview.
    pub evaluation: Option<Evaluation>,
}

impl Transition {
    fn interview_only(interview: Interview) -> Self {
        Self {
            interview,
            rounds: vec![],
            evaluation: None,
        }
    }
}

/// What a round close decided, reported back to the caller.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RoundOutcome {
    pub round_id: Uuid,
    pub round_number: i32,
    pub score: f64,
    pub passed: bool,
    /// Number of the round unlocked by this close, if any.
    pub unlocked_round: Option<i32>,
    pub interview_status: InterviewStatus,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RoundClosure {
    pub transition: Transition,
    pub outcome: RoundOutcome,
    /// The last round passed; the caller must run the final evaluation and
    /// call `complete_interview` before applying the transition.
    pub completes_interview: bool,
}

fn invalid_state(msg: impl Into<String>) -> AppError {
    AppError::InvalidState(msg.into())
}

// ────────────────────────────────────────────────────────────────────────────
// Creation
// ────────────────────────────────────────────────────────────────────────────

/// Validates a creation request and builds the interview with its rounds:
/// round 1 unlocked, every other round locked, interview not started.
pub fn build_interview(
    request: &NewInterview,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<(Interview, Vec<Round>), AppError> {
    let company_name = non_blank(request.company_name.as_deref());
    let job_description = non_blank(request.job_description.as_deref());
    let topics: Vec<String> = request
        .topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    match request.mode {
        InterviewMode::CompanySpecific if company_name.is_none() => {
            return Err(AppError::Validation(
                "company_name is required for company-specific interviews".to_string(),
            ));
        }
        InterviewMode::CustomTopic if topics.is_empty() => {
            return Err(AppError::Validation(
                "at least one topic is required for custom-topic interviews".to_string(),
            ));
        }
        _ => {}
    }

    if request.rounds.is_empty() {
        return Err(AppError::Validation(
            "an interview needs at least one round".to_string(),
        ));
    }

    let interview_id = Uuid::new_v4();
    let mut rounds = Vec::with_capacity(request.rounds.len());

    for (index, round_config) in request.rounds.iter().enumerate() {
        let round_number = index as i32 + 1;

        let pass_threshold = round_config
            .pass_threshold
            .unwrap_or(config.default_pass_threshold);
        if !pass_threshold.is_finite() || !(0.0..=100.0).contains(&pass_threshold) {
            return Err(AppError::Validation(format!(
                "round {round_number}: pass_threshold must be between 0 and 100"
            )));
        }

        let max_questions = match round_config.question_count {
            Some(0) => {
                return Err(AppError::Validation(format!(
                    "round {round_number}: question_count must be at least 1"
                )));
            }
            Some(n) => n.min(config.max_questions_per_round),
            None => config.max_questions_per_round,
        };

        rounds.push(Round {
            id: Uuid::new_v4(),
            interview_id,
            round_number,
            round_type: round_config.round_type,
            difficulty: round_config.difficulty,
            status: if round_number == 1 {
                RoundStatus::Unlocked
            } else {
                RoundStatus::Locked
            },
            pass_threshold,
            max_questions: max_questions as i32,
            attempt: 1,
            score: None,
            pass_status: None,
            feedback_summary: None,
            strengths: vec![],
            weaknesses: vec![],
            started_at: None,
            completed_at: None,
        });
    }

    let interview = Interview {
        id: interview_id,
        owner_id: request.owner_id,
        mode: request.mode,
        company_name,
        job_description,
        topics,
        total_rounds: rounds.len() as i32,
        current_round: 1,
        status: InterviewStatus::NotStarted,
        overall_score: None,
        pass_fail_status: None,
        created_at: now,
        started_at: None,
        completed_at: None,
    };

    Ok((interview, rounds))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ────────────────────────────────────────────────────────────────────────────
// Interview-level transitions
// ────────────────────────────────────────────────────────────────────────────

pub fn start_interview(
    snapshot: &InterviewSnapshot,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    let mut interview = snapshot.interview.clone();
    if interview.status != InterviewStatus::NotStarted {
        return Err(invalid_state(format!(
            "interview cannot start from status {:?}",
            interview.status
        )));
    }
    interview.status = InterviewStatus::InProgress;
    interview.started_at = Some(now);
    Ok(Transition::interview_only(interview))
}

pub fn pause_interview(snapshot: &InterviewSnapshot) -> Result<Transition, AppError> {
    let mut interview = snapshot.interview.clone();
    if interview.status != InterviewStatus::InProgress {
        return Err(invalid_state("only an in-progress interview can be paused"));
    }
    interview.status = InterviewStatus::Paused;
    Ok(Transition::interview_only(interview))
}

pub fn resume_interview(snapshot: &InterviewSnapshot) -> Result<Transition, AppError> {
    let mut interview = snapshot.interview.clone();
    if interview.status != InterviewStatus::Paused {
        return Err(invalid_state("only a paused interview can be resumed"));
    }
    interview.status = InterviewStatus::InProgress;
    Ok(Transition::interview_only(interview))
}

pub fn abandon_interview(snapshot: &InterviewSnapshot) -> Result<Transition, AppError> {
    let mut interview = snapshot.interview.clone();
    match interview.status {
        InterviewStatus::NotStarted | InterviewStatus::InProgress | InterviewStatus::Paused => {
            interview.status = InterviewStatus::Abandoned;
            Ok(Transition::interview_only(interview))
        }
        status => Err(invalid_state(format!(
            "interview cannot be abandoned from status {status:?}"
        ))),
    }
}

/// Completed interviews are permanent.
pub fn ensure_deletable(snapshot: &InterviewSnapshot) -> Result<(), AppError> {
    if snapshot.interview.status == InterviewStatus::Completed {
        return Err(invalid_state("a completed interview cannot be deleted"));
    }
    Ok(())
}

/// Guards question generation and answer intake: the interview must be
/// running and the round must be the one in progress.
pub fn ensure_round_active(snapshot: &InterviewSnapshot, round_id: Uuid) -> Result<&Round, AppError> {
    if snapshot.interview.status != InterviewStatus::InProgress {
        return Err(invalid_state(format!(
            "interview is {:?}, not in progress",
            snapshot.interview.status
        )));
    }
    let round = snapshot.round(round_id)?;
    if round.status != RoundStatus::InProgress {
        return Err(invalid_state(format!(
            "round {} is {:?}, not in progress",
            round.round_number, round.status
        )));
    }
    Ok(round)
}

// ────────────────────────────────────────────────────────────────────────────
// Round-level transitions
// ────────────────────────────────────────────────────────────────────────────

/// Starts (or re-enters) a round. Tolerates an interview that was never
/// explicitly started.
pub fn start_round(
    snapshot: &InterviewSnapshot,
    round_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    let mut interview = snapshot.interview.clone();
    match interview.status {
        InterviewStatus::NotStarted | InterviewStatus::InProgress => {}
        status => {
            return Err(invalid_state(format!(
                "rounds cannot start while the interview is {status:?}"
            )));
        }
    }

    let mut round = snapshot.round(round_id)?.clone();
    match round.status {
        RoundStatus::Unlocked | RoundStatus::InProgress => {}
        status => {
            return Err(invalid_state(format!(
                "round {} cannot start from status {status:?}",
                round.round_number
            )));
        }
    }

    if let Some(active) = snapshot.active_round() {
        if active.id != round.id {
            return Err(invalid_state(format!(
                "round {} is already in progress",
                active.round_number
            )));
        }
    }

    round.status = RoundStatus::InProgress;
    round.started_at.get_or_insert(now);

    interview.current_round = round.round_number;
    interview.started_at.get_or_insert(now);
    interview.status = InterviewStatus::InProgress;

    Ok(Transition {
        interview,
        rounds: vec![round],
        evaluation: None,
    })
}

/// Reopens a failed round for a fresh attempt.
pub fn retry_round(
    snapshot: &InterviewSnapshot,
    round_id: Uuid,
    policy: FailedRoundPolicy,
) -> Result<Transition, AppError> {
    if policy != FailedRoundPolicy::Retry {
        return Err(invalid_state("failed rounds cannot be retried under the current policy"));
    }
    let mut interview = snapshot.interview.clone();
    if interview.status != InterviewStatus::InProgress {
        return Err(invalid_state(format!(
            "interview is {:?}, not in progress",
            interview.status
        )));
    }

    let mut round = snapshot.round(round_id)?.clone();
    if round.status != RoundStatus::Failed {
        return Err(invalid_state(format!(
            "round {} is {:?}; only failed rounds can be retried",
            round.round_number, round.status
        )));
    }

    round.status = RoundStatus::Unlocked;
    round.attempt += 1;
    round.score = None;
    round.pass_status = None;
    round.feedback_summary = None;
    round.strengths.clear();
    round.weaknesses.clear();
    round.started_at = None;
    round.completed_at = None;

    interview.current_round = round.round_number;

    Ok(Transition {
        interview,
        rounds: vec![round],
        evaluation: None,
    })
}

/// Turns belonging to the round's current attempt.
pub fn current_attempt<'t>(
    round: &Round,
    turns: &'t [ConversationTurn],
) -> impl Iterator<Item = &'t ConversationTurn> + 't {
    let (round_id, attempt) = (round.id, round.attempt);
    turns
        .iter()
        .filter(move |t| t.round_id == round_id && t.attempt == attempt)
}

/// Arithmetic mean of the scored candidate turns, 0 when there are none.
pub fn round_score<'a>(turns: impl Iterator<Item = &'a ConversationTurn>) -> f64 {
    let scores: Vec<f64> = turns
        .filter(|t| t.speaker == Speaker::Candidate)
        .filter_map(|t| t.answer_score)
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Closes an in-progress round: scores it, marks it passed or failed and, on
/// a pass, unlocks the next round. See `RoundClosure::completes_interview`
/// for the last round.
pub fn close_round(
    snapshot: &InterviewSnapshot,
    round_id: Uuid,
    turns: &[ConversationTurn],
    policy: FailedRoundPolicy,
    now: DateTime<Utc>,
) -> Result<RoundClosure, AppError> {
    let mut interview = snapshot.interview.clone();
    let mut round = ensure_round_active(snapshot, round_id)?.clone();

    let attempt_turns: Vec<&ConversationTurn> = current_attempt(&round, turns).collect();
    let score = round_score(attempt_turns.iter().copied());
    let passed = score >= round.pass_threshold;

    let (strengths, weaknesses) = collect_feedback(&attempt_turns);
    round.feedback_summary = Some(format!(
        "Round {} ({}) scored {:.1} against a pass threshold of {:.1}: {}.",
        round.round_number,
        round.round_type.as_str(),
        score,
        round.pass_threshold,
        if passed { "passed" } else { "not passed" }
    ));
    round.strengths = strengths;
    round.weaknesses = weaknesses;
    round.score = Some(score);
    round.pass_status = Some(passed);
    round.status = if passed {
        RoundStatus::Passed
    } else {
        RoundStatus::Failed
    };
    round.completed_at = Some(now);

    let mut changed = vec![];
    let mut unlocked_round = None;
    let mut completes_interview = false;

    if passed {
        match snapshot.round_by_number(round.round_number + 1) {
            Some(next) => {
                let mut next = next.clone();
                if next.status == RoundStatus::Locked {
                    next.status = RoundStatus::Unlocked;
                }
                interview.current_round = next.round_number;
                unlocked_round = Some(next.round_number);
                changed.push(next);
            }
            None => completes_interview = true,
        }
    } else if policy == FailedRoundPolicy::Abandon {
        interview.status = InterviewStatus::Abandoned;
    }

    let outcome = RoundOutcome {
        round_id: round.id,
        round_number: round.round_number,
        score,
        passed,
        unlocked_round,
        interview_status: if completes_interview {
            InterviewStatus::Completed
        } else {
            interview.status
        },
        duration_seconds: round.duration().map(|d| d.num_seconds()),
    };

    changed.insert(0, round);

    Ok(RoundClosure {
        transition: Transition {
            interview,
            rounds: changed,
            evaluation: None,
        },
        outcome,
        completes_interview,
    })
}

/// Folds the final evaluation into a closing transition.
pub fn complete_interview(
    mut transition: Transition,
    evaluation: Evaluation,
    now: DateTime<Utc>,
) -> Transition {
    transition.interview.status = InterviewStatus::Completed;
    transition.interview.completed_at = Some(now);
    transition.interview.overall_score = Some(evaluation.overall_score);
    transition.interview.pass_fail_status = Some(evaluation.passed);
    transition.evaluation = Some(evaluation);
    transition
}

/// De-duplicated strengths and improvements across the attempt's answers,
/// first occurrence first.
fn collect_feedback(turns: &[&ConversationTurn]) -> (Vec<String>, Vec<String>) {
    let mut strengths: Vec<String> = Vec::new();
    let mut weaknesses: Vec<String> = Vec::new();
    for turn in turns.iter().filter(|t| t.speaker == Speaker::Candidate) {
        push_unique(&mut strengths, &turn.strengths);
        push_unique(&mut weaknesses, &turn.improvements);
    }
    (strengths, weaknesses)
}

fn push_unique(into: &mut Vec<String>, items: &[String]) {
    for item in items {
        let item = item.trim();
        if into.len() >= MAX_SUMMARY_ITEMS {
            return;
        }
        if !item.is_empty() && !into.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            into.push(item.to_string());
        }
    }
}

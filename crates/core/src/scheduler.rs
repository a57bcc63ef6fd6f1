use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{Rating, ReportedStage, SchedulingState, Stage};

const SECONDS_PER_DAY: f64 = 86_400.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("FSRS scheduling failed: {0}")]
    Fsrs(String),
    #[error("desired retention must be in (0, 1], got {provided}")]
    InvalidRetention { provided: f32 },
    #[error("elapsed days must be non-negative and finite, got {provided}")]
    InvalidElapsedDays { provided: f64 },
}

//
// ─── SCHEDULED STATES ──────────────────────────────────────────────────────────
//

/// Candidate next scheduling states, one per possible rating.
///
/// The adapter computes all four branches; callers pick the branch matching
/// the rating the learner actually chose via [`ScheduledStates::select`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledStates {
    pub again: SchedulingState,
    pub hard: SchedulingState,
    pub good: SchedulingState,
    pub easy: SchedulingState,
}

impl ScheduledStates {
    #[must_use]
    pub fn select(&self, rating: Rating) -> &SchedulingState {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }

    /// Days until the next due date for each branch, for interval previews.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn interval_days(&self) -> [i64; 4] {
        [
            self.again.scheduled_days as i64,
            self.hard.scheduled_days as i64,
            self.good.scheduled_days as i64,
            self.easy.scheduled_days as i64,
        ]
    }
}

//
// ─── STAGE TRANSITIONS ─────────────────────────────────────────────────────────
//

fn next_stage(stage: Stage, rating: Rating) -> Stage {
    match (stage, rating) {
        (Stage::New, Rating::Easy) => Stage::Review,
        (Stage::New, _) => Stage::Learning,
        (Stage::Learning | Stage::Relearning, Rating::Again | Rating::Hard) => stage,
        (Stage::Learning | Stage::Relearning, _) => Stage::Review,
        (Stage::Review, Rating::Again) => Stage::Relearning,
        (Stage::Review, _) => Stage::Review,
    }
}

fn lapses_after(stage: Stage, rating: Rating, lapses: u32) -> u32 {
    if stage == Stage::Review && rating == Rating::Again {
        lapses + 1
    } else {
        lapses
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Adapter over the external FSRS scheduling function.
///
/// Owns no card data and performs no I/O: it maps a scheduling state plus a
/// rating onto the next scheduling state, and classifies lifecycle stages for
/// reporting. The forgetting-curve numerics live entirely inside the `fsrs`
/// crate; this type only supplies the lifecycle bookkeeping around them.
pub struct Scheduler {
    fsrs: fsrs::FSRS,
    desired_retention: f32,
}

impl Scheduler {
    /// Scheduler with default parameters and 0.9 desired retention.
    ///
    /// # Panics
    ///
    /// Panics if FSRS initialization fails (does not happen with default
    /// parameters).
    #[must_use]
    pub fn new() -> Self {
        Self::try_with_retention(0.9)
            .expect("FSRS initialization with default parameters should not fail")
    }

    /// Scheduler with a custom desired retention.
    ///
    /// # Errors
    ///
    /// - `InvalidRetention` if `desired_retention` is not in `(0, 1]`
    /// - `Fsrs` if FSRS initialization fails
    pub fn try_with_retention(desired_retention: f32) -> Result<Self, SchedulerError> {
        if !(0.0..=1.0).contains(&desired_retention) || desired_retention == 0.0 {
            return Err(SchedulerError::InvalidRetention {
                provided: desired_retention,
            });
        }

        let fsrs = fsrs::FSRS::new(Some(&[])).map_err(|e| SchedulerError::Fsrs(e.to_string()))?;

        Ok(Self {
            fsrs,
            desired_retention,
        })
    }

    #[must_use]
    pub fn desired_retention(&self) -> f32 {
        self.desired_retention
    }

    /// True when the state's due instant has passed.
    #[must_use]
    pub fn is_due(&self, state: &SchedulingState, now: DateTime<Utc>) -> bool {
        state.is_due(now)
    }

    /// Reporting classification; a pure function of the state's stage.
    #[must_use]
    pub fn classify(&self, state: &SchedulingState) -> ReportedStage {
        state.classify()
    }

    /// Computes the four candidate next states for a card.
    ///
    /// Elapsed days are measured from the state's last review (0 for new
    /// cards). Intervals are rounded and clamped to at least one day, with
    /// `due = now + interval`.
    ///
    /// # Errors
    ///
    /// - `InvalidElapsedDays` if `now` precedes the last review
    /// - `Fsrs` if the scheduling function fails
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_states(
        &self,
        state: &SchedulingState,
        now: DateTime<Utc>,
    ) -> Result<ScheduledStates, SchedulerError> {
        let elapsed_days = elapsed_days_since(state.last_review, now)?;

        let memory = if state.reps == 0 {
            None
        } else {
            Some(fsrs::MemoryState {
                stability: state.stability as f32,
                difficulty: state.difficulty as f32,
            })
        };

        let next = self
            .fsrs
            .next_states(memory, self.desired_retention, elapsed_days.round() as u32)
            .map_err(|e| SchedulerError::Fsrs(e.to_string()))?;

        Ok(ScheduledStates {
            again: candidate(state, &next.again, Rating::Again, now, elapsed_days),
            hard: candidate(state, &next.hard, Rating::Hard, now, elapsed_days),
            good: candidate(state, &next.good, Rating::Good, now, elapsed_days),
            easy: candidate(state, &next.easy, Rating::Easy, now, elapsed_days),
        })
    }

    /// Applies a rating: computes all branches and selects exactly the one
    /// matching `rating`.
    ///
    /// # Errors
    ///
    /// Propagates the same errors as [`Scheduler::next_states`].
    pub fn commit(
        &self,
        state: &SchedulingState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<SchedulingState, SchedulerError> {
        let states = self.next_states(state, now)?;
        Ok(states.select(rating).clone())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_days_since(
    last_review: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<f64, SchedulerError> {
    let Some(last) = last_review else {
        return Ok(0.0);
    };

    // NOTE: `num_seconds()` returns `i64`; converting to `f64` may lose
    // precision for extremely large durations, but review intervals are
    // bounded to human timescales.
    #[allow(clippy::cast_precision_loss)]
    let elapsed = now.signed_duration_since(last).num_seconds() as f64 / SECONDS_PER_DAY;

    if !elapsed.is_finite() || elapsed < 0.0 {
        return Err(SchedulerError::InvalidElapsedDays { provided: elapsed });
    }
    Ok(elapsed)
}

/// Builds one candidate branch from an FSRS item state.
#[allow(clippy::cast_possible_truncation)]
fn candidate(
    state: &SchedulingState,
    item: &fsrs::ItemState,
    rating: Rating,
    now: DateTime<Utc>,
    elapsed_days: f64,
) -> SchedulingState {
    // fsrs-rs intervals are fractional days; round and clamp to >= 1 day.
    let interval_days = f64::from(item.interval).round().max(1.0);

    SchedulingState {
        stage: next_stage(state.stage, rating),
        due: now + Duration::days(interval_days as i64),
        stability: f64::from(item.memory.stability),
        difficulty: f64::from(item.memory.difficulty),
        reps: state.reps + 1,
        lapses: lapses_after(state.stage, rating, state.lapses),
        elapsed_days,
        scheduled_days: interval_days,
        last_review: Some(now),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── STAGES ────────────────────────────────────────────────────────────────────
//

/// Lifecycle stage of a card's scheduling state.
///
/// - `New`: never reviewed
/// - `Learning`: in the initial acquisition phase
/// - `Relearning`: forgotten after graduating, being re-acquired
/// - `Review`: graduated, on long-term intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    New,
    Learning,
    Relearning,
    Review,
}

impl Stage {
    /// Stable string code used in persisted payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::New => "new",
            Stage::Learning => "learning",
            Stage::Relearning => "relearning",
            Stage::Review => "review",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid stage: {0}")]
pub struct StageParseError(pub String);

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Stage::New),
            "learning" => Ok(Stage::Learning),
            "relearning" => Ok(Stage::Relearning),
            "review" => Ok(Stage::Review),
            other => Err(StageParseError(other.to_string())),
        }
    }
}

/// Coarse stage used for reporting: relearning folds into learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportedStage {
    New,
    Learning,
    Review,
}

//
// ─── SCHEDULING STATE ──────────────────────────────────────────────────────────
//

/// Per-card scheduling state, owned exclusively by its `Card`.
///
/// `stability` and `difficulty` are the memory-model measures produced by the
/// scheduling function; `reps` counts committed reviews and `lapses` counts
/// falls from `Review` back into `Relearning`.
///
/// Invariant: a card in stage `New` has `reps == 0` and no `last_review`,
/// and its `due` equals its creation time so it is immediately eligible.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingState {
    pub stage: Stage,
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub reps: u32,
    pub lapses: u32,
    pub elapsed_days: f64,
    pub scheduled_days: f64,
    pub last_review: Option<DateTime<Utc>>,
}

impl SchedulingState {
    /// Fresh state for a card that has never been reviewed.
    #[must_use]
    pub fn new_card(created_at: DateTime<Utc>) -> Self {
        Self {
            stage: Stage::New,
            due: created_at,
            stability: 0.0,
            difficulty: 0.0,
            reps: 0,
            lapses: 0,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            last_review: None,
        }
    }

    /// A card is due once its due instant has passed (boundary inclusive).
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }

    /// Maps the lifecycle stage onto the three reporting buckets.
    #[must_use]
    pub fn classify(&self) -> ReportedStage {
        match self.stage {
            Stage::New => ReportedStage::New,
            Stage::Learning | Stage::Relearning => ReportedStage::Learning,
            Stage::Review => ReportedStage::Review,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.classify() == ReportedStage::New
    }

    #[must_use]
    pub fn is_learning(&self) -> bool {
        self.classify() == ReportedStage::Learning
    }

    #[must_use]
    pub fn is_review(&self) -> bool {
        self.classify() == ReportedStage::Review
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

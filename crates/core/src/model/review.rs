use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::CardId;
use crate::model::scheduling::Stage;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors that can occur when interpreting rating values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RatingError {
    #[error("invalid rating value: {0}")]
    InvalidRating(u8),
}

//
// ─── RATING ────────────────────────────────────────────────────────────────────
//

/// Four-level outcome of a single review, ordered `Again < Hard < Good < Easy`.
///
/// The numeric form follows the FSRS 1–4 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    /// Failed to recall. The card comes back soon.
    Again,
    /// Recalled with significant difficulty.
    Hard,
    /// Recalled correctly with normal effort.
    Good,
    /// Recalled instantly.
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Converts a numeric rating (1–4) into a `Rating`.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::InvalidRating` for any value outside 1–4.
    /// Values are never defaulted or clamped.
    pub fn from_number(value: u8) -> Result<Self, RatingError> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            _ => Err(RatingError::InvalidRating(value)),
        }
    }

    /// Numeric FSRS-scale form (1–4).
    #[must_use]
    pub fn as_number(self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }

    /// A review counts as successful when the learner recalled the answer.
    #[must_use]
    pub fn is_success(self) -> bool {
        self >= Rating::Good
    }
}

//
// ─── REVIEW LOG ENTRY ──────────────────────────────────────────────────────────
//

/// Record of one rating event.
///
/// Entries are append-only and immutable; `card_id` is a weak reference, so an
/// entry may outlive its card. `scheduled_days` is the whole-day distance from
/// the review moment to the newly scheduled due date.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewLogEntry {
    pub card_id: CardId,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub previous_stage: Stage,
    pub new_stage: Stage,
    pub scheduled_days: i64,
}

impl ReviewLogEntry {
    #[must_use]
    pub fn new(
        card_id: CardId,
        rating: Rating,
        reviewed_at: DateTime<Utc>,
        previous_stage: Stage,
        new_stage: Stage,
        scheduled_days: i64,
    ) -> Self {
        Self {
            card_id,
            rating,
            reviewed_at,
            previous_stage,
            new_stage,
            scheduled_days,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn numeric_conversion_round_trips() {
        for rating in Rating::ALL {
            assert_eq!(Rating::from_number(rating.as_number()).unwrap(), rating);
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert_eq!(Rating::from_number(0), Err(RatingError::InvalidRating(0)));
        assert_eq!(Rating::from_number(5), Err(RatingError::InvalidRating(5)));
    }

    #[test]
    fn ratings_are_ordered() {
        assert!(Rating::Again < Rating::Hard);
        assert!(Rating::Hard < Rating::Good);
        assert!(Rating::Good < Rating::Easy);
    }

    #[test]
    fn success_is_good_or_easy() {
        assert!(!Rating::Again.is_success());
        assert!(!Rating::Hard.is_success());
        assert!(Rating::Good.is_success());
        assert!(Rating::Easy.is_success());
    }

    #[test]
    fn log_entry_captures_transition() {
        let id = CardId::generate();
        let entry = ReviewLogEntry::new(
            id,
            Rating::Good,
            fixed_now(),
            Stage::New,
            Stage::Learning,
            1,
        );

        assert_eq!(entry.card_id, id);
        assert_eq!(entry.previous_stage, Stage::New);
        assert_eq!(entry.new_stage, Stage::Learning);
        assert_eq!(entry.scheduled_days, 1);
    }
}

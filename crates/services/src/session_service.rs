use rand::seq::SliceRandom;
use tracing::debug;

use vocab_core::model::{Card, Rating};

use crate::card_service::CardService;
use crate::error::SessionError;

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    InProgress,
    Complete,
}

/// Per-session counters; one slot per rating plus the running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub total: usize,
    pub reviewed: usize,
    pub again: usize,
    pub hard: usize,
    pub good: usize,
    pub easy: usize,
}

impl SessionStats {
    fn for_total(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record(&mut self, rating: Rating) {
        self.reviewed += 1;
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }
}

//
// ─── REVIEW SESSION ────────────────────────────────────────────────────────────
//

/// One fixed pass over a snapshot of due cards.
///
/// Loading takes the due set at that moment, shuffles it once, and freezes
/// the permutation for the whole session; cards becoming due mid-session are
/// not injected. Ratings apply strictly in presentation order, and a failed
/// commit leaves the same card current so the learner can retry.
pub struct ReviewSession {
    service: CardService,
    cards: Vec<Card>,
    cursor: usize,
    phase: SessionPhase,
    stats: SessionStats,
}

impl ReviewSession {
    #[must_use]
    pub fn new(service: CardService) -> Self {
        Self {
            service,
            cards: Vec::new(),
            cursor: 0,
            phase: SessionPhase::Idle,
            stats: SessionStats::default(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Number of cards in the session snapshot.
    #[must_use]
    pub fn total(&self) -> usize {
        self.cards.len()
    }

    /// Cards not yet rated.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.cursor)
    }

    /// Percent of the session already worked through.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn progress(&self) -> u8 {
        if self.cards.is_empty() {
            return 0;
        }
        ((self.cursor as f64 / self.cards.len() as f64) * 100.0).round() as u8
    }

    /// The card awaiting a rating, if any.
    #[must_use]
    pub fn current_card(&self) -> Option<&Card> {
        self.cards.get(self.cursor)
    }

    /// A session only completes once every card of a non-empty snapshot has
    /// been rated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    /// Snapshots the due cards, shuffles them once, and resets the cursor and
    /// counters. On failure the session returns to `Idle` with nothing
    /// committed, and the caller can retry the load.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the due-card query fails.
    pub async fn load_due_cards(&mut self) -> Result<usize, SessionError> {
        self.phase = SessionPhase::Loading;

        let mut cards = match self.service.due_cards().await {
            Ok(cards) => cards,
            Err(err) => {
                self.clear();
                return Err(err.into());
            }
        };

        // One-time permutation; the order stays fixed for the whole session.
        cards.shuffle(&mut rand::rng());

        debug!(total = cards.len(), "review session loaded");
        self.stats = SessionStats::for_total(cards.len());
        self.cards = cards;
        self.cursor = 0;
        self.phase = SessionPhase::InProgress;
        Ok(self.cards.len())
    }

    /// Rates the current card. Returns `Ok(None)` when there is no current
    /// card (idle, empty or completed session).
    ///
    /// On success the matching counter and the cursor advance; on failure
    /// neither moves, so the same card remains current for a retry.
    ///
    /// # Errors
    ///
    /// Propagates commit failures from the card service, including
    /// `PartialCommit`.
    pub async fn rate(&mut self, rating: Rating) -> Result<Option<Card>, SessionError> {
        let Some(current) = self.cards.get(self.cursor) else {
            return Ok(None);
        };
        let id = current.id;

        let updated = self.service.review_card(&id, rating).await?;

        self.stats.record(rating);
        self.cursor += 1;
        if self.cursor >= self.cards.len() {
            self.phase = SessionPhase::Complete;
            debug!(reviewed = self.stats.reviewed, "review session complete");
        }
        Ok(Some(updated))
    }

    /// Clears all session state back to `Idle`, whether or not the pass was
    /// completed.
    pub fn reset(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.cards.clear();
        self.cursor = 0;
        self.stats = SessionStats::default();
        self.phase = SessionPhase::Idle;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

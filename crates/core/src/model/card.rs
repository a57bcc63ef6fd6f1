use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::CardId;
use crate::model::scheduling::SchedulingState;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("card front text cannot be empty")]
    EmptyFront,

    #[error("card back text cannot be empty")]
    EmptyBack,
}

//
// ─── TAG HELPERS ───────────────────────────────────────────────────────────────
//

/// Normalized form used for tag comparisons (trim + lowercase).
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Deduplicates tags case-insensitively, keeping the first spelling and the
/// insertion order. Blank tags are dropped.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for tag in tags {
        let normalized = normalize_tag(&tag);
        if normalized.is_empty() || seen.contains(&normalized) {
            continue;
        }
        seen.push(normalized);
        out.push(tag.trim().to_string());
    }
    out
}

//
// ─── CARD TYPES ────────────────────────────────────────────────────────────────
//

/// Payload for creating a new card. Id, timestamps and scheduling state are
/// assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardDraft {
    pub front: String,
    pub back: String,
    pub context: String,
    pub context_translation: String,
    pub tags: Vec<String>,
}

/// Metadata-only update for an existing card. `None` fields are left alone;
/// scheduling state is never touched by a patch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardPatch {
    pub front: Option<String>,
    pub back: Option<String>,
    pub context: Option<String>,
    pub context_translation: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A vocabulary flashcard with its scheduling state.
///
/// Invariants: `id` is immutable once assigned, `updated_at >= created_at`,
/// and tags are unique under case-insensitive comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: CardId,
    pub front: String,
    pub back: String,
    pub context: String,
    pub context_translation: String,
    pub tags: Vec<String>,
    pub scheduling: SchedulingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Builds a card from a draft with a fresh scheduling state.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the front or back text is blank.
    pub fn new(id: CardId, draft: CardDraft, now: DateTime<Utc>) -> Result<Self, CardError> {
        if draft.front.trim().is_empty() {
            return Err(CardError::EmptyFront);
        }
        if draft.back.trim().is_empty() {
            return Err(CardError::EmptyBack);
        }

        Ok(Self {
            id,
            front: draft.front,
            back: draft.back,
            context: draft.context,
            context_translation: draft.context_translation,
            tags: dedup_tags(draft.tags),
            scheduling: SchedulingState::new_card(now),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a metadata patch, bumping `updated_at`.
    pub fn apply_patch(&mut self, patch: CardPatch, now: DateTime<Utc>) {
        if let Some(front) = patch.front {
            self.front = front;
        }
        if let Some(back) = patch.back {
            self.back = back;
        }
        if let Some(context) = patch.context {
            self.context = context;
        }
        if let Some(translation) = patch.context_translation {
            self.context_translation = translation;
        }
        if let Some(tags) = patch.tags {
            self.tags = dedup_tags(tags);
        }
        self.updated_at = now;
    }

    /// Replaces the scheduling state after a committed review.
    pub fn apply_review(&mut self, next: SchedulingState, now: DateTime<Utc>) {
        self.scheduling = next;
        self.updated_at = now;
    }

    /// Case-insensitive tag membership test.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        let normalized = normalize_tag(tag);
        self.tags.iter().any(|t| normalize_tag(t) == normalized)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

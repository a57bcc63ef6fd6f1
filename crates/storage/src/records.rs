//! Serialized shapes for the persisted collections.
//!
//! The storage layer owns the wire format so the domain types stay free of
//! serde concerns. Timestamps serialize as RFC 3339 strings and lifecycle
//! stages as their string codes; ratings travel as their numeric 1–4 form so
//! that out-of-range values from old or hand-edited payloads can be dropped
//! at the boundary instead of poisoning analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use vocab_core::model::{Card, CardId, Rating, ReviewLogEntry, SchedulingState, Stage};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── SCHEDULING STATE ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SchedulingStateRecord {
    stage: String,
    due: DateTime<Utc>,
    stability: f64,
    difficulty: f64,
    reps: u32,
    lapses: u32,
    elapsed_days: f64,
    scheduled_days: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_review: Option<DateTime<Utc>>,
}

impl SchedulingStateRecord {
    fn from_state(state: &SchedulingState) -> Self {
        Self {
            stage: state.stage.as_str().to_string(),
            due: state.due,
            stability: state.stability,
            difficulty: state.difficulty,
            reps: state.reps,
            lapses: state.lapses,
            elapsed_days: state.elapsed_days,
            scheduled_days: state.scheduled_days,
            last_review: state.last_review,
        }
    }

    fn into_state(self) -> Result<SchedulingState, StorageError> {
        let stage: Stage = self.stage.parse().map_err(ser)?;
        Ok(SchedulingState {
            stage,
            due: self.due,
            stability: self.stability,
            difficulty: self.difficulty,
            reps: self.reps,
            lapses: self.lapses,
            elapsed_days: self.elapsed_days,
            scheduled_days: self.scheduled_days,
            last_review: self.last_review,
        })
    }
}

//
// ─── CARDS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CardRecord {
    id: CardId,
    front: String,
    back: String,
    context: String,
    context_translation: String,
    tags: Vec<String>,
    scheduling: SchedulingStateRecord,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CardRecord {
    pub(crate) fn from_card(card: &Card) -> Self {
        Self {
            id: card.id,
            front: card.front.clone(),
            back: card.back.clone(),
            context: card.context.clone(),
            context_translation: card.context_translation.clone(),
            tags: card.tags.clone(),
            scheduling: SchedulingStateRecord::from_state(&card.scheduling),
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }

    pub(crate) fn into_card(self) -> Result<Card, StorageError> {
        Ok(Card {
            id: self.id,
            front: self.front,
            back: self.back,
            context: self.context,
            context_translation: self.context_translation,
            tags: self.tags,
            scheduling: self.scheduling.into_state()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn encode_cards(cards: &[Card]) -> Result<String, StorageError> {
    let records: Vec<CardRecord> = cards.iter().map(CardRecord::from_card).collect();
    serde_json::to_string(&records).map_err(ser)
}

/// Decodes a cards payload, recovering from corruption by treating the whole
/// collection as empty (with a diagnostic) rather than failing the caller.
pub(crate) fn decode_cards(payload: &str) -> Vec<Card> {
    let records: Vec<CardRecord> = match serde_json::from_str(payload) {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "corrupt cards collection, treating as empty");
            return Vec::new();
        }
    };

    let mut cards = Vec::with_capacity(records.len());
    for record in records {
        match record.into_card() {
            Ok(card) => cards.push(card),
            Err(err) => {
                warn!(error = %err, "corrupt card record, treating collection as empty");
                return Vec::new();
            }
        }
    }
    cards
}

//
// ─── REVIEW LOGS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewLogRecord {
    card_id: CardId,
    rating: u8,
    reviewed_at: DateTime<Utc>,
    previous_stage: String,
    new_stage: String,
    scheduled_days: i64,
}

impl ReviewLogRecord {
    pub(crate) fn from_entry(entry: &ReviewLogEntry) -> Self {
        Self {
            card_id: entry.card_id,
            rating: entry.rating.as_number(),
            reviewed_at: entry.reviewed_at,
            previous_stage: entry.previous_stage.as_str().to_string(),
            new_stage: entry.new_stage.as_str().to_string(),
            scheduled_days: entry.scheduled_days,
        }
    }

    pub(crate) fn into_entry(self) -> Result<ReviewLogEntry, StorageError> {
        let rating = Rating::from_number(self.rating).map_err(ser)?;
        let previous_stage: Stage = self.previous_stage.parse().map_err(ser)?;
        let new_stage: Stage = self.new_stage.parse().map_err(ser)?;
        Ok(ReviewLogEntry {
            card_id: self.card_id,
            rating,
            reviewed_at: self.reviewed_at,
            previous_stage,
            new_stage,
            scheduled_days: self.scheduled_days,
        })
    }
}

pub(crate) fn encode_review_logs(entries: &[ReviewLogEntry]) -> Result<String, StorageError> {
    let records: Vec<ReviewLogRecord> = entries.iter().map(ReviewLogRecord::from_entry).collect();
    serde_json::to_string(&records).map_err(ser)
}

/// Decodes a review-log payload. A malformed payload yields an empty log;
/// individual entries with an out-of-range rating or unknown stage are
/// skipped so they never reach an analytics denominator.
pub(crate) fn decode_review_logs(payload: &str) -> Vec<ReviewLogEntry> {
    let records: Vec<ReviewLogRecord> = match serde_json::from_str(payload) {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "corrupt review-log collection, treating as empty");
            return Vec::new();
        }
    };

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        match record.into_entry() {
            Ok(entry) => entries.push(entry),
            Err(err) => warn!(error = %err, "skipping malformed review-log entry"),
        }
    }
    entries
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Export/import document: two named arrays, all timestamps as RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotRecord {
    pub cards: Vec<CardRecord>,
    pub reviews: Vec<ReviewLogRecord>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

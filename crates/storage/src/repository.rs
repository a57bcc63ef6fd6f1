use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use vocab_core::model::{Card, CardId, ReviewLogEntry};

use crate::records::{
    CardRecord, ReviewLogRecord, SnapshotRecord, decode_cards, decode_review_logs, encode_cards,
    encode_review_logs,
};

/// Fixed logical collection names in the backing key-value transport.
pub const CARDS_COLLECTION: &str = "vocab_cards";
pub const REVIEWS_COLLECTION: &str = "vocab_reviews";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors surfaced by storage backends and the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// The backing tier is out of space. Surfaced distinctly so callers can
    /// offer an alternative persistence tier instead of retrying blindly.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── TRANSPORT ─────────────────────────────────────────────────────────────────
//

/// Durable key-value transport: whole serialized collections addressed by a
/// fixed name. Backends only move strings; the `Store` owns the format.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn get(&self, collection: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, collection: &str, payload: &str) -> Result<(), StorageError>;

    async fn remove(&self, collection: &str) -> Result<(), StorageError>;
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Full backup of both collections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub cards: Vec<Card>,
    pub reviews: Vec<ReviewLogEntry>,
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

/// Durable store for the card and review-log collections.
///
/// Assumes a single writer per backing store: one live `Store` (clones share
/// the backend) per running process. Read-modify-write sequences such as
/// [`Store::append_review_log`] are atomic only with respect to callers on
/// this instance; no cross-process arbitration is attempted.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn CollectionStore>,
}

impl Store {
    #[must_use]
    pub fn new(backend: Arc<dyn CollectionStore>) -> Self {
        Self { backend }
    }

    /// Store over the in-memory backend, for tests and prototyping.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::memory::InMemoryBackend::new()))
    }

    // ── cards ──────────────────────────────────────────────────────────────

    /// Loads the full card collection.
    ///
    /// A missing or corrupt collection is treated as empty (with a logged
    /// diagnostic); only transport failures surface as errors.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport read fails.
    pub async fn load_cards(&self) -> Result<Vec<Card>, StorageError> {
        let payload = self.backend.get(CARDS_COLLECTION).await?;
        Ok(payload.as_deref().map(decode_cards).unwrap_or_default())
    }

    /// Replaces the full card collection.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the tier is full, or other
    /// transport/serialization errors.
    pub async fn save_all_cards(&self, cards: &[Card]) -> Result<(), StorageError> {
        let payload = encode_cards(cards)?;
        self.backend.set(CARDS_COLLECTION, &payload).await
    }

    /// Looks up a single card by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport read fails.
    pub async fn get_card(&self, id: &CardId) -> Result<Option<Card>, StorageError> {
        Ok(self.load_cards().await?.into_iter().find(|c| c.id == *id))
    }

    /// Inserts the card if its id is absent, otherwise replaces it in place,
    /// preserving the position of every other card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport fails.
    pub async fn upsert_card(&self, card: &Card) -> Result<(), StorageError> {
        let mut cards = self.load_cards().await?;
        match cards.iter_mut().find(|c| c.id == card.id) {
            Some(existing) => *existing = card.clone(),
            None => cards.push(card.clone()),
        }
        self.save_all_cards(&cards).await
    }

    /// Removes a card. Returns whether a card was actually deleted.
    ///
    /// Review-log entries keyed to the card are intentionally left in place;
    /// analytics tolerate entries referencing ids that no longer resolve.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport fails.
    pub async fn delete_card(&self, id: &CardId) -> Result<bool, StorageError> {
        let mut cards = self.load_cards().await?;
        let before = cards.len();
        cards.retain(|c| c.id != *id);
        if cards.len() == before {
            return Ok(false);
        }
        self.save_all_cards(&cards).await?;
        Ok(true)
    }

    // ── review logs ────────────────────────────────────────────────────────

    /// Loads the full review log. Missing or corrupt payloads yield an empty
    /// log; entries with unrecognized field values are skipped during decode.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport read fails.
    pub async fn load_review_logs(&self) -> Result<Vec<ReviewLogEntry>, StorageError> {
        let payload = self.backend.get(REVIEWS_COLLECTION).await?;
        Ok(payload
            .as_deref()
            .map(decode_review_logs)
            .unwrap_or_default())
    }

    /// Appends one entry to the review log.
    ///
    /// The new payload is fully serialized before the single transport write,
    /// so a failed append never clobbers previously stored entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the tier is full, or other
    /// transport/serialization errors.
    pub async fn append_review_log(&self, entry: &ReviewLogEntry) -> Result<(), StorageError> {
        let mut entries = self.load_review_logs().await?;
        entries.push(entry.clone());
        let payload = encode_review_logs(&entries)?;
        self.backend.set(REVIEWS_COLLECTION, &payload).await?;
        debug!(card_id = %entry.card_id, total = entries.len(), "review log appended");
        Ok(())
    }

    /// Replaces the full review log.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport fails.
    pub async fn replace_all_review_logs(
        &self,
        entries: &[ReviewLogEntry],
    ) -> Result<(), StorageError> {
        let payload = encode_review_logs(entries)?;
        self.backend.set(REVIEWS_COLLECTION, &payload).await
    }

    /// Review-log entries for one card, in stored (chronological) order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transport read fails.
    pub async fn review_logs_for_card(
        &self,
        id: &CardId,
    ) -> Result<Vec<ReviewLogEntry>, StorageError> {
        let mut entries = self.load_review_logs().await?;
        entries.retain(|e| e.card_id == *id);
        Ok(entries)
    }

    // ── export / import ────────────────────────────────────────────────────

    /// Snapshot of both collections.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a transport read fails.
    pub async fn export_all(&self) -> Result<Snapshot, StorageError> {
        Ok(Snapshot {
            cards: self.load_cards().await?,
            reviews: self.load_review_logs().await?,
        })
    }

    /// Fully replaces both collections from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a transport write fails.
    pub async fn import_all(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        self.save_all_cards(&snapshot.cards).await?;
        self.replace_all_review_logs(&snapshot.reviews).await
    }

    /// Pretty-printed JSON backup document with `cards` and `reviews` arrays.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a transport read or serialization fails.
    pub async fn export_json(&self) -> Result<String, StorageError> {
        let snapshot = self.export_all().await?;
        let record = SnapshotRecord {
            cards: snapshot.cards.iter().map(CardRecord::from_card).collect(),
            reviews: snapshot
                .reviews
                .iter()
                .map(ReviewLogRecord::from_entry)
                .collect(),
        };
        serde_json::to_string_pretty(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Restores both collections from a backup document. Import is strict: a
    /// malformed document is rejected as a whole rather than partially
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed documents, or
    /// transport errors from the writes.
    pub async fn import_json(&self, json: &str) -> Result<(), StorageError> {
        let record: SnapshotRecord =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut cards = Vec::with_capacity(record.cards.len());
        for card in record.cards {
            cards.push(card.into_card()?);
        }
        let mut reviews = Vec::with_capacity(record.reviews.len());
        for entry in record.reviews {
            reviews.push(entry.into_entry()?);
        }

        self.import_all(Snapshot { cards, reviews }).await
    }

    /// Removes both collections entirely.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a transport write fails.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        self.backend.remove(CARDS_COLLECTION).await?;
        self.backend.remove(REVIEWS_COLLECTION).await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use storage::repository::Store;
use vocab_core::model::{Card, CardDraft, CardId, CardPatch, Rating, ReviewLogEntry, normalize_tag};
use vocab_core::scheduler::Scheduler;
use vocab_core::time::Clock;

use crate::error::CardServiceError;
use crate::stats_service;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Matching mode for multi-tag queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilterMode {
    /// Cards carrying at least one of the tags.
    Any,
    /// Cards carrying every one of the tags.
    All,
}

/// Interval preview in whole days for each possible rating of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextIntervals {
    pub again: i64,
    pub hard: i64,
    pub good: i64,
    pub easy: i64,
}

/// Headline learner statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub reviewed_today: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_review: Option<DateTime<Utc>>,
}

/// CRUD and query surface over the card collection, and the single place
/// permitted to mutate scheduling state.
#[derive(Clone)]
pub struct CardService {
    clock: Clock,
    scheduler: Arc<Scheduler>,
    store: Store,
}

impl CardService {
    #[must_use]
    pub fn new(clock: Clock, scheduler: Arc<Scheduler>, store: Store) -> Self {
        Self {
            clock,
            scheduler,
            store,
        }
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── crud ───────────────────────────────────────────────────────────────

    /// Creates and persists a new card with a fresh id and scheduling state.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Card` for invalid drafts, or storage errors.
    pub async fn create(&self, draft: CardDraft) -> Result<Card, CardServiceError> {
        let card = Card::new(CardId::generate(), draft, self.clock.now())?;
        self.store.upsert_card(&card).await?;
        debug!(card_id = %card.id, "card created");
        Ok(card)
    }

    /// All cards in stored order.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn get_all(&self) -> Result<Vec<Card>, CardServiceError> {
        Ok(self.store.load_cards().await?)
    }

    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn get_by_id(&self, id: &CardId) -> Result<Option<Card>, CardServiceError> {
        Ok(self.store.get_card(id).await?)
    }

    /// Applies a metadata-only patch; scheduling state is untouched.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::CardNotFound` if the id does not resolve.
    pub async fn update(&self, id: &CardId, patch: CardPatch) -> Result<Card, CardServiceError> {
        let mut card = self
            .store
            .get_card(id)
            .await?
            .ok_or(CardServiceError::CardNotFound(*id))?;
        card.apply_patch(patch, self.clock.now());
        self.store.upsert_card(&card).await?;
        Ok(card)
    }

    /// Deletes a card, returning whether one was removed. Review-log entries
    /// for the card are kept (no cascade).
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store write fails.
    pub async fn delete(&self, id: &CardId) -> Result<bool, CardServiceError> {
        Ok(self.store.delete_card(id).await?)
    }

    // ── scheduling queries ─────────────────────────────────────────────────

    /// Cards due at the service clock's current time.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn due_cards(&self) -> Result<Vec<Card>, CardServiceError> {
        self.due_cards_at(self.clock.now()).await
    }

    /// Exactly the cards whose due instant has passed; due-ness is the only
    /// filter, so new, learning and review cards all qualify uniformly.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn due_cards_at(&self, now: DateTime<Utc>) -> Result<Vec<Card>, CardServiceError> {
        let mut cards = self.store.load_cards().await?;
        cards.retain(|c| c.scheduling.is_due(now));
        Ok(cards)
    }

    /// Cards that have never been reviewed.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn new_cards(&self) -> Result<Vec<Card>, CardServiceError> {
        let mut cards = self.store.load_cards().await?;
        cards.retain(|c| c.scheduling.is_new());
        Ok(cards)
    }

    /// Cards in the learning or relearning stage.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn learning_cards(&self) -> Result<Vec<Card>, CardServiceError> {
        let mut cards = self.store.load_cards().await?;
        cards.retain(|c| c.scheduling.is_learning());
        Ok(cards)
    }

    /// Graduated cards on long-term intervals.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn review_cards(&self) -> Result<Vec<Card>, CardServiceError> {
        let mut cards = self.store.load_cards().await?;
        cards.retain(|c| c.scheduling.is_review());
        Ok(cards)
    }

    /// Interval preview: days until the next due date for each rating.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::CardNotFound` if the id does not resolve,
    /// or scheduler errors.
    pub async fn next_intervals(&self, id: &CardId) -> Result<NextIntervals, CardServiceError> {
        let card = self
            .store
            .get_card(id)
            .await?
            .ok_or(CardServiceError::CardNotFound(*id))?;
        let states = self
            .scheduler
            .next_states(&card.scheduling, self.clock.now())?;
        let [again, hard, good, easy] = states.interval_days();
        Ok(NextIntervals {
            again,
            hard,
            good,
            easy,
        })
    }

    // ── review commit ──────────────────────────────────────────────────────

    /// Commits a rating at the service clock's current time.
    ///
    /// # Errors
    ///
    /// See [`CardService::review_card_at`].
    pub async fn review_card(
        &self,
        id: &CardId,
        rating: Rating,
    ) -> Result<Card, CardServiceError> {
        self.review_card_at(id, rating, self.clock.now()).await
    }

    /// Commits a rating: replaces the card's scheduling state via the
    /// scheduler, persists the card, then appends one review-log entry
    /// capturing the stage transition and the scheduled interval.
    ///
    /// The two writes form one logical transaction from the caller's point of
    /// view. If the log append fails after the card write succeeded, the
    /// distinct `PartialCommit` error carries the unpersisted entry so the
    /// caller can retry the append alone via
    /// [`CardService::retry_log_append`].
    ///
    /// # Errors
    ///
    /// - `CardNotFound` if the id does not resolve
    /// - `Scheduler` for scheduling failures (nothing was written)
    /// - `Storage` if the card write fails (nothing was written)
    /// - `PartialCommit` if only the log append failed
    pub async fn review_card_at(
        &self,
        id: &CardId,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<Card, CardServiceError> {
        let mut card = self
            .store
            .get_card(id)
            .await?
            .ok_or(CardServiceError::CardNotFound(*id))?;

        let previous_stage = card.scheduling.stage;
        let next = self.scheduler.commit(&card.scheduling, rating, now)?;
        card.apply_review(next, now);
        self.store.upsert_card(&card).await?;

        let entry = ReviewLogEntry::new(
            card.id,
            rating,
            now,
            previous_stage,
            card.scheduling.stage,
            whole_days_until(card.scheduling.due, now),
        );
        if let Err(source) = self.store.append_review_log(&entry).await {
            return Err(CardServiceError::PartialCommit {
                card_id: card.id,
                entry,
                source,
            });
        }

        debug!(
            card_id = %card.id,
            rating = rating.as_number(),
            stage = %card.scheduling.stage,
            "review committed"
        );
        Ok(card)
    }

    /// Re-attempts the log append from a `PartialCommit`. The card's
    /// scheduling state is already durable, so the scheduling is never
    /// re-run.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the append fails again.
    pub async fn retry_log_append(&self, entry: &ReviewLogEntry) -> Result<(), CardServiceError> {
        Ok(self.store.append_review_log(entry).await?)
    }

    // ── search and tags ────────────────────────────────────────────────────

    /// Case-insensitive substring search over front, back, context, context
    /// translation and tags.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn search(&self, query: &str) -> Result<Vec<Card>, CardServiceError> {
        let needle = query.to_lowercase();
        let mut cards = self.store.load_cards().await?;
        cards.retain(|card| {
            card.front.to_lowercase().contains(&needle)
                || card.back.to_lowercase().contains(&needle)
                || card.context.to_lowercase().contains(&needle)
                || card.context_translation.to_lowercase().contains(&needle)
                || card.tags.iter().any(|t| t.to_lowercase().contains(&needle))
        });
        Ok(cards)
    }

    /// Cards carrying the given tag (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn cards_by_tag(&self, tag: &str) -> Result<Vec<Card>, CardServiceError> {
        let mut cards = self.store.load_cards().await?;
        cards.retain(|c| c.has_tag(tag));
        Ok(cards)
    }

    /// Cards matching several tags at once, under the given mode.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn cards_by_tags(
        &self,
        tags: &[String],
        mode: TagFilterMode,
    ) -> Result<Vec<Card>, CardServiceError> {
        let mut cards = self.store.load_cards().await?;
        cards.retain(|card| match mode {
            TagFilterMode::Any => tags.iter().any(|t| card.has_tag(t)),
            TagFilterMode::All => tags.iter().all(|t| card.has_tag(t)),
        });
        Ok(cards)
    }

    /// Every distinct tag across the collection, sorted.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if the store read fails.
    pub async fn all_tags(&self) -> Result<Vec<String>, CardServiceError> {
        let cards = self.store.load_cards().await?;
        let mut seen = Vec::new();
        let mut tags = Vec::new();
        for card in &cards {
            for tag in &card.tags {
                let normalized = normalize_tag(tag);
                if !seen.contains(&normalized) {
                    seen.push(normalized);
                    tags.push(tag.clone());
                }
            }
        }
        tags.sort();
        Ok(tags)
    }

    // ── headline stats ─────────────────────────────────────────────────────

    /// Headline learner statistics: collection counts, today's activity and
    /// streaks.
    ///
    /// # Errors
    ///
    /// Returns `CardServiceError::Storage` if a store read fails.
    pub async fn user_stats(&self) -> Result<UserStats, CardServiceError> {
        let now = self.clock.now();
        let cards = self.store.load_cards().await?;
        let logs = self.store.load_review_logs().await?;

        let today = now.date_naive();
        let days = stats_service::activity_days(&logs);
        let (current_streak, longest_streak) = stats_service::compute_streaks(&days, today);
        let today_start = stats_service::day_start(today);

        Ok(UserStats {
            total_cards: cards.len(),
            due_cards: cards.iter().filter(|c| c.scheduling.is_due(now)).count(),
            new_cards: cards.iter().filter(|c| c.scheduling.is_new()).count(),
            learning_cards: cards.iter().filter(|c| c.scheduling.is_learning()).count(),
            reviewed_today: logs.iter().filter(|e| e.reviewed_at >= today_start).count(),
            current_streak,
            longest_streak,
            last_review: logs.iter().map(|e| e.reviewed_at).max(),
        })
    }
}

/// Whole-day distance between a due instant and the review moment.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn whole_days_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = due.signed_duration_since(now).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).round() as i64
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_core::model::Stage;
    use vocab_core::time::{fixed_clock, fixed_now};

    fn service() -> CardService {
        CardService::new(
            fixed_clock(),
            Arc::new(Scheduler::new()),
            Store::in_memory(),
        )
    }

    fn draft(front: &str, tags: &[&str]) -> CardDraft {
        CardDraft {
            front: front.to_string(),
            back: format!("{front} (it)"),
            context: String::new(),
            context_translation: String::new(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_assigns_fresh_scheduling_state() {
        let service = service();
        let card = service.create(draft("dog", &["Animals"])).await.unwrap();

        assert_eq!(card.scheduling.stage, Stage::New);
        assert_eq!(card.scheduling.reps, 0);
        assert_eq!(card.created_at, fixed_now());
        assert_eq!(
            service.get_by_id(&card.id).await.unwrap().unwrap(),
            card
        );
    }

    #[tokio::test]
    async fn review_commits_once_per_call() {
        let service = service();
        let card = service.create(draft("dog", &[])).await.unwrap();

        let updated = service.review_card(&card.id, Rating::Good).await.unwrap();
        assert_eq!(updated.scheduling.reps, card.scheduling.reps + 1);
        assert_eq!(updated.scheduling.last_review, Some(fixed_now()));

        let logs = service.store.review_logs_for_card(&card.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].previous_stage, Stage::New);
        assert_eq!(logs[0].new_stage, updated.scheduling.stage);
        assert_eq!(logs[0].rating, Rating::Good);
        assert!(logs[0].scheduled_days >= 1);
    }

    #[tokio::test]
    async fn review_unknown_card_is_not_found() {
        let service = service();
        let missing = CardId::generate();
        let err = service.review_card(&missing, Rating::Good).await.unwrap_err();
        assert!(matches!(err, CardServiceError::CardNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn due_cards_respect_the_boundary() {
        let service = service();
        let now = fixed_now();

        let due = service.create(draft("due", &[])).await.unwrap();
        let mut future = service.create(draft("future", &[])).await.unwrap();
        future.scheduling.due = now + chrono::Duration::seconds(1);
        service.store.upsert_card(&future).await.unwrap();

        let cards = service.due_cards_at(now).await.unwrap();
        let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![due.id]);

        // One second later the boundary has passed.
        let later = now + chrono::Duration::seconds(1);
        assert_eq!(service.due_cards_at(later).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_patches_metadata_without_touching_scheduling() {
        let service = service();
        let card = service.create(draft("dog", &["a"])).await.unwrap();
        let reviewed = service.review_card(&card.id, Rating::Good).await.unwrap();

        let patched = service
            .update(
                &card.id,
                CardPatch {
                    front: Some("the dog".to_string()),
                    ..CardPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(patched.front, "the dog");
        assert_eq!(patched.scheduling, reviewed.scheduling);
    }

    #[tokio::test]
    async fn search_matches_all_text_fields() {
        let service = service();
        service
            .create(CardDraft {
                front: "apple".to_string(),
                back: "mela".to_string(),
                context: "I eat an apple".to_string(),
                context_translation: "Mangio una mela".to_string(),
                tags: vec!["Fruit".to_string()],
            })
            .await
            .unwrap();
        service.create(draft("house", &[])).await.unwrap();

        assert_eq!(service.search("APPLE").await.unwrap().len(), 1);
        assert_eq!(service.search("mangio").await.unwrap().len(), 1);
        assert_eq!(service.search("fruit").await.unwrap().len(), 1);
        assert_eq!(service.search("zebra").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn tag_queries_support_any_and_all() {
        let service = service();
        service.create(draft("a", &["x", "y"])).await.unwrap();
        service.create(draft("b", &["x"])).await.unwrap();
        service.create(draft("c", &["z"])).await.unwrap();

        let tags = vec!["X".to_string(), "y".to_string()];
        assert_eq!(
            service
                .cards_by_tags(&tags, TagFilterMode::Any)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            service
                .cards_by_tags(&tags, TagFilterMode::All)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(service.cards_by_tag("x").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn all_tags_is_sorted_and_unique() {
        let service = service();
        service.create(draft("a", &["verbs", "Food"])).await.unwrap();
        service.create(draft("b", &["food", "animals"])).await.unwrap();

        let tags = service.all_tags().await.unwrap();
        assert_eq!(tags, vec!["Food", "animals", "verbs"]);
    }

    #[tokio::test]
    async fn next_intervals_previews_all_branches() {
        let service = service();
        let card = service.create(draft("dog", &[])).await.unwrap();

        let intervals = service.next_intervals(&card.id).await.unwrap();
        assert!(intervals.again >= 1);
        assert!(intervals.again <= intervals.hard);
        assert!(intervals.hard <= intervals.good);
        assert!(intervals.good <= intervals.easy);
    }
}

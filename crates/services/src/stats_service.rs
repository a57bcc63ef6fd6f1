use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use storage::repository::Store;
use vocab_core::model::{Card, CardId, Rating, ReviewLogEntry};
use vocab_core::time::Clock;

use crate::error::StatsError;

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Analytics tuning. The mastery threshold is the engine's only knob: a card
/// counts as mastered once it has graduated to review and its stability
/// reaches this many days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsConfig {
    pub mastered_stability_threshold: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            mastered_stability_threshold: 30.0,
        }
    }
}

//
// ─── RESULT TYPES ──────────────────────────────────────────────────────────────
//

/// Counts per rating value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingBreakdown {
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl RatingBreakdown {
    fn record(&mut self, rating: Rating) {
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }

    #[must_use]
    pub fn successful(&self) -> u32 {
        self.good + self.easy
    }
}

/// Per-rating share of the total, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingPercentages {
    pub again: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

/// Review activity of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: u32,
    pub ratings: RatingBreakdown,
}

/// Time-windowed daily review activity.
///
/// `average_per_day` divides by the window length, not by the number of days
/// that saw reviews; `days_with_reviews` carries the other denominator.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewHistory {
    pub total_reviews: usize,
    pub daily_activity: Vec<DailyActivity>,
    pub average_per_day: f64,
    pub days_with_reviews: usize,
    pub period_days: u32,
}

/// Success-rate metrics; success means the learner recalled the answer
/// (Good or Easy).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccuracyMetrics {
    pub accuracy_rate: f64,
    pub total_reviews: usize,
    pub rating_counts: RatingBreakdown,
    pub rating_percentages: RatingPercentages,
}

/// Rollup of one tag's card set and its review history.
#[derive(Debug, Clone, PartialEq)]
pub struct TagStatistics {
    pub tag: String,
    pub total_cards: usize,
    pub due_cards: usize,
    pub mastered_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub average_stability: f64,
    pub average_difficulty: f64,
    pub total_reviews: usize,
    pub accuracy_rate: f64,
}

/// Four mutually exclusive buckets; every card falls into exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MasteryDistribution {
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub mastered: usize,
}

/// Consecutive-day review streaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
    pub last_review: Option<DateTime<Utc>>,
}

/// Everything at once, for the stats dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedStats {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub mastered_cards: usize,
    pub reviewed_today: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_review: Option<DateTime<Utc>>,
    pub average_stability: f64,
    pub average_difficulty: f64,
    pub accuracy_rate: f64,
    pub total_reviews: usize,
    pub mastery_distribution: MasteryDistribution,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Read-side analytics over the full card collection and review log. Never
/// mutates anything.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    store: Store,
    config: StatsConfig,
}

impl StatsService {
    #[must_use]
    pub fn new(clock: Clock, store: Store) -> Self {
        Self::with_config(clock, store, StatsConfig::default())
    }

    #[must_use]
    pub fn with_config(clock: Clock, store: Store, config: StatsConfig) -> Self {
        Self {
            clock,
            store,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> StatsConfig {
        self.config
    }

    /// A card is mastered once it has graduated to review and its stability
    /// has reached the configured threshold.
    #[must_use]
    pub fn is_mastered(&self, card: &Card) -> bool {
        card.scheduling.is_review()
            && card.scheduling.stability >= self.config.mastered_stability_threshold
    }

    // ── simple counts ──────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn total_cards(&self) -> Result<usize, StatsError> {
        Ok(self.store.load_cards().await?.len())
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn due_count(&self, now: DateTime<Utc>) -> Result<usize, StatsError> {
        let cards = self.store.load_cards().await?;
        Ok(cards.iter().filter(|c| c.scheduling.is_due(now)).count())
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn mastered_count(&self) -> Result<usize, StatsError> {
        let cards = self.store.load_cards().await?;
        Ok(cards.iter().filter(|c| self.is_mastered(c)).count())
    }

    /// Entries logged since today's midnight.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn reviewed_today(&self) -> Result<usize, StatsError> {
        let logs = self.store.load_review_logs().await?;
        let today_start = day_start(self.clock.now().date_naive());
        Ok(logs.iter().filter(|e| e.reviewed_at >= today_start).count())
    }

    // ── history ────────────────────────────────────────────────────────────

    /// Daily activity for the last `days` days, windowed from the midnight of
    /// the cutoff day.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn review_history(&self, days: u32) -> Result<ReviewHistory, StatsError> {
        let logs = self.store.load_review_logs().await?;
        let now = self.clock.now();
        let cutoff = day_start((now - Duration::days(i64::from(days))).date_naive());

        let mut total_reviews = 0usize;
        let mut daily: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
        for entry in logs.iter().filter(|e| e.reviewed_at >= cutoff) {
            total_reviews += 1;
            let date = entry.reviewed_at.date_naive();
            let activity = daily.entry(date).or_insert_with(|| DailyActivity {
                date,
                count: 0,
                ratings: RatingBreakdown::default(),
            });
            activity.count += 1;
            activity.ratings.record(entry.rating);
        }

        #[allow(clippy::cast_precision_loss)]
        let average_per_day = if days == 0 {
            0.0
        } else {
            total_reviews as f64 / f64::from(days)
        };

        let daily_activity: Vec<DailyActivity> = daily.into_values().collect();
        Ok(ReviewHistory {
            total_reviews,
            days_with_reviews: daily_activity.len(),
            daily_activity,
            average_per_day,
            period_days: days,
        })
    }

    // ── accuracy ───────────────────────────────────────────────────────────

    /// Overall success rate, optionally restricted to the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn accuracy_rate(&self, days: Option<u32>) -> Result<AccuracyMetrics, StatsError> {
        let logs = self.store.load_review_logs().await?;
        let filtered: Vec<&ReviewLogEntry> = match days {
            Some(days) => {
                let cutoff = self.clock.now() - Duration::days(i64::from(days));
                logs.iter().filter(|e| e.reviewed_at >= cutoff).collect()
            }
            None => logs.iter().collect(),
        };
        Ok(accuracy_from(&filtered))
    }

    // ── tags ───────────────────────────────────────────────────────────────

    /// Per-tag rollups, sorted by descending card count. A card with several
    /// tags contributes to each of its tags' groups; review metrics only
    /// count log entries whose card still exists in the tag's card set.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if a store read fails.
    pub async fn stats_by_tag(&self) -> Result<Vec<TagStatistics>, StatsError> {
        let cards = self.store.load_cards().await?;
        let logs = self.store.load_review_logs().await?;
        let now = self.clock.now();

        let mut groups: BTreeMap<&str, Vec<&Card>> = BTreeMap::new();
        for card in &cards {
            for tag in &card.tags {
                groups.entry(tag.as_str()).or_default().push(card);
            }
        }

        let mut stats: Vec<TagStatistics> = Vec::with_capacity(groups.len());
        for (tag, tag_cards) in groups {
            let total_cards = tag_cards.len();

            #[allow(clippy::cast_precision_loss)]
            let denominator = total_cards as f64;
            let total_stability: f64 = tag_cards.iter().map(|c| c.scheduling.stability).sum();
            let total_difficulty: f64 = tag_cards.iter().map(|c| c.scheduling.difficulty).sum();

            let card_ids: HashSet<CardId> = tag_cards.iter().map(|c| c.id).collect();
            let tag_logs: Vec<&ReviewLogEntry> =
                logs.iter().filter(|e| card_ids.contains(&e.card_id)).collect();
            let successful = tag_logs.iter().filter(|e| e.rating.is_success()).count();

            #[allow(clippy::cast_precision_loss)]
            let accuracy_rate = if tag_logs.is_empty() {
                0.0
            } else {
                successful as f64 / tag_logs.len() as f64 * 100.0
            };

            stats.push(TagStatistics {
                tag: tag.to_string(),
                total_cards,
                due_cards: tag_cards
                    .iter()
                    .filter(|c| c.scheduling.is_due(now))
                    .count(),
                mastered_cards: tag_cards.iter().filter(|c| self.is_mastered(c)).count(),
                new_cards: tag_cards.iter().filter(|c| c.scheduling.is_new()).count(),
                learning_cards: tag_cards
                    .iter()
                    .filter(|c| c.scheduling.is_learning())
                    .count(),
                review_cards: tag_cards.iter().filter(|c| c.scheduling.is_review()).count(),
                average_stability: total_stability / denominator,
                average_difficulty: total_difficulty / denominator,
                total_reviews: tag_logs.len(),
                accuracy_rate,
            });
        }

        stats.sort_by(|a, b| b.total_cards.cmp(&a.total_cards));
        Ok(stats)
    }

    // ── mastery ────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn mastery_distribution(&self) -> Result<MasteryDistribution, StatsError> {
        let cards = self.store.load_cards().await?;
        Ok(self.mastery_from(&cards))
    }

    fn mastery_from(&self, cards: &[Card]) -> MasteryDistribution {
        let mut distribution = MasteryDistribution::default();
        for card in cards {
            if card.scheduling.is_new() {
                distribution.new += 1;
            } else if card.scheduling.is_learning() {
                distribution.learning += 1;
            } else if self.is_mastered(card) {
                distribution.mastered += 1;
            } else {
                distribution.review += 1;
            }
        }
        distribution
    }

    // ── streaks ────────────────────────────────────────────────────────────

    /// Current and longest consecutive-day streaks.
    ///
    /// The current streak counts backward from today; a day counts when it
    /// has at least one log entry. Today not having a review yet does not
    /// break an otherwise live streak; counting then starts from yesterday.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the store read fails.
    pub async fn streaks(&self) -> Result<StreakSummary, StatsError> {
        let logs = self.store.load_review_logs().await?;
        let days = activity_days(&logs);
        let (current, longest) = compute_streaks(&days, self.clock.now().date_naive());
        Ok(StreakSummary {
            current,
            longest,
            last_review: logs.iter().map(|e| e.reviewed_at).max(),
        })
    }

    // ── composed snapshot ──────────────────────────────────────────────────

    /// One snapshot composing every metric above.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if a store read fails.
    pub async fn detailed_stats(&self) -> Result<DetailedStats, StatsError> {
        let cards = self.store.load_cards().await?;
        let logs = self.store.load_review_logs().await?;
        let now = self.clock.now();
        let today = now.date_naive();

        let days = activity_days(&logs);
        let (current_streak, longest_streak) = compute_streaks(&days, today);
        let today_start = day_start(today);

        let total_cards = cards.len();
        #[allow(clippy::cast_precision_loss)]
        let (average_stability, average_difficulty) = if total_cards == 0 {
            (0.0, 0.0)
        } else {
            let stability: f64 = cards.iter().map(|c| c.scheduling.stability).sum();
            let difficulty: f64 = cards.iter().map(|c| c.scheduling.difficulty).sum();
            (stability / total_cards as f64, difficulty / total_cards as f64)
        };

        let accuracy = accuracy_from(&logs.iter().collect::<Vec<_>>());

        Ok(DetailedStats {
            total_cards,
            due_cards: cards.iter().filter(|c| c.scheduling.is_due(now)).count(),
            new_cards: cards.iter().filter(|c| c.scheduling.is_new()).count(),
            learning_cards: cards.iter().filter(|c| c.scheduling.is_learning()).count(),
            mastered_cards: cards.iter().filter(|c| self.is_mastered(c)).count(),
            reviewed_today: logs.iter().filter(|e| e.reviewed_at >= today_start).count(),
            current_streak,
            longest_streak,
            last_review: logs.iter().map(|e| e.reviewed_at).max(),
            average_stability,
            average_difficulty,
            accuracy_rate: accuracy.accuracy_rate,
            total_reviews: logs.len(),
            mastery_distribution: self.mastery_from(&cards),
        })
    }
}

//
// ─── HELPERS ───────────────────────────────────────────────────────────────────
//

/// Midnight of the given day, UTC.
pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always representable")
        .and_utc()
}

/// Calendar days containing at least one log entry.
pub(crate) fn activity_days(logs: &[ReviewLogEntry]) -> BTreeSet<NaiveDate> {
    logs.iter().map(|e| e.reviewed_at.date_naive()).collect()
}

/// Computes (current, longest) streaks over the given activity days.
pub(crate) fn compute_streaks(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> (u32, u32) {
    if days.is_empty() {
        return (0, 0);
    }

    let mut current = 0u32;
    let mut check = today;
    loop {
        if days.contains(&check) {
            current += 1;
        } else if current == 0 && check == today {
            // Grace day: today has no reviews yet, start from yesterday.
        } else {
            break;
        }
        match check.pred_opt() {
            Some(prev) => check = prev,
            None => break,
        }
    }

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for &day in days {
        run = match prev {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }

    (current, longest)
}

fn accuracy_from(logs: &[&ReviewLogEntry]) -> AccuracyMetrics {
    if logs.is_empty() {
        return AccuracyMetrics::default();
    }

    let mut counts = RatingBreakdown::default();
    for entry in logs {
        counts.record(entry.rating);
    }

    #[allow(clippy::cast_precision_loss)]
    let total = logs.len() as f64;
    let pct = |n: u32| f64::from(n) / total * 100.0;

    AccuracyMetrics {
        accuracy_rate: pct(counts.successful()),
        total_reviews: logs.len(),
        rating_counts: counts,
        rating_percentages: RatingPercentages {
            again: pct(counts.again),
            hard: pct(counts.hard),
            good: pct(counts.good),
            easy: pct(counts.easy),
        },
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_core::model::{CardDraft, Stage};
    use vocab_core::time::{fixed_clock, fixed_now};

    fn build_card(front: &str, tags: &[&str]) -> Card {
        Card::new(
            CardId::generate(),
            CardDraft {
                front: front.to_string(),
                back: format!("{front} (it)"),
                context: String::new(),
                context_translation: String::new(),
                tags: tags.iter().map(|t| (*t).to_string()).collect(),
            },
            fixed_now(),
        )
        .unwrap()
    }

    fn review_stage_card(front: &str, tags: &[&str], stability: f64) -> Card {
        let mut card = build_card(front, tags);
        card.scheduling.stage = Stage::Review;
        card.scheduling.stability = stability;
        card.scheduling.difficulty = 5.0;
        card.scheduling.reps = 3;
        card.scheduling.last_review = Some(fixed_now());
        card.scheduling.due = fixed_now() + Duration::days(stability as i64);
        card
    }

    fn log_at(card_id: CardId, rating: Rating, at: DateTime<Utc>) -> ReviewLogEntry {
        ReviewLogEntry::new(card_id, rating, at, Stage::Review, Stage::Review, 3)
    }

    async fn service_with(cards: &[Card], logs: &[ReviewLogEntry]) -> StatsService {
        let store = Store::in_memory();
        store.save_all_cards(cards).await.unwrap();
        store.replace_all_review_logs(logs).await.unwrap();
        StatsService::new(fixed_clock(), store)
    }

    #[tokio::test]
    async fn mastery_requires_review_stage_and_threshold() {
        let service = service_with(&[], &[]).await;

        let below = review_stage_card("a", &[], 29.9);
        let at = review_stage_card("b", &[], 30.0);
        let mut learning = review_stage_card("c", &[], 99.0);
        learning.scheduling.stage = Stage::Learning;

        assert!(!service.is_mastered(&below));
        assert!(service.is_mastered(&at));
        assert!(!service.is_mastered(&learning));
    }

    #[tokio::test]
    async fn accuracy_example_six_of_ten_is_sixty_percent() {
        let card = build_card("a", &[]);
        let mut logs = Vec::new();
        for rating in [
            Rating::Good,
            Rating::Good,
            Rating::Good,
            Rating::Easy,
            Rating::Easy,
            Rating::Easy,
            Rating::Again,
            Rating::Again,
            Rating::Hard,
            Rating::Hard,
        ] {
            logs.push(log_at(card.id, rating, fixed_now()));
        }

        let service = service_with(&[card], &logs).await;
        let metrics = service.accuracy_rate(None).await.unwrap();

        assert_eq!(metrics.total_reviews, 10);
        assert!((metrics.accuracy_rate - 60.0).abs() < f64::EPSILON);
        assert_eq!(metrics.rating_counts.good, 3);
        assert_eq!(metrics.rating_counts.easy, 3);
        assert!((metrics.rating_percentages.again - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn accuracy_of_empty_log_is_all_zero() {
        let service = service_with(&[], &[]).await;
        let metrics = service.accuracy_rate(None).await.unwrap();
        assert_eq!(metrics, AccuracyMetrics::default());
    }

    #[tokio::test]
    async fn accuracy_window_excludes_old_entries() {
        let card = build_card("a", &[]);
        let logs = vec![
            log_at(card.id, Rating::Again, fixed_now() - Duration::days(40)),
            log_at(card.id, Rating::Good, fixed_now() - Duration::days(1)),
        ];

        let service = service_with(&[card], &logs).await;

        let windowed = service.accuracy_rate(Some(7)).await.unwrap();
        assert_eq!(windowed.total_reviews, 1);
        assert!((windowed.accuracy_rate - 100.0).abs() < f64::EPSILON);

        let overall = service.accuracy_rate(None).await.unwrap();
        assert_eq!(overall.total_reviews, 2);
        assert!((overall.accuracy_rate - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn history_uses_the_window_not_active_days_as_denominator() {
        let card = build_card("a", &[]);
        let day = fixed_now() - Duration::days(2);
        let logs = vec![
            log_at(card.id, Rating::Good, day),
            log_at(card.id, Rating::Again, day + Duration::hours(2)),
            log_at(card.id, Rating::Easy, fixed_now()),
            // Outside the window entirely.
            log_at(card.id, Rating::Good, fixed_now() - Duration::days(60)),
        ];

        let service = service_with(&[card], &logs).await;
        let history = service.review_history(30).await.unwrap();

        assert_eq!(history.total_reviews, 3);
        assert_eq!(history.days_with_reviews, 2);
        assert_eq!(history.period_days, 30);
        assert!((history.average_per_day - 0.1).abs() < 1e-9);

        assert_eq!(history.daily_activity.len(), 2);
        assert!(history.daily_activity[0].date < history.daily_activity[1].date);
        assert_eq!(history.daily_activity[0].count, 2);
        assert_eq!(history.daily_activity[0].ratings.good, 1);
        assert_eq!(history.daily_activity[0].ratings.again, 1);
    }

    #[tokio::test]
    async fn tag_stats_count_multi_tag_cards_in_each_group() {
        let shared = build_card("shared", &["a", "b"]);
        let only_a = build_card("only-a", &["a"]);
        let logs = vec![
            log_at(shared.id, Rating::Good, fixed_now()),
            log_at(only_a.id, Rating::Again, fixed_now()),
        ];

        let service = service_with(&[shared.clone(), only_a], &logs).await;
        let stats = service.stats_by_tag().await.unwrap();

        assert_eq!(stats.len(), 2);
        // Descending by card count: "a" has 2 cards, "b" has 1.
        assert_eq!(stats[0].tag, "a");
        assert_eq!(stats[0].total_cards, 2);
        assert_eq!(stats[0].total_reviews, 2);
        assert!((stats[0].accuracy_rate - 50.0).abs() < f64::EPSILON);

        assert_eq!(stats[1].tag, "b");
        assert_eq!(stats[1].total_cards, 1);
        assert_eq!(stats[1].total_reviews, 1);
        assert!((stats[1].accuracy_rate - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn tag_stats_exclude_orphaned_log_entries() {
        let kept = build_card("kept", &["a"]);
        let deleted = build_card("deleted", &["a"]);
        let logs = vec![
            log_at(kept.id, Rating::Good, fixed_now()),
            log_at(deleted.id, Rating::Again, fixed_now()),
        ];

        // Only `kept` remains in the card set; `deleted`'s entry is orphaned.
        let service = service_with(&[kept], &logs).await;
        let stats = service.stats_by_tag().await.unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_reviews, 1);
        assert!((stats[0].accuracy_rate - 100.0).abs() < f64::EPSILON);

        // The orphan still counts toward global accuracy.
        let overall = service.accuracy_rate(None).await.unwrap();
        assert_eq!(overall.total_reviews, 2);
    }

    #[tokio::test]
    async fn mastery_distribution_buckets_are_exclusive() {
        let new = build_card("new", &[]);
        let mut learning = build_card("learning", &[]);
        learning.scheduling.stage = Stage::Relearning;
        let review = review_stage_card("review", &[], 10.0);
        let mastered = review_stage_card("mastered", &[], 45.0);

        let service = service_with(&[new, learning, review, mastered], &[]).await;
        let distribution = service.mastery_distribution().await.unwrap();

        assert_eq!(distribution.new, 1);
        assert_eq!(distribution.learning, 1);
        assert_eq!(distribution.review, 1);
        assert_eq!(distribution.mastered, 1);
    }

    #[test]
    fn streak_counts_consecutive_days_back_from_today() {
        let today = fixed_now().date_naive();
        let days: BTreeSet<NaiveDate> = [today, today.pred_opt().unwrap(), today.pred_opt().unwrap().pred_opt().unwrap()]
            .into_iter()
            .collect();

        assert_eq!(compute_streaks(&days, today), (3, 3));
    }

    #[test]
    fn streak_grace_day_spans_a_quiet_today() {
        let last_active = fixed_now().date_naive();
        let days: BTreeSet<NaiveDate> = [
            last_active,
            last_active.pred_opt().unwrap(),
            last_active.pred_opt().unwrap().pred_opt().unwrap(),
        ]
        .into_iter()
        .collect();

        // Today itself has no entries yet: still 3.
        let tomorrow = last_active.succ_opt().unwrap();
        assert_eq!(compute_streaks(&days, tomorrow), (3, 3));

        // Two quiet days: the streak is gone, longest survives.
        let day_after = tomorrow.succ_opt().unwrap();
        assert_eq!(compute_streaks(&days, day_after), (0, 3));
    }

    #[test]
    fn longest_streak_is_independent_of_today() {
        let today = fixed_now().date_naive();
        let mut days = BTreeSet::new();
        // A 4-day run far in the past, and a lone recent day.
        let start = today - Duration::days(100);
        for offset in 0..4 {
            days.insert(start + Duration::days(offset));
        }
        days.insert(today - Duration::days(3));

        assert_eq!(compute_streaks(&days, today), (0, 4));
    }

    #[test]
    fn empty_log_has_zero_streaks() {
        assert_eq!(
            compute_streaks(&BTreeSet::new(), fixed_now().date_naive()),
            (0, 0)
        );
    }

    #[tokio::test]
    async fn detailed_stats_compose_all_metrics() {
        let new = build_card("new", &[]);
        let mastered = review_stage_card("mastered", &[], 45.0);
        let logs = vec![
            log_at(mastered.id, Rating::Good, fixed_now()),
            log_at(mastered.id, Rating::Again, fixed_now() - Duration::days(1)),
        ];

        let service = service_with(&[new, mastered.clone()], &logs).await;
        let stats = service.detailed_stats().await.unwrap();

        assert_eq!(stats.total_cards, 2);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.mastered_cards, 1);
        assert_eq!(stats.reviewed_today, 1);
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.last_review, Some(fixed_now()));
        assert!((stats.accuracy_rate - 50.0).abs() < f64::EPSILON);
        assert!((stats.average_stability - 22.5).abs() < f64::EPSILON);
        assert_eq!(stats.mastery_distribution.mastered, 1);
        assert_eq!(stats.mastery_distribution.new, 1);
    }

    #[tokio::test]
    async fn due_count_and_totals() {
        let due = build_card("due", &[]);
        let mut future = build_card("future", &[]);
        future.scheduling.due = fixed_now() + Duration::days(1);

        let service = service_with(&[due, future], &[]).await;
        assert_eq!(service.total_cards().await.unwrap(), 2);
        assert_eq!(service.due_count(fixed_now()).await.unwrap(), 1);
        assert_eq!(service.mastered_count().await.unwrap(), 0);
    }
}

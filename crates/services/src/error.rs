//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use vocab_core::model::{CardError, CardId, ReviewLogEntry};
use vocab_core::scheduler::SchedulerError;

/// Errors emitted by `CardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CardServiceError {
    #[error("card not found: {0}")]
    CardNotFound(CardId),

    #[error(transparent)]
    Card(#[from] CardError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The card's scheduling state was durably updated but the review-log
    /// append failed, so the card and the log disagree. Retry only the
    /// append (the failed entry is carried here); re-running the scheduling
    /// would apply the rating twice.
    #[error("review log append failed after card {card_id} was updated")]
    PartialCommit {
        card_id: CardId,
        entry: ReviewLogEntry,
        #[source]
        source: StorageError,
    },
}

/// Errors emitted by `ReviewSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Card(#[from] CardServiceError),
}

/// Errors emitted by `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

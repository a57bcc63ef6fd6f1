#![forbid(unsafe_code)]

pub mod card_service;
pub mod error;
pub mod session_service;
pub mod stats_service;

pub use vocab_core::Clock;

pub use card_service::{CardService, NextIntervals, TagFilterMode, UserStats};
pub use error::{CardServiceError, SessionError, StatsError};
pub use session_service::{ReviewSession, SessionPhase, SessionStats};
pub use stats_service::{
    AccuracyMetrics, DailyActivity, DetailedStats, MasteryDistribution, RatingBreakdown,
    RatingPercentages, ReviewHistory, StatsConfig, StatsService, StreakSummary, TagStatistics,
};

//! Specific background job implementations.

pub mod weekly_ranking;

pub use weekly_ranking::{WeeklyRankingJob, WEEKLY_RANKING_JOB_ID};

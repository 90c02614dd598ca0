//! Local snapshot cache.
//!
//! Leaderboard, stats and progression are pure functions of the student
//! population and the grade ladder, so read-only commands can work from a
//! JSON snapshot instead of refetching. Snapshots are stale after the
//! configured TTL.
//!
//! Cached data types:
//! - Students (with their points)
//! - Grades

pub mod manager;

pub use manager::{CacheAges, CacheManager, CachedData};

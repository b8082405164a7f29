//! Per-user derived statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{HostRatingTally, UserId};

/// Reliability reported for a user with no completed or dropped sessions.
pub const DEFAULT_RELIABILITY: f64 = 100.0;

/// Derived statistics for one user, never authored directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserAggregate {
    pub user_id: UserId,
    /// Hosted groups that reached `completed`.
    pub sessions_hosted: i64,
    /// Memberships currently `joined`.
    pub sessions_attended: i64,
    /// `joined` memberships on completed groups.
    pub sessions_completed: i64,
    /// Memberships currently `left` or `removed`.
    pub sessions_dropped: i64,
    pub reliability_score: f64,
    pub host_ratings: HostRatingTally,
    pub avg_host_rating: Option<f64>,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserAggregate {
    /// Aggregate of a user with no recorded activity.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            sessions_hosted: 0,
            sessions_attended: 0,
            sessions_completed: 0,
            sessions_dropped: 0,
            reliability_score: DEFAULT_RELIABILITY,
            host_ratings: HostRatingTally::default(),
            avg_host_rating: None,
            current_streak: 0,
            longest_streak: 0,
            updated_at: None,
        }
    }

    /// Whether every counter is zero, as for a user with no stats row.
    pub fn is_empty(&self) -> bool {
        self.sessions_hosted == 0
            && self.sessions_attended == 0
            && self.sessions_completed == 0
            && self.sessions_dropped == 0
            && self.host_ratings == HostRatingTally::default()
            && self.current_streak == 0
            && self.longest_streak == 0
    }
}

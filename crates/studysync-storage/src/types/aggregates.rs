//! Stored shapes of the incrementally maintained rating tallies.
//!
//! Tallies hold integer sums and counts so that applying a sequence of deltas
//! and summing the full detail set land on exactly the same numbers.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// Sums and counts behind a group's rating averages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingTally {
    /// Number of rating rows (`total_ratings`).
    pub count: i64,
    pub overall_sum: i64,
    /// Ratings that carry a productivity score.
    pub productivity_count: i64,
    pub productivity_sum: i64,
}

impl RatingTally {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for RatingTally {
    type Output = RatingTally;

    fn add(self, rhs: RatingTally) -> RatingTally {
        RatingTally {
            count: self.count + rhs.count,
            overall_sum: self.overall_sum + rhs.overall_sum,
            productivity_count: self.productivity_count + rhs.productivity_count,
            productivity_sum: self.productivity_sum + rhs.productivity_sum,
        }
    }
}

impl Neg for RatingTally {
    type Output = RatingTally;

    fn neg(self) -> RatingTally {
        RatingTally {
            count: -self.count,
            overall_sum: -self.overall_sum,
            productivity_count: -self.productivity_count,
            productivity_sum: -self.productivity_sum,
        }
    }
}

impl Sub for RatingTally {
    type Output = RatingTally;

    fn sub(self, rhs: RatingTally) -> RatingTally {
        self + (-rhs)
    }
}

/// Sums and counts behind a host's average host rating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRatingTally {
    pub count: i64,
    pub sum: i64,
}

impl HostRatingTally {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for HostRatingTally {
    type Output = HostRatingTally;

    fn add(self, rhs: HostRatingTally) -> HostRatingTally {
        HostRatingTally {
            count: self.count + rhs.count,
            sum: self.sum + rhs.sum,
        }
    }
}

impl Sub for HostRatingTally {
    type Output = HostRatingTally;

    fn sub(self, rhs: HostRatingTally) -> HostRatingTally {
        HostRatingTally {
            count: self.count - rhs.count,
            sum: self.sum - rhs.sum,
        }
    }
}

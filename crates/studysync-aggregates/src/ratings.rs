use serde::{Deserialize, Serialize};
use studysync_storage::{HostRatingTally, Rating, RatingTally};

use crate::mean;

/// Averages exposed on a group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRatingAggregate {
    pub avg_rating: Option<f64>,
    pub avg_productivity: Option<f64>,
    pub total_ratings: i64,
}

impl From<RatingTally> for GroupRatingAggregate {
    fn from(tally: RatingTally) -> Self {
        Self {
            avg_rating: mean(tally.overall_sum, tally.count),
            avg_productivity: mean(tally.productivity_sum, tally.productivity_count),
            total_ratings: tally.count,
        }
    }
}

/// Host-rating averages exposed on a user aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostRatingAggregate {
    pub avg_host_rating: Option<f64>,
    pub total_host_ratings: i64,
}

impl From<HostRatingTally> for HostRatingAggregate {
    fn from(tally: HostRatingTally) -> Self {
        Self {
            avg_host_rating: mean(tally.sum, tally.count),
            total_host_ratings: tally.count,
        }
    }
}

/// What a single rating row adds to its group's tally.
/// A null productivity score is left out of the productivity mean only.
pub fn rating_contribution(rating: &Rating) -> RatingTally {
    let productivity = rating.productivity_rating.map(i64::from);
    RatingTally {
        count: 1,
        overall_sum: i64::from(rating.overall_rating),
        productivity_count: i64::from(productivity.is_some()),
        productivity_sum: productivity.unwrap_or(0),
    }
}

/// Incremental change to a group's tally when `new` replaces `old`
/// (or is inserted, when `old` is `None`).
pub fn rating_tally_delta(old: Option<&Rating>, new: &Rating) -> RatingTally {
    let before = old.map(rating_contribution).unwrap_or_default();
    rating_contribution(new) - before
}

/// Bulk tally over every rating of a group.
pub fn group_rating_tally(ratings: &[Rating]) -> RatingTally {
    ratings
        .iter()
        .map(rating_contribution)
        .fold(RatingTally::default(), |acc, t| acc + t)
}

/// Averages and count over every rating of a group.
pub fn group_rating_aggregate(ratings: &[Rating]) -> GroupRatingAggregate {
    group_rating_tally(ratings).into()
}

/// What a single rating adds to its host's tally (nothing without a host score).
pub fn host_rating_contribution(rating: &Rating) -> HostRatingTally {
    match rating.host_rating {
        Some(score) => HostRatingTally {
            count: 1,
            sum: i64::from(score),
        },
        None => HostRatingTally::default(),
    }
}

/// Incremental change to the host's tally when `new` replaces `old`.
pub fn host_rating_delta(old: Option<&Rating>, new: &Rating) -> HostRatingTally {
    let before = old.map(host_rating_contribution).unwrap_or_default();
    host_rating_contribution(new) - before
}

/// Bulk tally over the ratings of every group a user hosts.
pub fn host_rating_tally(ratings: &[Rating]) -> HostRatingTally {
    ratings
        .iter()
        .map(host_rating_contribution)
        .fold(HostRatingTally::default(), |acc, t| acc + t)
}

pub fn host_rating_aggregate(ratings: &[Rating]) -> HostRatingAggregate {
    host_rating_tally(ratings).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use studysync_storage::{GroupId, RatingId, UserId};

    fn rating(overall: i16, productivity: Option<i16>, host: Option<i16>) -> Rating {
        let now = Utc::now();
        Rating {
            id: RatingId::new(),
            group_id: GroupId::new(),
            rater_id: UserId::new(),
            overall_rating: overall,
            productivity_rating: productivity,
            host_rating: host,
            comment: None,
            edit_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_group_has_no_averages() {
        let agg = group_rating_aggregate(&[]);
        assert_eq!(agg.avg_rating, None);
        assert_eq!(agg.avg_productivity, None);
        assert_eq!(agg.total_ratings, 0);
    }

    #[test]
    fn test_null_productivity_excluded_from_that_mean_only() {
        let first = rating(4, None, None);
        let agg = group_rating_aggregate(std::slice::from_ref(&first));
        assert_eq!(agg.avg_rating, Some(4.0));
        assert_eq!(agg.avg_productivity, None);
        assert_eq!(agg.total_ratings, 1);

        let second = rating(2, Some(3), None);
        let agg = group_rating_aggregate(&[first, second]);
        assert_eq!(agg.avg_rating, Some(3.0));
        assert_eq!(agg.avg_productivity, Some(3.0));
        assert_eq!(agg.total_ratings, 2);
    }

    #[test]
    fn test_incremental_matches_bulk() {
        let mut ratings = Vec::new();
        let mut running = RatingTally::default();
        let scores = [
            (5, Some(4)),
            (1, None),
            (3, Some(2)),
            (4, Some(5)),
            (2, None),
            (5, Some(1)),
            (3, Some(3)),
        ];
        for (overall, productivity) in scores {
            let r = rating(overall, productivity, None);
            running = running + rating_tally_delta(None, &r);
            ratings.push(r);

            let bulk = group_rating_aggregate(&ratings);
            let incremental = GroupRatingAggregate::from(running);
            assert_eq!(bulk, incremental);
        }

        // edit one row in place
        let mut edited = ratings[1].clone();
        edited.overall_rating = 5;
        edited.productivity_rating = Some(4);
        edited.edit_count = 1;
        running = running + rating_tally_delta(Some(&ratings[1]), &edited);
        ratings[1] = edited;
        assert_eq!(group_rating_tally(&ratings), running);
    }

    #[test]
    fn test_host_ratings_skip_nulls() {
        let ratings = vec![
            rating(4, None, Some(5)),
            rating(3, None, None),
            rating(2, None, Some(2)),
        ];
        let agg = host_rating_aggregate(&ratings);
        assert_eq!(agg.total_host_ratings, 2);
        assert_eq!(agg.avg_host_rating, Some(3.5));
    }

    #[test]
    fn test_host_delta_on_edit() {
        let before = rating(4, None, None);
        let mut after = before.clone();
        after.host_rating = Some(4);
        assert_eq!(
            host_rating_delta(Some(&before), &after),
            HostRatingTally { count: 1, sum: 4 }
        );
        assert_eq!(
            host_rating_delta(Some(&after), &before),
            HostRatingTally { count: -1, sum: -4 }
        );
    }
}

use std::collections::HashMap;

use studysync_storage::{
    Group, GroupId, GroupStatus, Membership, MembershipStatus, Rating, RatingTally,
    UserAggregate, UserId, DEFAULT_RELIABILITY,
};

use crate::{group_rating_tally, host_rating_tally, mean, streaks};

/// Share of finished commitments a user saw through, in percent.
pub fn reliability_score(completed: i64, dropped: i64) -> f64 {
    let total = completed + dropped;
    if total <= 0 {
        DEFAULT_RELIABILITY
    } else {
        100.0 * completed as f64 / total as f64
    }
}

/// Derived group fields recomputed from detail rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupRecount {
    pub current_members: i32,
    pub ratings: RatingTally,
}

/// Bulk recount of a group from its memberships and ratings.
pub fn recompute_group(memberships: &[Membership], ratings: &[Rating]) -> GroupRecount {
    let current_members = memberships
        .iter()
        .filter(|m| m.status == MembershipStatus::Joined)
        .count() as i32;
    GroupRecount {
        current_members,
        ratings: group_rating_tally(ratings),
    }
}

/// Bulk recount of one user's aggregate.
///
/// `memberships` are the user's own rows, `groups` must contain every group
/// they reference or host (tombstoned ones included), and `host_ratings` are
/// the ratings left on groups the user hosts.
pub fn recompute_user_aggregate(
    user_id: UserId,
    memberships: &[Membership],
    groups: &HashMap<GroupId, Group>,
    host_ratings: &[Rating],
) -> UserAggregate {
    let mut agg = UserAggregate::empty(user_id);
    let mut completed_dates = Vec::new();

    for m in memberships.iter().filter(|m| m.user_id == user_id) {
        if m.status.is_dropped() {
            agg.sessions_dropped += 1;
        }
        if m.status != MembershipStatus::Joined {
            continue;
        }
        agg.sessions_attended += 1;
        if let Some(group) = groups.get(&m.group_id) {
            if group.status == GroupStatus::Completed {
                agg.sessions_completed += 1;
                completed_dates.push(group.session_date);
            }
        }
    }

    agg.sessions_hosted = groups
        .values()
        .filter(|g| g.host_id == user_id && g.status == GroupStatus::Completed)
        .count() as i64;

    agg.reliability_score = reliability_score(agg.sessions_completed, agg.sessions_dropped);
    agg.host_ratings = host_rating_tally(host_ratings);
    agg.avg_host_rating = mean(agg.host_ratings.sum, agg.host_ratings.count);

    let runs = streaks(&completed_dates);
    agg.current_streak = runs.current;
    agg.longest_streak = runs.longest;
    agg
}

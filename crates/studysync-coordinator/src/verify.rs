//! Consistency verifier: recount every derived field from detail rows and
//! report where the stored value disagrees.
//!
//! Verification never writes. [`Coordinator::repair`] overwrites the drifted
//! aggregates with the recounted values and reports what it changed.

use std::collections::HashMap;
use std::fmt;

use studysync_aggregates::{mean, recompute_group, recompute_user_aggregate};
use studysync_storage::{
    Group, GroupFilter, GroupId, RatingTally, Store, StoreError, UserAggregate, UserId,
};
use tracing::{info, warn};

use crate::{Coordinator, CoordinatorError};

/// Averages are compared with this tolerance.
const FLOAT_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyScope {
    All,
    Group(GroupId),
    User(UserId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Group(GroupId),
    User(UserId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Group(id) => write!(f, "group {id}"),
            EntityRef::User(id) => write!(f, "user {id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue {
    Count(i64),
    Real(Option<f64>),
}

impl FieldValue {
    fn agrees_with(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Count(a), FieldValue::Count(b)) => a == b,
            (FieldValue::Real(Some(a)), FieldValue::Real(Some(b))) => {
                (a - b).abs() <= FLOAT_TOLERANCE
            }
            (FieldValue::Real(None), FieldValue::Real(None)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Real(Some(x)) => write!(f, "{x}"),
            FieldValue::Real(None) => f.write_str("null"),
        }
    }
}

/// One stored field that does not match its recount.
#[derive(Clone, Debug, PartialEq)]
pub struct Discrepancy {
    pub entity: EntityRef,
    pub field: &'static str,
    pub stored: FieldValue,
    pub recomputed: FieldValue,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: stored {}, recomputed {}",
            self.entity, self.field, self.stored, self.recomputed
        )
    }
}

fn diff(
    entity: EntityRef,
    pairs: Vec<(&'static str, FieldValue, FieldValue)>,
) -> Vec<Discrepancy> {
    pairs
        .into_iter()
        .filter(|(_, stored, recomputed)| !stored.agrees_with(recomputed))
        .map(|(field, stored, recomputed)| Discrepancy {
            entity,
            field,
            stored,
            recomputed,
        })
        .collect()
}

fn group_fields(
    current_members: i32,
    tally: &RatingTally,
    avg_rating: Option<f64>,
    avg_productivity: Option<f64>,
) -> [(&'static str, FieldValue); 7] {
    [
        ("current_members", FieldValue::Count(current_members.into())),
        ("total_ratings", FieldValue::Count(tally.count)),
        ("rating_sum", FieldValue::Count(tally.overall_sum)),
        ("productivity_count", FieldValue::Count(tally.productivity_count)),
        ("productivity_sum", FieldValue::Count(tally.productivity_sum)),
        ("avg_rating", FieldValue::Real(avg_rating)),
        ("avg_productivity", FieldValue::Real(avg_productivity)),
    ]
}

fn user_fields(agg: &UserAggregate) -> [(&'static str, FieldValue); 10] {
    [
        ("sessions_hosted", FieldValue::Count(agg.sessions_hosted)),
        ("sessions_attended", FieldValue::Count(agg.sessions_attended)),
        ("sessions_completed", FieldValue::Count(agg.sessions_completed)),
        ("sessions_dropped", FieldValue::Count(agg.sessions_dropped)),
        ("reliability_score", FieldValue::Real(Some(agg.reliability_score))),
        ("total_host_ratings", FieldValue::Count(agg.host_ratings.count)),
        ("host_rating_sum", FieldValue::Count(agg.host_ratings.sum)),
        ("avg_host_rating", FieldValue::Real(agg.avg_host_rating)),
        ("current_streak", FieldValue::Count(agg.current_streak.into())),
        ("longest_streak", FieldValue::Count(agg.longest_streak.into())),
    ]
}

fn zip_fields<const N: usize>(
    stored: [(&'static str, FieldValue); N],
    recomputed: [(&'static str, FieldValue); N],
) -> Vec<(&'static str, FieldValue, FieldValue)> {
    stored
        .into_iter()
        .zip(recomputed)
        .map(|((field, s), (_, r))| (field, s, r))
        .collect()
}

struct GroupCheck {
    current_members: i32,
    tally: RatingTally,
    discrepancies: Vec<Discrepancy>,
}

struct UserCheck {
    stored: UserAggregate,
    recomputed: UserAggregate,
    discrepancies: Vec<Discrepancy>,
}

impl<S: Store> Coordinator<S> {
    /// Recount derived fields in `scope` and list every mismatch.
    ///
    /// Read-only and restartable: running it again over the same scope
    /// reports the same drift until something repairs it.
    pub async fn verify_consistency(
        &self,
        scope: VerifyScope,
    ) -> Result<Vec<Discrepancy>, CoordinatorError> {
        let mut found = Vec::new();
        for check in self.check_groups(scope).await? {
            found.extend(check.discrepancies);
        }
        for check in self.check_users(scope).await? {
            found.extend(check.discrepancies);
        }
        if found.is_empty() {
            info!(?scope, "aggregates consistent");
        } else {
            warn!(?scope, discrepancies = found.len(), "aggregate drift detected");
        }
        Ok(found)
    }

    /// Overwrite drifted aggregates in `scope` with their recounts.
    ///
    /// Groups are recounted under their lock. A user row is only overwritten
    /// if no commit touched it since it was read; otherwise the recount is
    /// redone through the retry policy.
    ///
    /// Returns the discrepancies that were corrected.
    pub async fn repair(&self, scope: VerifyScope) -> Result<Vec<Discrepancy>, CoordinatorError> {
        let mut fixed = Vec::new();

        for group_id in self.scoped_groups(scope).await?.into_keys() {
            let _guard = self.locks.lock(&group_id).await;
            let group = self.store.get_group_including_deleted(&group_id).await?;
            let check = self.check_group(&group).await?;
            if check.discrepancies.is_empty() {
                continue;
            }
            self.store
                .overwrite_group_aggregate(&group_id, check.current_members, &check.tally)
                .await?;
            info!(
                group_id = %group_id,
                fields = check.discrepancies.len(),
                "group aggregate repaired"
            );
            fixed.extend(check.discrepancies);
        }

        for user_id in self.scoped_users(scope).await? {
            let check = self
                .settings
                .retry
                .run("repair_user", move || async move {
                    let check = self.check_user(user_id).await?;
                    if !check.discrepancies.is_empty() {
                        self.store
                            .overwrite_user_aggregate(&check.stored, &check.recomputed)
                            .await?;
                    }
                    Ok::<_, CoordinatorError>(check)
                })
                .await?;
            if check.discrepancies.is_empty() {
                continue;
            }
            info!(
                user_id = %user_id,
                fields = check.discrepancies.len(),
                "user aggregate repaired"
            );
            fixed.extend(check.discrepancies);
        }

        Ok(fixed)
    }

    /// Every group the scope touches, tombstoned ones included.
    async fn scoped_groups(
        &self,
        scope: VerifyScope,
    ) -> Result<HashMap<GroupId, Group>, CoordinatorError> {
        let groups = match scope {
            VerifyScope::All => self.store.list_groups(&GroupFilter::everything()).await?,
            VerifyScope::Group(id) => vec![self.store.get_group_including_deleted(&id).await?],
            VerifyScope::User(_) => Vec::new(),
        };
        Ok(groups.into_iter().map(|g| (g.id, g)).collect())
    }

    async fn scoped_users(&self, scope: VerifyScope) -> Result<Vec<UserId>, CoordinatorError> {
        Ok(match scope {
            VerifyScope::All => self.store.list_known_users().await?,
            VerifyScope::User(id) => vec![id],
            VerifyScope::Group(_) => Vec::new(),
        })
    }

    async fn check_groups(&self, scope: VerifyScope) -> Result<Vec<GroupCheck>, CoordinatorError> {
        let mut checks = Vec::new();
        for group in self.scoped_groups(scope).await?.values() {
            checks.push(self.check_group(group).await?);
        }
        Ok(checks)
    }

    async fn check_group(&self, group: &Group) -> Result<GroupCheck, CoordinatorError> {
        let memberships = self.store.list_group_memberships(&group.id).await?;
        let ratings = self.store.list_group_ratings(&group.id).await?;
        let recount = recompute_group(&memberships, &ratings);

        let stored = group_fields(
            group.current_members,
            &group.rating_tally,
            group.avg_rating,
            group.avg_productivity,
        );
        let recomputed = group_fields(
            recount.current_members,
            &recount.ratings,
            mean(recount.ratings.overall_sum, recount.ratings.count),
            mean(recount.ratings.productivity_sum, recount.ratings.productivity_count),
        );
        Ok(GroupCheck {
            current_members: recount.current_members,
            tally: recount.ratings,
            discrepancies: diff(EntityRef::Group(group.id), zip_fields(stored, recomputed)),
        })
    }

    async fn check_users(&self, scope: VerifyScope) -> Result<Vec<UserCheck>, CoordinatorError> {
        let users = self.scoped_users(scope).await?;
        let mut checks = Vec::with_capacity(users.len());
        for user_id in users {
            checks.push(self.check_user(user_id).await?);
        }
        Ok(checks)
    }

    async fn check_user(&self, user_id: UserId) -> Result<UserCheck, CoordinatorError> {
        // stored row first: a commit landing after this read changes its
        // counters, so a repair based on this recount is refused
        let stored = match self.store.get_user_aggregate(&user_id).await {
            Ok(agg) => agg,
            Err(StoreError::NotFound) => UserAggregate::empty(user_id),
            Err(e) => return Err(e.into()),
        };

        let memberships = self.store.list_user_memberships(&user_id).await?;
        let host_ratings = self.store.list_host_ratings(&user_id).await?;
        let hosted = GroupFilter {
            host_id: Some(user_id),
            include_deleted: true,
        };
        let mut groups: HashMap<GroupId, Group> = self
            .store
            .list_groups(&hosted)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        for m in &memberships {
            if !groups.contains_key(&m.group_id) {
                let group = self.store.get_group_including_deleted(&m.group_id).await?;
                groups.insert(group.id, group);
            }
        }
        let recomputed = recompute_user_aggregate(user_id, &memberships, &groups, &host_ratings);

        let discrepancies = diff(
            EntityRef::User(user_id),
            zip_fields(user_fields(&stored), user_fields(&recomputed)),
        );
        Ok(UserCheck {
            stored,
            recomputed,
            discrepancies,
        })
    }
}

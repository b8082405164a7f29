//! The Store trait that backends implement.

use crate::types::*;
use crate::StoreError;

/// Durable, transactional record store the coordinator depends on.
///
/// Detail rows (memberships, ratings) are only written through the `commit_*`
/// methods, each of which is one unit of work: the detail rows and every
/// aggregate they feed commit or roll back together. Read paths never return
/// tombstoned groups unless a filter asks for them.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Groups ─────────────────────────────────────────

    /// Create a group in `draft` with empty aggregates.
    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError>;

    /// Get a live (not tombstoned) group by ID.
    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError>;

    /// Get a group by ID, tombstoned or not.
    async fn get_group_including_deleted(&self, group_id: &GroupId) -> Result<Group, StoreError>;

    /// List groups matching a filter, ordered by ID.
    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError>;

    /// Move a group along its lifecycle if its stored status still equals `change.from`.
    /// Completing a group also credits the host and every joined member.
    async fn commit_group_status(&self, change: &GroupStatusChange) -> Result<Group, StoreError>;

    /// Tombstone a draft or cancelled group.
    async fn soft_delete_group(&self, group_id: &GroupId) -> Result<(), StoreError>;

    // ─────────────────────────────────── Memberships ──────────────────────────────────────

    /// Get the membership for a (group, user) pair.
    async fn get_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError>;

    /// List all memberships of a group, ordered by creation.
    async fn list_group_memberships(&self, group_id: &GroupId)
        -> Result<Vec<Membership>, StoreError>;

    /// List all memberships held by a user, across groups.
    async fn list_user_memberships(&self, user_id: &UserId) -> Result<Vec<Membership>, StoreError>;

    /// Apply membership writes and the resulting member-count and user-aggregate
    /// deltas atomically. Fails with `CapacityExceeded` if the net delta would
    /// push `current_members` outside `0..=max_members`.
    async fn commit_memberships(&self, commit: &MembershipCommit) -> Result<Group, StoreError>;

    // ───────────────────────────────────── Ratings ────────────────────────────────────────

    /// Get a rater's rating for a group.
    async fn get_rating(&self, group_id: &GroupId, rater_id: &UserId)
        -> Result<Rating, StoreError>;

    /// List all ratings of a group.
    async fn list_group_ratings(&self, group_id: &GroupId) -> Result<Vec<Rating>, StoreError>;

    /// List all ratings left on groups hosted by a user.
    async fn list_host_ratings(&self, host_id: &UserId) -> Result<Vec<Rating>, StoreError>;

    /// Insert or edit a rating together with the group and host aggregates.
    async fn commit_rating(&self, commit: &RatingCommit) -> Result<Group, StoreError>;

    // ──────────────────────────────── User aggregates ─────────────────────────────────────

    /// Get a user's stored aggregate.
    async fn get_user_aggregate(&self, user_id: &UserId) -> Result<UserAggregate, StoreError>;

    /// List every user that owns an aggregate row, hosts a group or holds a membership.
    async fn list_known_users(&self) -> Result<Vec<UserId>, StoreError>;

    // ───────────────────────────────────── Repair ─────────────────────────────────────────

    /// Overwrite a group's derived fields with recomputed values.
    async fn overwrite_group_aggregate(
        &self,
        group_id: &GroupId,
        current_members: i32,
        tally: &RatingTally,
    ) -> Result<(), StoreError>;

    /// Overwrite a user's aggregate row with recomputed values, provided its
    /// counters still equal those of `expected`. A missing row matches the
    /// empty aggregate. Fails with `Conflict` when a commit got in between.
    async fn overwrite_user_aggregate(
        &self,
        expected: &UserAggregate,
        aggregate: &UserAggregate,
    ) -> Result<(), StoreError>;
}

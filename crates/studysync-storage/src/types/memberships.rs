//! Membership records and the per-membership state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupId, MembershipId, UserId};
use crate::StoreError;

/// Status of a user's participation in a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Joined,
    Left,
    Removed,
    Waitlist,
    Declined,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Joined => "joined",
            MembershipStatus::Left => "left",
            MembershipStatus::Removed => "removed",
            MembershipStatus::Waitlist => "waitlist",
            MembershipStatus::Declined => "declined",
        }
    }

    /// States a membership row may be created in.
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            MembershipStatus::Pending | MembershipStatus::Joined | MembershipStatus::Waitlist
        )
    }

    /// `left` and `removed` count against a member's reliability.
    pub fn is_dropped(&self) -> bool {
        matches!(self, MembershipStatus::Left | MembershipStatus::Removed)
    }

    /// Whether an existing membership may move from `self` to `next`.
    ///
    /// `left` and `removed` only lead back to `joined`; `declined` is final.
    pub fn can_transition_to(&self, next: MembershipStatus) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, next),
            (Pending, Joined)
                | (Pending, Declined)
                | (Pending, Waitlist)
                | (Joined, Left)
                | (Joined, Removed)
                | (Left, Joined)
                | (Removed, Joined)
                | (Waitlist, Joined)
                | (Waitlist, Left)
        )
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MembershipStatus::Pending),
            "joined" => Ok(MembershipStatus::Joined),
            "left" => Ok(MembershipStatus::Left),
            "removed" => Ok(MembershipStatus::Removed),
            "waitlist" => Ok(MembershipStatus::Waitlist),
            "declined" => Ok(MembershipStatus::Declined),
            other => Err(StoreError::Validation(format!(
                "membership status: unknown value '{other}'"
            ))),
        }
    }
}

/// Membership record (one per group/user pair, never physically deleted).
#[derive(Clone, Debug, PartialEq)]
pub struct Membership {
    pub id: MembershipId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub status: MembershipStatus,
    /// Queue position while `status == Waitlist`.
    pub waitlist_position: Option<i64>,
    /// First time this membership entered `joined`.
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Whether the member ever took part in the session.
    pub fn has_joined_history(&self) -> bool {
        self.joined_at.is_some()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        match (self.status, self.waitlist_position) {
            (MembershipStatus::Waitlist, None) => Err(StoreError::Validation(
                "waitlist_position: required while waitlisted".into(),
            )),
            (MembershipStatus::Waitlist, Some(p)) if p < 1 => Err(StoreError::Validation(
                "waitlist_position: must be positive".into(),
            )),
            (MembershipStatus::Waitlist, Some(_)) => Ok(()),
            (_, Some(_)) => Err(StoreError::Validation(
                "waitlist_position: only allowed while waitlisted".into(),
            )),
            (_, None) => Ok(()),
        }
    }
}

/// One membership row to write inside a unit of work.
#[derive(Clone, Debug)]
pub struct MembershipWrite {
    pub membership: Membership,
    /// `None` inserts a new row; `Some(status)` updates only if the stored status still matches.
    pub expected: Option<MembershipStatus>,
}

/// All membership writes for one group, committed atomically together with
/// the group's member count and the affected users' aggregates.
#[derive(Clone, Debug)]
pub struct MembershipCommit {
    pub group_id: GroupId,
    pub writes: Vec<MembershipWrite>,
}

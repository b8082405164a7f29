//! Study group records and lifecycle.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupId, RatingTally, UserId};
use crate::StoreError;

/// Largest `max_members` a group may declare.
pub const MAX_GROUP_CAPACITY: i32 = 500;
/// Shortest bookable session, in minutes.
pub const MIN_SESSION_MINUTES: i32 = 15;
/// Longest bookable session, in minutes.
pub const MAX_SESSION_MINUTES: i32 = 480;
/// Longest accepted group title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Lifecycle status of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Draft,
    Published,
    Ongoing,
    Completed,
    Cancelled,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Draft => "draft",
            GroupStatus::Published => "published",
            GroupStatus::Ongoing => "ongoing",
            GroupStatus::Completed => "completed",
            GroupStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: GroupStatus) -> bool {
        use GroupStatus::*;
        matches!(
            (self, next),
            (Draft, Published)
                | (Published, Ongoing)
                | (Ongoing, Completed)
                | (Draft, Cancelled)
                | (Published, Cancelled)
                | (Ongoing, Cancelled)
        )
    }

    /// Memberships may only change while the session is open.
    pub fn accepts_membership_changes(&self) -> bool {
        matches!(self, GroupStatus::Published | GroupStatus::Ongoing)
    }

    /// Tombstoning is only allowed for groups that never produced history.
    pub fn allows_soft_delete(&self) -> bool {
        matches!(self, GroupStatus::Draft | GroupStatus::Cancelled)
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(GroupStatus::Draft),
            "published" => Ok(GroupStatus::Published),
            "ongoing" => Ok(GroupStatus::Ongoing),
            "completed" => Ok(GroupStatus::Completed),
            "cancelled" => Ok(GroupStatus::Cancelled),
            other => Err(StoreError::Validation(format!(
                "group status: unknown value '{other}'"
            ))),
        }
    }
}

/// Group record. Aggregate fields are derived and only written by the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub host_id: UserId,
    pub title: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub min_members: i32,
    pub max_members: i32,
    pub current_members: i32,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub end_time: NaiveTime,
    pub status: GroupStatus,
    pub rating_tally: RatingTally,
    pub avg_rating: Option<f64>,
    pub avg_productivity: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Group {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn open_slots(&self) -> i32 {
        (self.max_members - self.current_members).max(0)
    }

    /// The externally visible aggregate view.
    pub fn aggregate(&self) -> GroupAggregate {
        GroupAggregate {
            current_members: self.current_members,
            avg_rating: self.avg_rating,
            avg_productivity: self.avg_productivity,
            total_ratings: self.rating_tally.count,
        }
    }
}

/// Derived group fields as exposed to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub current_members: i32,
    pub avg_rating: Option<f64>,
    pub avg_productivity: Option<f64>,
    pub total_ratings: i64,
}

/// Parameters for creating a group
#[derive(Clone, Debug)]
pub struct CreateGroupParams {
    pub host_id: UserId,
    pub title: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub min_members: i32,
    pub max_members: i32,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
}

impl CreateGroupParams {
    /// Static invariants checked before any group row is written.
    pub fn validate(&self) -> Result<(), StoreError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title: must not be empty".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(StoreError::Validation(format!(
                "title: longer than {MAX_TITLE_LEN} characters"
            )));
        }
        if self.min_members < 1 {
            return Err(StoreError::Validation(
                "capacity: min_members must be at least 1".into(),
            ));
        }
        if self.min_members > self.max_members {
            return Err(StoreError::Validation(
                "capacity: min_members must not exceed max_members".into(),
            ));
        }
        if self.max_members > MAX_GROUP_CAPACITY {
            return Err(StoreError::Validation(format!(
                "capacity: max_members must not exceed {MAX_GROUP_CAPACITY}"
            )));
        }
        if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&self.duration_minutes) {
            return Err(StoreError::Validation(format!(
                "schedule: duration must be between {MIN_SESSION_MINUTES} and {MAX_SESSION_MINUTES} minutes"
            )));
        }
        Ok(())
    }
}

/// Filter for listing groups. Tombstoned groups are excluded unless asked for.
#[derive(Clone, Debug, Default)]
pub struct GroupFilter {
    pub host_id: Option<UserId>,
    pub include_deleted: bool,
}

impl GroupFilter {
    pub fn everything() -> Self {
        Self {
            host_id: None,
            include_deleted: true,
        }
    }
}

/// Compare-and-set lifecycle change.
#[derive(Clone, Debug)]
pub struct GroupStatusChange {
    pub group_id: GroupId,
    pub from: GroupStatus,
    pub to: GroupStatus,
}

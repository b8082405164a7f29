//! Membership mutations: validation, capacity, and FIFO waitlist promotion.

use chrono::{DateTime, Utc};
use studysync_aggregates::member_count_delta;
use studysync_events::{GroupEvent, GroupEventKind};
use studysync_storage::{
    Group, GroupId, Membership, MembershipCommit, MembershipId, MembershipStatus, MembershipWrite,
    Store, UserId,
};
use tracing::info;

use crate::{unix_now, Coordinator, CoordinatorError};

/// What the acting user asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Intent {
    Join,
    Waitlist,
    Request,
    Leave,
    Set(MembershipStatus),
}

#[derive(Debug)]
enum Planned {
    /// Already in the requested state; nothing to write.
    Unchanged(Membership),
    Write(MembershipWrite),
}

struct Committed {
    membership: Membership,
    events: Vec<GroupEvent>,
}

impl<S: Store> Coordinator<S> {
    /// Join directly. Joining again while joined returns the existing row.
    pub async fn join_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, CoordinatorError> {
        self.mutate_membership(group_id, user_id, Intent::Join).await
    }

    /// Queue for a seat, or take one right away if the group has room.
    pub async fn join_waitlist(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, CoordinatorError> {
        self.mutate_membership(group_id, user_id, Intent::Waitlist).await
    }

    /// Ask the host for a seat; the membership starts out `pending`.
    pub async fn request_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, CoordinatorError> {
        self.mutate_membership(group_id, user_id, Intent::Request).await
    }

    /// Leave the group or the waitlist. A freed seat goes to the head of the waitlist.
    pub async fn leave_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), CoordinatorError> {
        self.mutate_membership(group_id, user_id, Intent::Leave)
            .await
            .map(|_| ())
    }

    pub async fn change_membership_status(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        status: MembershipStatus,
    ) -> Result<Membership, CoordinatorError> {
        self.mutate_membership(group_id, user_id, Intent::Set(status))
            .await
    }

    async fn mutate_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        intent: Intent,
    ) -> Result<Membership, CoordinatorError> {
        let _guard = self.locks.lock(group_id).await;
        let committed = self
            .settings
            .retry
            .run("membership", move || async move {
                self.membership_attempt(group_id, user_id, intent).await
            })
            .await?;

        for event in committed.events {
            self.notify(group_id, event).await;
        }
        Ok(committed.membership)
    }

    async fn membership_attempt(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
        intent: Intent,
    ) -> Result<Committed, CoordinatorError> {
        let group = self.get_group(group_id).await?;
        if !group.status.accepts_membership_changes() {
            return Err(CoordinatorError::Validation(format!(
                "memberships of a {} group cannot change",
                group.status
            )));
        }
        let members = self.store.list_group_memberships(group_id).await?;
        let now = Utc::now();

        let write = match plan(intent, &group, &members, user_id, now)? {
            Planned::Unchanged(membership) => {
                return Ok(Committed {
                    membership,
                    events: Vec::new(),
                })
            }
            Planned::Write(write) => write,
        };

        let delta = member_count_delta(write.expected, write.membership.status);
        if delta > group.open_slots() {
            return Err(CoordinatorError::CapacityExceeded);
        }
        let free_after = group.max_members - (group.current_members + delta);
        let promotions = waitlist_promotions(&members, user_id, free_after, now);
        let promoted: Vec<UserId> = promotions.iter().map(|w| w.membership.user_id).collect();

        let membership = write.membership.clone();
        let previous = write.expected;
        let mut writes = Vec::with_capacity(1 + promotions.len());
        writes.push(write);
        writes.extend(promotions);

        let updated = self
            .store
            .commit_memberships(&MembershipCommit {
                group_id: *group_id,
                writes,
            })
            .await?;

        info!(
            group_id = %group_id,
            user_id = %user_id,
            from = ?previous,
            to = %membership.status,
            current_members = updated.current_members,
            promoted = promoted.len(),
            "membership committed"
        );

        Ok(Committed {
            membership,
            events: events_for(&updated, user_id, delta, &promoted),
        })
    }
}

fn plan(
    intent: Intent,
    group: &Group,
    members: &[Membership],
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Result<Planned, CoordinatorError> {
    use MembershipStatus::*;

    let existing = members.iter().find(|m| m.user_id == *user_id);
    let (target, existing) = match (intent, existing) {
        (Intent::Join, Some(m)) if m.status == Joined => return Ok(Planned::Unchanged(m.clone())),
        (Intent::Waitlist, Some(m)) if m.status == Waitlist => {
            return Ok(Planned::Unchanged(m.clone()))
        }
        (Intent::Join, existing) => (Joined, existing),
        (Intent::Set(Waitlist), None) => return Err(CoordinatorError::NotFound("membership")),
        // a free seat means nobody is queued ahead
        (Intent::Waitlist | Intent::Set(Waitlist), existing) => {
            if let Some(m) = existing {
                if !m.status.can_transition_to(Waitlist) {
                    return Err(CoordinatorError::transition(m.status, Waitlist));
                }
            }
            let target = if group.open_slots() > 0 { Joined } else { Waitlist };
            (target, existing)
        }
        (Intent::Request, None) => (Pending, None),
        (Intent::Request, Some(m)) => return Err(CoordinatorError::transition(m.status, Pending)),
        (Intent::Leave, existing) => {
            let m = existing.ok_or(CoordinatorError::NotFound("membership"))?;
            (Left, Some(m))
        }
        (Intent::Set(to), existing) => {
            let m = existing.ok_or(CoordinatorError::NotFound("membership"))?;
            (to, Some(m))
        }
    };

    let waitlist_position = (target == Waitlist).then(|| next_waitlist_position(members));
    match existing {
        None => {
            if !target.is_initial() {
                return Err(CoordinatorError::transition("none", target));
            }
            Ok(Planned::Write(inserted(
                group.id,
                *user_id,
                target,
                waitlist_position,
                now,
            )))
        }
        Some(m) => {
            if !m.status.can_transition_to(target) {
                return Err(CoordinatorError::transition(m.status, target));
            }
            Ok(Planned::Write(moved(m, target, waitlist_position, now)))
        }
    }
}

/// One past the current tail of the queue. A number freed by the tail
/// leaving can be handed out again; order among waiting rows is kept.
fn next_waitlist_position(members: &[Membership]) -> i64 {
    members
        .iter()
        .filter(|m| m.status == MembershipStatus::Waitlist)
        .filter_map(|m| m.waitlist_position)
        .max()
        .unwrap_or(0)
        + 1
}

/// Promote waitlisted members, lowest position first, into `free` seats.
fn waitlist_promotions(
    members: &[Membership],
    acting: &UserId,
    free: i32,
    now: DateTime<Utc>,
) -> Vec<MembershipWrite> {
    if free <= 0 {
        return Vec::new();
    }
    let mut queue: Vec<&Membership> = members
        .iter()
        .filter(|m| m.status == MembershipStatus::Waitlist && m.user_id != *acting)
        .collect();
    queue.sort_by_key(|m| m.waitlist_position);
    queue
        .into_iter()
        .take(free as usize)
        .map(|m| moved(m, MembershipStatus::Joined, None, now))
        .collect()
}

fn inserted(
    group_id: GroupId,
    user_id: UserId,
    status: MembershipStatus,
    waitlist_position: Option<i64>,
    now: DateTime<Utc>,
) -> MembershipWrite {
    MembershipWrite {
        membership: Membership {
            id: MembershipId::new(),
            group_id,
            user_id,
            status,
            waitlist_position,
            joined_at: (status == MembershipStatus::Joined).then_some(now),
            created_at: now,
            updated_at: now,
        },
        expected: None,
    }
}

fn moved(
    current: &Membership,
    to: MembershipStatus,
    waitlist_position: Option<i64>,
    now: DateTime<Utc>,
) -> MembershipWrite {
    let mut next = current.clone();
    next.status = to;
    next.waitlist_position = waitlist_position;
    if to == MembershipStatus::Joined {
        next.joined_at = next.joined_at.or(Some(now));
    }
    next.updated_at = now;
    MembershipWrite {
        membership: next,
        expected: Some(current.status),
    }
}

fn events_for(group: &Group, acting: &UserId, delta: i32, promoted: &[UserId]) -> Vec<GroupEvent> {
    let timestamp = unix_now();
    let event = |kind, user_id| GroupEvent {
        kind,
        group_id: group.id,
        user_id: Some(user_id),
        open_slots: group.open_slots(),
        timestamp,
    };

    let mut events: Vec<GroupEvent> = promoted
        .iter()
        .map(|id| event(GroupEventKind::WaitlistPromoted, *id))
        .collect();
    if delta < 0 && events.is_empty() {
        events.push(event(GroupEventKind::CapacityFreed, *acting));
    }
    events
}

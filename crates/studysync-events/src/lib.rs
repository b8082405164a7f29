//! Notification contract for group capacity changes.
//!
//! The coordinator publishes a [`GroupEvent`] after a membership commit frees a
//! seat or promotes someone off the waitlist. Delivery is best effort: a
//! failed publish is logged by the caller and never undoes the commit.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use studysync_storage::{GroupId, UserId};
use thiserror::Error;

/// What happened to the group's seats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupEventKind {
    /// A joined member left or was removed and nobody was waiting.
    CapacityFreed,
    /// A waitlisted member took a freed seat.
    WaitlistPromoted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupEvent {
    pub kind: GroupEventKind,
    pub group_id: GroupId,
    /// The promoted member, or the member whose departure freed the seat.
    pub user_id: Option<UserId>,
    /// Seats still open after the commit.
    pub open_slots: i32,
    /// Unix seconds.
    pub timestamp: i64,
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("backend error: {0}")]
    Backend(String),
}

pub type EventStream = Pin<Box<dyn Stream<Item = GroupEvent> + Send>>;

/// Per-group publish/subscribe channel.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Broadcast `event` to every current subscriber of `group_id`.
    async fn publish(&self, group_id: &GroupId, event: GroupEvent) -> Result<(), EventBusError>;

    /// Events published on `group_id` from now on, until the stream is dropped.
    async fn subscribe(&self, group_id: &GroupId) -> Result<EventStream, EventBusError>;
}

//! In-process [`EventBus`] on tokio broadcast channels, one channel per group.
//!
//! Events only reach subscribers in the same process. A subscriber that falls
//! more than [`CHANNEL_CAPACITY`] events behind silently skips the gap. A
//! group's channel is dropped by the first publish that finds no subscriber.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use studysync_events::{EventBus, EventBusError, EventStream, GroupEvent};
use studysync_storage::GroupId;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

pub const CHANNEL_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct MemoryEventBus {
    channels: Arc<DashMap<GroupId, broadcast::Sender<GroupEvent>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, group_id: &GroupId, event: GroupEvent) -> Result<(), EventBusError> {
        let Some(tx) = self.channels.get(group_id).map(|entry| entry.clone()) else {
            // nobody ever subscribed
            return Ok(());
        };
        if tx.send(event).is_err() {
            // every subscriber has gone; drop the channel unless one just arrived
            self.channels.remove_if(group_id, |_, tx| tx.receiver_count() == 0);
        }
        Ok(())
    }

    async fn subscribe(&self, group_id: &GroupId) -> Result<EventStream, EventBusError> {
        // subscribe while the entry is held so a concurrent eviction cannot orphan us
        let rx = self
            .channels
            .entry(*group_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        // lagged receivers skip ahead
        let stream = BroadcastStream::new(rx).filter_map(|result| result.ok());
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use studysync_events::GroupEventKind;
    use studysync_storage::UserId;

    fn event(group_id: GroupId, kind: GroupEventKind, open_slots: i32) -> GroupEvent {
        GroupEvent {
            kind,
            group_id,
            user_id: Some(UserId::new()),
            open_slots,
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe() {
        let bus = MemoryEventBus::new();
        let group = GroupId::new();
        let mut stream = bus.subscribe(&group).await.unwrap();

        bus.publish(&group, event(group, GroupEventKind::CapacityFreed, 1))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(received.kind, GroupEventKind::CapacityFreed);
        assert_eq!(received.open_slots, 1);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = MemoryEventBus::new();
        let group = GroupId::new();
        let mut first = bus.subscribe(&group).await.unwrap();
        let mut second = bus.subscribe(&group).await.unwrap();

        bus.publish(&group, event(group, GroupEventKind::WaitlistPromoted, 0))
            .await
            .unwrap();

        assert_eq!(first.next().await.unwrap().kind, GroupEventKind::WaitlistPromoted);
        assert_eq!(second.next().await.unwrap().kind, GroupEventKind::WaitlistPromoted);
    }

    #[tokio::test]
    async fn events_before_subscribe_are_dropped() {
        let bus = MemoryEventBus::new();
        let group = GroupId::new();
        bus.publish(&group, event(group, GroupEventKind::CapacityFreed, 3))
            .await
            .unwrap();

        let mut stream = bus.subscribe(&group).await.unwrap();
        let result = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(result.is_err(), "late subscriber must not see earlier events");
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let bus = MemoryEventBus::new();
        let (a, b) = (GroupId::new(), GroupId::new());
        let mut stream_a = bus.subscribe(&a).await.unwrap();

        bus.publish(&b, event(b, GroupEventKind::CapacityFreed, 5))
            .await
            .unwrap();
        bus.publish(&a, event(a, GroupEventKind::WaitlistPromoted, 0))
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), stream_a.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(received.group_id, a);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = MemoryEventBus::new();
        let group = GroupId::new();
        let mut stream = bus.subscribe(&group).await.unwrap();

        for slots in 1..=3 {
            bus.publish(&group, event(group, GroupEventKind::CapacityFreed, slots))
                .await
                .unwrap();
        }

        for expected in 1..=3 {
            assert_eq!(stream.next().await.unwrap().open_slots, expected);
        }
    }

    #[tokio::test]
    async fn channels_without_subscribers_are_evicted() {
        let bus = MemoryEventBus::new();
        let group = GroupId::new();

        bus.publish(&group, event(group, GroupEventKind::CapacityFreed, 1))
            .await
            .unwrap();
        assert!(bus.channels.is_empty());

        let stream = bus.subscribe(&group).await.unwrap();
        assert_eq!(bus.channels.len(), 1);
        drop(stream);

        bus.publish(&group, event(group, GroupEventKind::CapacityFreed, 1))
            .await
            .unwrap();
        assert!(bus.channels.is_empty());

        // a fresh subscriber gets a fresh channel
        let mut stream = bus.subscribe(&group).await.unwrap();
        bus.publish(&group, event(group, GroupEventKind::WaitlistPromoted, 0))
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().kind, GroupEventKind::WaitlistPromoted);
    }

    #[test]
    fn default_bus_is_empty() {
        assert!(MemoryEventBus::default().channels.is_empty());
    }
}

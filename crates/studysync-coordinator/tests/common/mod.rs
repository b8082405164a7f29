//! Shared fixtures: a coordinator over an in-memory SQLite store.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use studysync_config::MidnightPolicy;
use studysync_coordinator::{Coordinator, CoordinatorSettings, RetryPolicy};
use studysync_events_memory::MemoryEventBus;
use studysync_storage::{CreateGroupParams, Group, GroupStatus, RatingScores, UserId};
use studysync_store_sqlite::SqliteStore;

pub type TestCoordinator = Coordinator<SqliteStore>;

pub fn fast_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        retry: RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        },
        rating_edit_window: Duration::from_secs(24 * 60 * 60),
        midnight_policy: MidnightPolicy::Reject,
    }
}

pub async fn setup() -> (TestCoordinator, MemoryEventBus) {
    setup_with(fast_settings()).await
}

pub async fn setup_with(settings: CoordinatorSettings) -> (TestCoordinator, MemoryEventBus) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let events = MemoryEventBus::new();
    let coordinator = Coordinator::new(store, Arc::new(events.clone()), settings);
    (coordinator, events)
}

pub fn params(host_id: UserId, min_members: i32, max_members: i32) -> CreateGroupParams {
    CreateGroupParams {
        host_id,
        title: "Discrete maths revision".to_string(),
        subject: Some("mathematics".to_string()),
        description: Some("Past papers, chapter 4".to_string()),
        min_members,
        max_members,
        session_date: NaiveDate::from_ymd_opt(2026, 11, 14).unwrap(),
        start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        duration_minutes: 90,
    }
}

/// A published group with room for `max_members`.
pub async fn open_group(c: &TestCoordinator, max_members: i32) -> Group {
    let group = c.create_group(params(UserId::new(), 1, max_members)).await.unwrap();
    c.change_group_status(&group.id, GroupStatus::Published)
        .await
        .unwrap()
}

/// A completed group attended by `members`.
pub async fn completed_group(c: &TestCoordinator, members: &[UserId]) -> Group {
    let group = open_group(c, members.len().max(1) as i32).await;
    for user in members {
        c.join_group(&group.id, user).await.unwrap();
    }
    c.change_group_status(&group.id, GroupStatus::Ongoing)
        .await
        .unwrap();
    c.change_group_status(&group.id, GroupStatus::Completed)
        .await
        .unwrap()
}

pub fn scores(overall: i16, productivity: Option<i16>, host: Option<i16>) -> RatingScores {
    RatingScores {
        overall,
        productivity,
        host,
        comment: None,
    }
}

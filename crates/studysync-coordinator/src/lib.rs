//! Mutation coordinator for study groups.
//!
//! Every membership and rating mutation goes through [`Coordinator`], which
//! validates it, plans the detail-row writes (including FIFO waitlist
//! promotion) and hands them to the store as one unit of work that also moves
//! the owning group's and users' aggregates. Mutations on the same group are
//! linearized by a per-group lock; transient commit failures are retried with
//! bounded exponential backoff. [`verify`] recounts everything from detail rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use studysync_config::{Config, MidnightPolicy};
use studysync_events::{EventBus, GroupEvent};
use studysync_storage::{GroupId, Store};
use tracing::warn;

mod error;
mod groups;
mod locks;
mod memberships;
mod ratings;
mod retry;
pub mod verify;

pub use error::CoordinatorError;
pub use retry::RetryPolicy;
pub use verify::{Discrepancy, EntityRef, FieldValue, VerifyScope};

use locks::GroupLocks;

/// Tunables taken from [`Config`].
#[derive(Clone, Debug)]
pub struct CoordinatorSettings {
    pub retry: RetryPolicy,
    pub rating_edit_window: Duration,
    pub midnight_policy: MidnightPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            rating_edit_window: config.ratings.edit_window(),
            midnight_policy: config.schedule.midnight_policy,
        }
    }
}

pub struct Coordinator<S> {
    store: Arc<S>,
    events: Arc<dyn EventBus>,
    locks: GroupLocks,
    settings: CoordinatorSettings,
}

impl<S: Store> Coordinator<S> {
    pub fn new(store: Arc<S>, events: Arc<dyn EventBus>, settings: CoordinatorSettings) -> Self {
        Self {
            store,
            events,
            locks: GroupLocks::default(),
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Fire-and-forget; a failed publish never undoes the commit.
    async fn notify(&self, group_id: &GroupId, event: GroupEvent) {
        if let Err(e) = self.events.publish(group_id, event).await {
            warn!(group_id = %group_id, error = %e, "failed to publish group event");
        }
    }
}

pub(crate) fn unix_now() -> i64 {
    Utc::now().timestamp()
}

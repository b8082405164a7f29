use std::sync::Arc;

use dashmap::DashMap;
use studysync_storage::GroupId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per group; unrelated groups never contend.
///
/// An entry lives only while someone holds or waits for it, so the map is
/// bounded by the number of groups with work in flight.
#[derive(Default)]
pub(crate) struct GroupLocks {
    inner: DashMap<GroupId, Arc<Mutex<()>>>,
}

impl GroupLocks {
    pub(crate) async fn lock(&self, group_id: &GroupId) -> GroupGuard<'_> {
        // clone out so the map shard is released before awaiting
        let mutex = self.inner.entry(*group_id).or_default().clone();
        GroupGuard {
            guard: Some(mutex.lock_owned().await),
            locks: self,
            group_id: *group_id,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

pub(crate) struct GroupGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a GroupLocks,
    group_id: GroupId,
}

impl Drop for GroupGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // only the map's own handle left: nobody holds or waits
        self.locks
            .inner
            .remove_if(&self.group_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

use studysync_aggregates::end_time;
use studysync_config::MidnightPolicy;
use studysync_storage::{
    CreateGroupParams, Group, GroupAggregate, GroupId, GroupStatus, GroupStatusChange, Store,
    StoreError, UserAggregate, UserId,
};
use tracing::info;

use crate::error::not_found_as;
use crate::{Coordinator, CoordinatorError};

impl<S: Store> Coordinator<S> {
    /// Create a draft group hosted by `params.host_id`.
    pub async fn create_group(&self, params: CreateGroupParams) -> Result<Group, CoordinatorError> {
        params.validate()?;
        let schedule = end_time(params.start_time, params.duration_minutes);
        if schedule.crosses_midnight && self.settings.midnight_policy == MidnightPolicy::Reject {
            return Err(CoordinatorError::Validation(
                "session must end on the day it starts".into(),
            ));
        }

        let params = &params;
        let group = self
            .settings
            .retry
            .run("create_group", move || async move {
                Ok::<_, CoordinatorError>(self.store.create_group(params).await?)
            })
            .await?;
        info!(group_id = %group.id, host_id = %group.host_id, "group created");
        Ok(group)
    }

    pub async fn get_group(&self, group_id: &GroupId) -> Result<Group, CoordinatorError> {
        self.store
            .get_group(group_id)
            .await
            .map_err(not_found_as("group"))
    }

    /// Move a group along its lifecycle (publish, start, complete, cancel).
    ///
    /// Completing a group credits the host and every joined member in the
    /// same commit.
    pub async fn change_group_status(
        &self,
        group_id: &GroupId,
        to: GroupStatus,
    ) -> Result<Group, CoordinatorError> {
        let _guard = self.locks.lock(group_id).await;
        let group = self
            .settings
            .retry
            .run("change_group_status", move || async move {
                let group = self.get_group(group_id).await?;
                if !group.status.can_transition_to(to) {
                    return Err(CoordinatorError::transition(group.status, to));
                }
                if to == GroupStatus::Ongoing && group.current_members < group.min_members {
                    return Err(CoordinatorError::Validation(format!(
                        "{} of {} required members have joined",
                        group.current_members, group.min_members
                    )));
                }
                let change = GroupStatusChange {
                    group_id: *group_id,
                    from: group.status,
                    to,
                };
                Ok(self.store.commit_group_status(&change).await?)
            })
            .await?;
        info!(group_id = %group_id, status = %group.status, "group status changed");
        Ok(group)
    }

    /// Tombstone a draft or cancelled group.
    pub async fn delete_group(&self, group_id: &GroupId) -> Result<(), CoordinatorError> {
        let _guard = self.locks.lock(group_id).await;
        self.settings
            .retry
            .run("delete_group", move || async move {
                let group = self.get_group(group_id).await?;
                if !group.status.allows_soft_delete() {
                    return Err(CoordinatorError::transition(group.status, "deleted"));
                }
                Ok(self.store.soft_delete_group(group_id).await?)
            })
            .await?;
        info!(group_id = %group_id, "group deleted");
        Ok(())
    }

    pub async fn get_group_aggregate(
        &self,
        group_id: &GroupId,
    ) -> Result<GroupAggregate, CoordinatorError> {
        Ok(self.get_group(group_id).await?.aggregate())
    }

    /// A user with no recorded activity has the empty aggregate.
    pub async fn get_user_aggregate(
        &self,
        user_id: &UserId,
    ) -> Result<UserAggregate, CoordinatorError> {
        match self.store.get_user_aggregate(user_id).await {
            Ok(agg) => Ok(agg),
            Err(StoreError::NotFound) => Ok(UserAggregate::empty(*user_id)),
            Err(e) => Err(e.into()),
        }
    }
}

use chrono::Utc;
use studysync_storage::{
    GroupId, GroupStatus, Rating, RatingCommit, RatingId, RatingScores, Store, StoreError, UserId,
};
use tracing::info;

use crate::error::not_found_as;
use crate::{Coordinator, CoordinatorError};

/// A rating may be changed once after submission.
const MAX_EDITS: i32 = 1;

impl<S: Store> Coordinator<S> {
    /// Rate a completed session the rater took part in.
    ///
    /// The rating row, the group's averages and the host's rating tally
    /// commit together.
    pub async fn submit_rating(
        &self,
        group_id: &GroupId,
        rater_id: &UserId,
        scores: RatingScores,
    ) -> Result<Rating, CoordinatorError> {
        scores.validate()?;
        let scores = &scores;
        let _guard = self.locks.lock(group_id).await;
        let rating = self
            .settings
            .retry
            .run("submit_rating", move || async move {
                self.submit_attempt(group_id, rater_id, scores).await
            })
            .await?;
        info!(group_id = %group_id, rater_id = %rater_id, "rating submitted");
        Ok(rating)
    }

    /// Replace the scores of an existing rating, once, within the edit window.
    pub async fn edit_rating(
        &self,
        group_id: &GroupId,
        rater_id: &UserId,
        scores: RatingScores,
    ) -> Result<Rating, CoordinatorError> {
        scores.validate()?;
        let scores = &scores;
        let _guard = self.locks.lock(group_id).await;
        let rating = self
            .settings
            .retry
            .run("edit_rating", move || async move {
                self.edit_attempt(group_id, rater_id, scores).await
            })
            .await?;
        info!(group_id = %group_id, rater_id = %rater_id, "rating edited");
        Ok(rating)
    }

    async fn submit_attempt(
        &self,
        group_id: &GroupId,
        rater_id: &UserId,
        scores: &RatingScores,
    ) -> Result<Rating, CoordinatorError> {
        let group = self.get_group(group_id).await?;
        if group.status != GroupStatus::Completed {
            return Err(CoordinatorError::NotEligible(format!(
                "a {} session cannot be rated",
                group.status
            )));
        }
        if group.host_id == *rater_id {
            return Err(CoordinatorError::NotEligible(
                "hosts cannot rate their own session".into(),
            ));
        }
        match self.store.get_membership(group_id, rater_id).await {
            Ok(m) if m.has_joined_history() => {}
            Ok(_) | Err(StoreError::NotFound) => {
                return Err(CoordinatorError::NotEligible(
                    "rater never joined this session".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }
        match self.store.get_rating(group_id, rater_id).await {
            Ok(_) => return Err(CoordinatorError::DuplicateRating),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let now = Utc::now();
        let rating = Rating {
            id: RatingId::new(),
            group_id: *group_id,
            rater_id: *rater_id,
            overall_rating: scores.overall,
            productivity_rating: scores.productivity,
            host_rating: scores.host,
            comment: scores.comment.clone(),
            edit_count: 0,
            created_at: now,
            updated_at: now,
        };
        let commit = RatingCommit {
            rating,
            previous: None,
            host_id: group.host_id,
        };
        match self.store.commit_rating(&commit).await {
            Ok(_) => Ok(commit.rating),
            Err(StoreError::AlreadyExists) => Err(CoordinatorError::DuplicateRating),
            Err(e) => Err(e.into()),
        }
    }

    async fn edit_attempt(
        &self,
        group_id: &GroupId,
        rater_id: &UserId,
        scores: &RatingScores,
    ) -> Result<Rating, CoordinatorError> {
        let previous = self
            .store
            .get_rating(group_id, rater_id)
            .await
            .map_err(not_found_as("rating"))?;
        if previous.edit_count >= MAX_EDITS {
            return Err(CoordinatorError::EditNotPermitted(
                "rating was already edited".into(),
            ));
        }
        let now = Utc::now();
        // clock skew can make the age negative; treat it as fresh
        let age = (now - previous.created_at).to_std().unwrap_or_default();
        if age > self.settings.rating_edit_window {
            return Err(CoordinatorError::EditNotPermitted(
                "edit window has closed".into(),
            ));
        }
        let group = self.get_group(group_id).await?;

        let rating = Rating {
            overall_rating: scores.overall,
            productivity_rating: scores.productivity,
            host_rating: scores.host,
            comment: scores.comment.clone(),
            edit_count: previous.edit_count + 1,
            updated_at: now,
            ..previous.clone()
        };
        let commit = RatingCommit {
            rating,
            previous: Some(previous),
            host_id: group.host_id,
        };
        self.store.commit_rating(&commit).await?;
        Ok(commit.rating)
    }
}

//! Session ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupId, RatingId, UserId};
use crate::StoreError;

pub const MIN_SCORE: i16 = 1;
pub const MAX_SCORE: i16 = 5;
pub const MAX_COMMENT_LEN: usize = 2000;

/// Scores submitted by a rater. Only `overall` is required.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingScores {
    pub overall: i16,
    pub productivity: Option<i16>,
    pub host: Option<i16>,
    pub comment: Option<String>,
}

impl RatingScores {
    pub fn validate(&self) -> Result<(), StoreError> {
        check_score("overall_rating", Some(self.overall))?;
        check_score("productivity_rating", self.productivity)?;
        check_score("host_rating", self.host)?;
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_COMMENT_LEN {
                return Err(StoreError::Validation(format!(
                    "comment: longer than {MAX_COMMENT_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

fn check_score(field: &str, value: Option<i16>) -> Result<(), StoreError> {
    match value {
        Some(v) if !(MIN_SCORE..=MAX_SCORE).contains(&v) => Err(StoreError::Validation(format!(
            "{field}: {v} is outside {MIN_SCORE}..={MAX_SCORE}"
        ))),
        _ => Ok(()),
    }
}

/// One rater's feedback on one completed session.
#[derive(Clone, Debug, PartialEq)]
pub struct Rating {
    pub id: RatingId,
    pub group_id: GroupId,
    pub rater_id: UserId,
    pub overall_rating: i16,
    pub productivity_rating: Option<i16>,
    pub host_rating: Option<i16>,
    pub comment: Option<String>,
    /// Number of edits applied since creation (at most one).
    pub edit_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rating {
    pub fn scores(&self) -> RatingScores {
        RatingScores {
            overall: self.overall_rating,
            productivity: self.productivity_rating,
            host: self.host_rating,
            comment: self.comment.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        self.scores().validate()?;
        if !(0..=1).contains(&self.edit_count) {
            return Err(StoreError::Validation(
                "edit_count: a rating may be edited at most once".into(),
            ));
        }
        Ok(())
    }
}

/// A rating insert or edit, committed atomically with the group's rating
/// aggregate and the host's host-rating aggregate.
#[derive(Clone, Debug)]
pub struct RatingCommit {
    pub rating: Rating,
    /// The stored row being replaced; `None` for a first submission.
    pub previous: Option<Rating>,
    pub host_id: UserId,
}

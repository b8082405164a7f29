//! Row shapes as stored in SQLite and their conversion into domain records.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use studysync_storage::{
    Group, GroupId, HostRatingTally, Membership, MembershipId, Rating, RatingId, RatingTally,
    StoreError, UserAggregate, UserId,
};

pub(crate) const GROUP_COLUMNS: &str = "id, host_id, title, subject, description, min_members, \
     max_members, current_members, session_date, start_time, duration_minutes, end_time, status, \
     total_ratings, rating_sum, productivity_count, productivity_sum, avg_rating, avg_productivity, \
     created_at, updated_at, deleted_at";

pub(crate) const MEMBERSHIP_COLUMNS: &str =
    "id, group_id, user_id, status, waitlist_position, joined_at, created_at, updated_at";

pub(crate) const RATING_COLUMNS: &str = "id, group_id, rater_id, overall_rating, \
     productivity_rating, host_rating, comment, edit_count, created_at, updated_at";

pub(crate) const USER_STATS_COLUMNS: &str = "user_id, sessions_hosted, sessions_attended, \
     sessions_completed, sessions_dropped, reliability_score, host_rating_sum, total_host_ratings, \
     avg_host_rating, current_streak, longest_streak, updated_at";

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

#[derive(FromRow)]
pub(crate) struct GroupRow {
    id: String,
    host_id: String,
    title: String,
    subject: Option<String>,
    description: Option<String>,
    min_members: i64,
    max_members: i64,
    current_members: i64,
    session_date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: i64,
    end_time: NaiveTime,
    status: String,
    total_ratings: i64,
    rating_sum: i64,
    productivity_count: i64,
    productivity_sum: i64,
    avg_rating: Option<f64>,
    avg_productivity: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<GroupRow> for Group {
    type Error = StoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Group {
            id: GroupId(parse_uuid(&row.id)?),
            host_id: UserId(parse_uuid(&row.host_id)?),
            title: row.title,
            subject: row.subject,
            description: row.description,
            min_members: row.min_members as i32,
            max_members: row.max_members as i32,
            current_members: row.current_members as i32,
            session_date: row.session_date,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes as i32,
            end_time: row.end_time,
            status: row.status.parse()?,
            rating_tally: RatingTally {
                count: row.total_ratings,
                overall_sum: row.rating_sum,
                productivity_count: row.productivity_count,
                productivity_sum: row.productivity_sum,
            },
            avg_rating: row.avg_rating,
            avg_productivity: row.avg_productivity,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct MembershipRow {
    id: String,
    group_id: String,
    user_id: String,
    status: String,
    waitlist_position: Option<i64>,
    joined_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = StoreError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Membership {
            id: MembershipId(parse_uuid(&row.id)?),
            group_id: GroupId(parse_uuid(&row.group_id)?),
            user_id: UserId(parse_uuid(&row.user_id)?),
            status: row.status.parse()?,
            waitlist_position: row.waitlist_position,
            joined_at: row.joined_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct RatingRow {
    id: String,
    group_id: String,
    rater_id: String,
    overall_rating: i64,
    productivity_rating: Option<i64>,
    host_rating: Option<i64>,
    comment: Option<String>,
    edit_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RatingRow> for Rating {
    type Error = StoreError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        Ok(Rating {
            id: RatingId(parse_uuid(&row.id)?),
            group_id: GroupId(parse_uuid(&row.group_id)?),
            rater_id: UserId(parse_uuid(&row.rater_id)?),
            overall_rating: row.overall_rating as i16,
            productivity_rating: row.productivity_rating.map(|v| v as i16),
            host_rating: row.host_rating.map(|v| v as i16),
            comment: row.comment,
            edit_count: row.edit_count as i32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(crate) struct UserStatsRow {
    user_id: String,
    sessions_hosted: i64,
    sessions_attended: i64,
    sessions_completed: i64,
    sessions_dropped: i64,
    reliability_score: f64,
    host_rating_sum: i64,
    total_host_ratings: i64,
    avg_host_rating: Option<f64>,
    current_streak: i64,
    longest_streak: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserStatsRow> for UserAggregate {
    type Error = StoreError;

    fn try_from(row: UserStatsRow) -> Result<Self, Self::Error> {
        Ok(UserAggregate {
            user_id: UserId(parse_uuid(&row.user_id)?),
            sessions_hosted: row.sessions_hosted,
            sessions_attended: row.sessions_attended,
            sessions_completed: row.sessions_completed,
            sessions_dropped: row.sessions_dropped,
            reliability_score: row.reliability_score,
            host_ratings: HostRatingTally {
                count: row.total_host_ratings,
                sum: row.host_rating_sum,
            },
            avg_host_rating: row.avg_host_rating,
            current_streak: row.current_streak as i32,
            longest_streak: row.longest_streak as i32,
            updated_at: Some(row.updated_at),
        })
    }
}

//! SQLite backend for the studysync [`Store`].
//!
//! Every `commit_*` method runs in one SQLite transaction: detail rows are
//! written, counters are moved with in-place `x = x + ?` updates guarded in the
//! `WHERE` clause, and derived columns (averages, reliability, streaks) are
//! rederived from the updated counters before the transaction commits.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use studysync_aggregates::{
    dropped_delta, end_time, host_rating_delta, member_count_delta, mean, rating_tally_delta,
    reliability_score, streaks, GroupRatingAggregate,
};
use studysync_storage::{
    CreateGroupParams, Group, GroupFilter, GroupId, GroupStatus, GroupStatusChange, Membership,
    MembershipCommit, Rating, RatingCommit, RatingTally, Store, StoreError,
    UserAggregate, UserId,
};

mod rows;

use rows::{
    parse_uuid, GroupRow, MembershipRow, RatingRow, UserStatsRow, GROUP_COLUMNS,
    MEMBERSHIP_COLUMNS, RATING_COLUMNS, USER_STATS_COLUMNS,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.studysync/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".studysync");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    /// Open (creating if missing) and migrate the database at `url`.
    ///
    /// The pool holds a single connection, so transactions are serialized.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_sqlx_err)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(url, "sqlite store ready");
        Ok(Self { pool })
    }
}

/// Translate driver errors into the uniform store taxonomy.
fn map_sqlx_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            if db.is_unique_violation() {
                StoreError::AlreadyExists
            } else if db.is_check_violation() {
                StoreError::Validation(message)
            } else if message.contains("locked") || message.contains("busy") {
                StoreError::Conflict
            } else {
                StoreError::Backend(message)
            }
        }
        other => StoreError::Backend(other.to_string()),
    }
}

// ───────────────────────────── Connection-scoped helpers ─────────────────────────────

async fn fetch_group(
    conn: &mut SqliteConnection,
    group_id: &GroupId,
    include_deleted: bool,
) -> Result<Group, StoreError> {
    let sql = format!(
        "SELECT {GROUP_COLUMNS} FROM study_groups WHERE id = ? AND (? OR deleted_at IS NULL)"
    );
    let row = sqlx::query_as::<_, GroupRow>(&sql)
        .bind(group_id.0.to_string())
        .bind(include_deleted)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(StoreError::NotFound)?;
    Group::try_from(row)
}

async fn ensure_user_stats(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO user_stats(user_id, updated_at) VALUES(?, ?)
         ON CONFLICT(user_id) DO NOTHING",
    )
    .bind(user_id.0.to_string())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;
    Ok(())
}

/// Rederive a user's reliability, host-rating average and streaks from the
/// stored counters and their completed session dates.
async fn refresh_user_derived(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<(), StoreError> {
    let user = user_id.0.to_string();
    let (completed, dropped, host_sum, host_count) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
        "SELECT sessions_completed, sessions_dropped, host_rating_sum, total_host_ratings
         FROM user_stats WHERE user_id = ?",
    )
    .bind(&user)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT g.session_date FROM group_members m
         JOIN study_groups g ON g.id = m.group_id
         WHERE m.user_id = ? AND m.status = 'joined' AND g.status = 'completed'",
    )
    .bind(&user)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;
    let runs = streaks(&dates);

    sqlx::query(
        "UPDATE user_stats SET reliability_score = ?, avg_host_rating = ?, current_streak = ?,
         longest_streak = ?, updated_at = ? WHERE user_id = ?",
    )
    .bind(reliability_score(completed, dropped))
    .bind(mean(host_sum, host_count))
    .bind(runs.current)
    .bind(runs.longest)
    .bind(Utc::now())
    .bind(&user)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;
    Ok(())
}

async fn refresh_group_averages(
    conn: &mut SqliteConnection,
    group_id: &GroupId,
) -> Result<(), StoreError> {
    let id = group_id.0.to_string();
    let (count, overall_sum, productivity_count, productivity_sum) =
        sqlx::query_as::<_, (i64, i64, i64, i64)>(
            "SELECT total_ratings, rating_sum, productivity_count, productivity_sum
             FROM study_groups WHERE id = ?",
        )
        .bind(&id)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx_err)?;

    let agg = GroupRatingAggregate::from(RatingTally {
        count,
        overall_sum,
        productivity_count,
        productivity_sum,
    });
    sqlx::query("UPDATE study_groups SET avg_rating = ?, avg_productivity = ? WHERE id = ?")
        .bind(agg.avg_rating)
        .bind(agg.avg_productivity)
        .bind(&id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_err)?;
    Ok(())
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Groups ─────────────────────────────

    async fn create_group(&self, params: &CreateGroupParams) -> Result<Group, StoreError> {
        params.validate()?;
        let id = GroupId::new();
        let now = Utc::now();
        let end = end_time(params.start_time, params.duration_minutes).end;

        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        sqlx::query(
            "INSERT INTO study_groups(id, host_id, title, subject, description, min_members,
             max_members, session_date, start_time, duration_minutes, end_time, status,
             created_at, updated_at)
             VALUES(?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(params.host_id.0.to_string())
        .bind(params.title.trim())
        .bind(&params.subject)
        .bind(&params.description)
        .bind(params.min_members)
        .bind(params.max_members)
        .bind(params.session_date)
        .bind(params.start_time)
        .bind(params.duration_minutes)
        .bind(end)
        .bind(GroupStatus::Draft.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_err)?;

        fetch_group(&mut conn, &id, false).await
    }

    async fn get_group(&self, group_id: &GroupId) -> Result<Group, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        fetch_group(&mut conn, group_id, false).await
    }

    async fn get_group_including_deleted(&self, group_id: &GroupId) -> Result<Group, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        fetch_group(&mut conn, group_id, true).await
    }

    async fn list_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, StoreError> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS} FROM study_groups
             WHERE (? IS NULL OR host_id = ?) AND (? OR deleted_at IS NULL)
             ORDER BY id"
        );
        let host = filter.host_id.map(|h| h.0.to_string());
        let rows = sqlx::query_as::<_, GroupRow>(&sql)
            .bind(&host)
            .bind(&host)
            .bind(filter.include_deleted)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(Group::try_from).collect()
    }

    async fn commit_group_status(&self, change: &GroupStatusChange) -> Result<Group, StoreError> {
        if !change.from.can_transition_to(change.to) {
            return Err(StoreError::Validation(format!(
                "lifecycle: {} cannot move to {}",
                change.from, change.to
            )));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let group = fetch_group(&mut tx, &change.group_id, false).await?;
        if group.status != change.from {
            return Err(StoreError::Conflict);
        }
        if change.to == GroupStatus::Ongoing && group.current_members < group.min_members {
            return Err(StoreError::Validation(format!(
                "capacity: {} of {} required members have joined",
                group.current_members, group.min_members
            )));
        }

        let id = change.group_id.0.to_string();
        let result = sqlx::query(
            "UPDATE study_groups SET status = ?, updated_at = ?
             WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(change.to.as_str())
        .bind(Utc::now())
        .bind(&id)
        .bind(change.from.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        if change.to == GroupStatus::Completed {
            ensure_user_stats(&mut tx, &group.host_id).await?;
            sqlx::query(
                "UPDATE user_stats SET sessions_hosted = sessions_hosted + 1 WHERE user_id = ?",
            )
            .bind(group.host_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
            refresh_user_derived(&mut tx, &group.host_id).await?;

            let attendees = sqlx::query_scalar::<_, String>(
                "SELECT user_id FROM group_members WHERE group_id = ? AND status = 'joined'",
            )
            .bind(&id)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            for attendee in attendees {
                let user_id = UserId(parse_uuid(&attendee)?);
                ensure_user_stats(&mut tx, &user_id).await?;
                sqlx::query(
                    "UPDATE user_stats SET sessions_completed = sessions_completed + 1
                     WHERE user_id = ?",
                )
                .bind(&attendee)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
                refresh_user_derived(&mut tx, &user_id).await?;
            }
        }

        let updated = fetch_group(&mut tx, &change.group_id, false).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        debug!(
            group_id = %change.group_id,
            from = %change.from,
            to = %change.to,
            "group status committed"
        );
        Ok(updated)
    }

    async fn soft_delete_group(&self, group_id: &GroupId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let group = fetch_group(&mut tx, group_id, false).await?;
        if !group.status.allows_soft_delete() {
            return Err(StoreError::Validation(format!(
                "lifecycle: a {} group cannot be deleted",
                group.status
            )));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE study_groups SET deleted_at = ?, updated_at = ?
             WHERE id = ? AND status = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(group_id.0.to_string())
        .bind(group.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }

    // ───────────────────────────── Memberships ─────────────────────────────

    async fn get_membership(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Membership, StoreError> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM group_members WHERE group_id = ? AND user_id = ?"
        );
        let row = sqlx::query_as::<_, MembershipRow>(&sql)
            .bind(group_id.0.to_string())
            .bind(user_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(StoreError::NotFound)?;
        Membership::try_from(row)
    }

    async fn list_group_memberships(
        &self,
        group_id: &GroupId,
    ) -> Result<Vec<Membership>, StoreError> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM group_members WHERE group_id = ? ORDER BY id"
        );
        let rows = sqlx::query_as::<_, MembershipRow>(&sql)
            .bind(group_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn list_user_memberships(&self, user_id: &UserId) -> Result<Vec<Membership>, StoreError> {
        let sql =
            format!("SELECT {MEMBERSHIP_COLUMNS} FROM group_members WHERE user_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, MembershipRow>(&sql)
            .bind(user_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn commit_memberships(&self, commit: &MembershipCommit) -> Result<Group, StoreError> {
        for write in &commit.writes {
            write.membership.validate()?;
            if write.membership.group_id != commit.group_id {
                return Err(StoreError::Validation(
                    "membership: write targets a different group".into(),
                ));
            }
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let group = fetch_group(&mut tx, &commit.group_id, false).await?;
        if !group.status.accepts_membership_changes() {
            return Err(StoreError::Validation(format!(
                "lifecycle: memberships of a {} group are frozen",
                group.status
            )));
        }

        let mut net_delta = 0;
        for write in &commit.writes {
            let m = &write.membership;
            match write.expected {
                None => {
                    sqlx::query(
                        "INSERT INTO group_members(id, group_id, user_id, status, waitlist_position,
                         joined_at, created_at, updated_at) VALUES(?,?,?,?,?,?,?,?)",
                    )
                    .bind(m.id.0.to_string())
                    .bind(m.group_id.0.to_string())
                    .bind(m.user_id.0.to_string())
                    .bind(m.status.as_str())
                    .bind(m.waitlist_position)
                    .bind(m.joined_at)
                    .bind(m.created_at)
                    .bind(m.updated_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_err)?;
                }
                Some(expected) => {
                    let result = sqlx::query(
                        "UPDATE group_members SET status = ?, waitlist_position = ?, joined_at = ?,
                         updated_at = ? WHERE group_id = ? AND user_id = ? AND status = ?",
                    )
                    .bind(m.status.as_str())
                    .bind(m.waitlist_position)
                    .bind(m.joined_at)
                    .bind(m.updated_at)
                    .bind(m.group_id.0.to_string())
                    .bind(m.user_id.0.to_string())
                    .bind(expected.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_err)?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::Conflict);
                    }
                }
            }

            let joined = member_count_delta(write.expected, m.status);
            let dropped = dropped_delta(write.expected, m.status);
            net_delta += joined;
            if joined != 0 || dropped != 0 {
                ensure_user_stats(&mut tx, &m.user_id).await?;
                sqlx::query(
                    "UPDATE user_stats SET sessions_attended = sessions_attended + ?,
                     sessions_dropped = sessions_dropped + ? WHERE user_id = ?",
                )
                .bind(joined)
                .bind(dropped)
                .bind(m.user_id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
                refresh_user_derived(&mut tx, &m.user_id).await?;
            }
        }

        if net_delta != 0 {
            let result = sqlx::query(
                "UPDATE study_groups SET current_members = current_members + ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL
                 AND current_members + ? BETWEEN 0 AND max_members",
            )
            .bind(net_delta)
            .bind(Utc::now())
            .bind(commit.group_id.0.to_string())
            .bind(net_delta)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::CapacityExceeded);
            }
        }

        let updated = fetch_group(&mut tx, &commit.group_id, false).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        debug!(
            group_id = %commit.group_id,
            writes = commit.writes.len(),
            net_delta,
            current_members = updated.current_members,
            "membership commit applied"
        );
        Ok(updated)
    }

    // ───────────────────────────── Ratings ─────────────────────────────

    async fn get_rating(
        &self,
        group_id: &GroupId,
        rater_id: &UserId,
    ) -> Result<Rating, StoreError> {
        let sql = format!(
            "SELECT {RATING_COLUMNS} FROM session_ratings WHERE group_id = ? AND rater_id = ?"
        );
        let row = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(group_id.0.to_string())
            .bind(rater_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(StoreError::NotFound)?;
        Rating::try_from(row)
    }

    async fn list_group_ratings(&self, group_id: &GroupId) -> Result<Vec<Rating>, StoreError> {
        let sql =
            format!("SELECT {RATING_COLUMNS} FROM session_ratings WHERE group_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(group_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(Rating::try_from).collect()
    }

    async fn list_host_ratings(&self, host_id: &UserId) -> Result<Vec<Rating>, StoreError> {
        let columns = RATING_COLUMNS
            .split(", ")
            .map(|c| format!("r.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM session_ratings r
             JOIN study_groups g ON g.id = r.group_id
             WHERE g.host_id = ? ORDER BY r.id"
        );
        let rows = sqlx::query_as::<_, RatingRow>(&sql)
            .bind(host_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        rows.into_iter().map(Rating::try_from).collect()
    }

    async fn commit_rating(&self, commit: &RatingCommit) -> Result<Group, StoreError> {
        let rating = &commit.rating;
        rating.validate()?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let group = fetch_group(&mut tx, &rating.group_id, false).await?;
        if group.status != GroupStatus::Completed {
            return Err(StoreError::Validation(format!(
                "lifecycle: a {} group cannot be rated",
                group.status
            )));
        }
        if group.host_id != commit.host_id {
            return Err(StoreError::Validation(
                "rating: host does not match the rated group".into(),
            ));
        }

        match &commit.previous {
            None => {
                sqlx::query(
                    "INSERT INTO session_ratings(id, group_id, rater_id, overall_rating,
                     productivity_rating, host_rating, comment, edit_count, created_at, updated_at)
                     VALUES(?,?,?,?,?,?,?,?,?,?)",
                )
                .bind(rating.id.0.to_string())
                .bind(rating.group_id.0.to_string())
                .bind(rating.rater_id.0.to_string())
                .bind(rating.overall_rating)
                .bind(rating.productivity_rating)
                .bind(rating.host_rating)
                .bind(&rating.comment)
                .bind(rating.edit_count)
                .bind(rating.created_at)
                .bind(rating.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
            }
            Some(previous) => {
                let result = sqlx::query(
                    "UPDATE session_ratings SET overall_rating = ?, productivity_rating = ?,
                     host_rating = ?, comment = ?, edit_count = ?, updated_at = ?
                     WHERE id = ? AND edit_count = ?",
                )
                .bind(rating.overall_rating)
                .bind(rating.productivity_rating)
                .bind(rating.host_rating)
                .bind(&rating.comment)
                .bind(rating.edit_count)
                .bind(rating.updated_at)
                .bind(previous.id.0.to_string())
                .bind(previous.edit_count)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict);
                }
            }
        }

        let delta = rating_tally_delta(commit.previous.as_ref(), rating);
        sqlx::query(
            "UPDATE study_groups SET total_ratings = total_ratings + ?, rating_sum = rating_sum + ?,
             productivity_count = productivity_count + ?, productivity_sum = productivity_sum + ?,
             updated_at = ? WHERE id = ?",
        )
        .bind(delta.count)
        .bind(delta.overall_sum)
        .bind(delta.productivity_count)
        .bind(delta.productivity_sum)
        .bind(Utc::now())
        .bind(rating.group_id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        refresh_group_averages(&mut tx, &rating.group_id).await?;

        let host_delta = host_rating_delta(commit.previous.as_ref(), rating);
        if !host_delta.is_zero() {
            ensure_user_stats(&mut tx, &commit.host_id).await?;
            sqlx::query(
                "UPDATE user_stats SET host_rating_sum = host_rating_sum + ?,
                 total_host_ratings = total_host_ratings + ? WHERE user_id = ?",
            )
            .bind(host_delta.sum)
            .bind(host_delta.count)
            .bind(commit.host_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
            refresh_user_derived(&mut tx, &commit.host_id).await?;
        }

        let updated = fetch_group(&mut tx, &rating.group_id, false).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        debug!(group_id = %rating.group_id, rater_id = %rating.rater_id, "rating commit applied");
        Ok(updated)
    }

    // ───────────────────────────── User aggregates ─────────────────────────────

    async fn get_user_aggregate(&self, user_id: &UserId) -> Result<UserAggregate, StoreError> {
        let sql = format!("SELECT {USER_STATS_COLUMNS} FROM user_stats WHERE user_id = ?");
        let row = sqlx::query_as::<_, UserStatsRow>(&sql)
            .bind(user_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or(StoreError::NotFound)?;
        UserAggregate::try_from(row)
    }

    async fn list_known_users(&self) -> Result<Vec<UserId>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM user_stats
             UNION SELECT host_id FROM study_groups
             UNION SELECT user_id FROM group_members
             ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        ids.iter().map(|id| parse_uuid(id).map(UserId)).collect()
    }

    // ───────────────────────────── Repair ─────────────────────────────

    async fn overwrite_group_aggregate(
        &self,
        group_id: &GroupId,
        current_members: i32,
        tally: &RatingTally,
    ) -> Result<(), StoreError> {
        let agg = GroupRatingAggregate::from(*tally);
        let result = sqlx::query(
            "UPDATE study_groups SET current_members = ?, total_ratings = ?, rating_sum = ?,
             productivity_count = ?, productivity_sum = ?, avg_rating = ?, avg_productivity = ?,
             updated_at = ? WHERE id = ?",
        )
        .bind(current_members)
        .bind(tally.count)
        .bind(tally.overall_sum)
        .bind(tally.productivity_count)
        .bind(tally.productivity_sum)
        .bind(agg.avg_rating)
        .bind(agg.avg_productivity)
        .bind(Utc::now())
        .bind(group_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn overwrite_user_aggregate(
        &self,
        expected: &UserAggregate,
        aggregate: &UserAggregate,
    ) -> Result<(), StoreError> {
        let user_id = aggregate.user_id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let updated = sqlx::query(
            "UPDATE user_stats SET
                sessions_hosted = ?, sessions_attended = ?, sessions_completed = ?,
                sessions_dropped = ?, reliability_score = ?, host_rating_sum = ?,
                total_host_ratings = ?, avg_host_rating = ?, current_streak = ?,
                longest_streak = ?, updated_at = ?
             WHERE user_id = ?
               AND sessions_hosted = ? AND sessions_attended = ? AND sessions_completed = ?
               AND sessions_dropped = ? AND host_rating_sum = ? AND total_host_ratings = ?
               AND current_streak = ? AND longest_streak = ?",
        )
        .bind(aggregate.sessions_hosted)
        .bind(aggregate.sessions_attended)
        .bind(aggregate.sessions_completed)
        .bind(aggregate.sessions_dropped)
        .bind(aggregate.reliability_score)
        .bind(aggregate.host_ratings.sum)
        .bind(aggregate.host_ratings.count)
        .bind(aggregate.avg_host_rating)
        .bind(aggregate.current_streak)
        .bind(aggregate.longest_streak)
        .bind(Utc::now())
        .bind(&user_id)
        .bind(expected.sessions_hosted)
        .bind(expected.sessions_attended)
        .bind(expected.sessions_completed)
        .bind(expected.sessions_dropped)
        .bind(expected.host_ratings.sum)
        .bind(expected.host_ratings.count)
        .bind(expected.current_streak)
        .bind(expected.longest_streak)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        if updated.rows_affected() == 0 {
            let exists =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_stats WHERE user_id = ?")
                    .bind(&user_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_err)?;
            // the row moved on since `expected` was read
            if exists > 0 || !expected.is_empty() {
                return Err(StoreError::Conflict);
            }
            sqlx::query(
                "INSERT INTO user_stats(user_id, sessions_hosted, sessions_attended,
                 sessions_completed, sessions_dropped, reliability_score, host_rating_sum,
                 total_host_ratings, avg_host_rating, current_streak, longest_streak, updated_at)
                 VALUES(?,?,?,?,?,?,?,?,?,?,?,?)",
            )
            .bind(&user_id)
            .bind(aggregate.sessions_hosted)
            .bind(aggregate.sessions_attended)
            .bind(aggregate.sessions_completed)
            .bind(aggregate.sessions_dropped)
            .bind(aggregate.reliability_score)
            .bind(aggregate.host_ratings.sum)
            .bind(aggregate.host_ratings.count)
            .bind(aggregate.avg_host_rating)
            .bind(aggregate.current_streak)
            .bind(aggregate.longest_streak)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }
}

use chrono::{NaiveDate, NaiveTime, Utc};
use studysync_storage::{
    CreateGroupParams, Group, GroupFilter, GroupId, GroupStatus, GroupStatusChange, Membership,
    MembershipCommit, MembershipId, MembershipStatus, MembershipWrite, Rating, RatingCommit,
    RatingId, RatingTally, Store, StoreError, UserAggregate, UserId,
};
use studysync_store_sqlite::SqliteStore;

fn group_params(host_id: UserId, max_members: i32) -> CreateGroupParams {
    CreateGroupParams {
        host_id,
        title: "Thermodynamics problem set".to_string(),
        subject: Some("physics".to_string()),
        description: None,
        min_members: 1,
        max_members,
        session_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
        start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        duration_minutes: 120,
    }
}

async fn published_group(s: &SqliteStore, max_members: i32) -> Group {
    let group = s
        .create_group(&group_params(UserId::new(), max_members))
        .await
        .unwrap();
    s.commit_group_status(&GroupStatusChange {
        group_id: group.id,
        from: GroupStatus::Draft,
        to: GroupStatus::Published,
    })
    .await
    .unwrap()
}

fn new_membership(group: &Group, user_id: UserId, status: MembershipStatus) -> Membership {
    let now = Utc::now();
    Membership {
        id: MembershipId::new(),
        group_id: group.id,
        user_id,
        status,
        waitlist_position: None,
        joined_at: (status == MembershipStatus::Joined).then_some(now),
        created_at: now,
        updated_at: now,
    }
}

fn insert(membership: Membership) -> MembershipWrite {
    MembershipWrite {
        membership,
        expected: None,
    }
}

fn transition(mut membership: Membership, to: MembershipStatus) -> MembershipWrite {
    let expected = Some(membership.status);
    membership.status = to;
    membership.waitlist_position = None;
    membership.updated_at = Utc::now();
    MembershipWrite {
        membership,
        expected,
    }
}

async fn commit(
    s: &SqliteStore,
    group: &Group,
    writes: Vec<MembershipWrite>,
) -> Result<Group, StoreError> {
    s.commit_memberships(&MembershipCommit {
        group_id: group.id,
        writes,
    })
    .await
}

async fn complete(s: &SqliteStore, group: &Group) -> Group {
    for (from, to) in [
        (GroupStatus::Published, GroupStatus::Ongoing),
        (GroupStatus::Ongoing, GroupStatus::Completed),
    ] {
        s.commit_group_status(&GroupStatusChange {
            group_id: group.id,
            from,
            to,
        })
        .await
        .unwrap();
    }
    s.get_group(&group.id).await.unwrap()
}

fn rating(
    group: &Group,
    rater_id: UserId,
    overall: i16,
    productivity: Option<i16>,
    host: Option<i16>,
) -> Rating {
    let now = Utc::now();
    Rating {
        id: RatingId::new(),
        group_id: group.id,
        rater_id,
        overall_rating: overall,
        productivity_rating: productivity,
        host_rating: host,
        comment: None,
        edit_count: 0,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn group_lifecycle_and_tombstones() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let host = UserId::new();

    let group = s.create_group(&group_params(host, 4)).await.unwrap();
    assert_eq!(group.status, GroupStatus::Draft);
    assert_eq!(group.current_members, 0);
    assert_eq!(group.end_time, NaiveTime::from_hms_opt(19, 0, 0).unwrap());
    assert!(group.aggregate().avg_rating.is_none());

    let err = s
        .create_group(&CreateGroupParams {
            min_members: 5,
            ..group_params(host, 4)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // skipping a lifecycle step is refused
    let err = s
        .commit_group_status(&GroupStatusChange {
            group_id: group.id,
            from: GroupStatus::Draft,
            to: GroupStatus::Completed,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    // stale expected status loses the compare-and-set
    let err = s
        .commit_group_status(&GroupStatusChange {
            group_id: group.id,
            from: GroupStatus::Published,
            to: GroupStatus::Ongoing,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));

    s.soft_delete_group(&group.id).await.unwrap();
    assert!(matches!(s.get_group(&group.id).await, Err(StoreError::NotFound)));
    assert!(s.list_groups(&GroupFilter::default()).await.unwrap().is_empty());

    let all = s.list_groups(&GroupFilter::everything()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_deleted());

    let hosted = s
        .list_groups(&GroupFilter {
            host_id: Some(host),
            include_deleted: true,
        })
        .await
        .unwrap();
    assert_eq!(hosted.len(), 1);
}

#[tokio::test]
async fn published_groups_cannot_be_deleted() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 3).await;
    let err = s.soft_delete_group(&group.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(s.get_group(&group.id).await.is_ok());
}

#[tokio::test]
async fn membership_commit_moves_member_count() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 2).await;
    let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());

    let g = commit(&s, &group, vec![insert(new_membership(&group, a, MembershipStatus::Joined))])
        .await
        .unwrap();
    assert_eq!(g.current_members, 1);

    let g = commit(&s, &group, vec![insert(new_membership(&group, b, MembershipStatus::Joined))])
        .await
        .unwrap();
    assert_eq!(g.current_members, 2);

    // full: the guard refuses and nothing from the write survives
    let err = commit(&s, &group, vec![insert(new_membership(&group, c, MembershipStatus::Joined))])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CapacityExceeded));
    assert!(matches!(
        s.get_membership(&group.id, &c).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(s.get_group(&group.id).await.unwrap().current_members, 2);

    // uniqueness per (group, user)
    let err = commit(&s, &group, vec![insert(new_membership(&group, a, MembershipStatus::Pending))])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    // a leave and a waitlist promotion in one unit of work keep the count at capacity
    let mut waiting = new_membership(&group, c, MembershipStatus::Waitlist);
    waiting.waitlist_position = Some(1);
    commit(&s, &group, vec![insert(waiting)]).await.unwrap();

    let leaving = s.get_membership(&group.id, &a).await.unwrap();
    let mut promoted = s.get_membership(&group.id, &c).await.unwrap();
    let promote_write = {
        promoted.joined_at = Some(Utc::now());
        transition(promoted, MembershipStatus::Joined)
    };
    let g = commit(&s, &group, vec![transition(leaving, MembershipStatus::Left), promote_write])
        .await
        .unwrap();
    assert_eq!(g.current_members, 2);
    assert_eq!(
        s.get_membership(&group.id, &c).await.unwrap().status,
        MembershipStatus::Joined
    );

    let members = s.list_group_memberships(&group.id).await.unwrap();
    assert_eq!(members.len(), 3);

    let stats_a = s.get_user_aggregate(&a).await.unwrap();
    assert_eq!(stats_a.sessions_attended, 0);
    assert_eq!(stats_a.sessions_dropped, 1);
    assert_eq!(stats_a.reliability_score, 0.0);
}

#[tokio::test]
async fn stale_expected_status_is_a_conflict() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 3).await;
    let user = UserId::new();
    commit(&s, &group, vec![insert(new_membership(&group, user, MembershipStatus::Pending))])
        .await
        .unwrap();

    let mut stale = s.get_membership(&group.id, &user).await.unwrap();
    stale.status = MembershipStatus::Waitlist;
    let err = commit(&s, &group, vec![transition(stale, MembershipStatus::Joined)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
    assert_eq!(s.get_group(&group.id).await.unwrap().current_members, 0);
}

#[tokio::test]
async fn draft_groups_freeze_memberships() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = s.create_group(&group_params(UserId::new(), 3)).await.unwrap();
    let err = commit(
        &s,
        &group,
        vec![insert(new_membership(&group, UserId::new(), MembershipStatus::Joined))],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn completion_credits_host_and_attendees() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 3).await;
    let attendee = UserId::new();
    commit(&s, &group, vec![insert(new_membership(&group, attendee, MembershipStatus::Joined))])
        .await
        .unwrap();

    let group = complete(&s, &group).await;
    assert_eq!(group.status, GroupStatus::Completed);

    let host_stats = s.get_user_aggregate(&group.host_id).await.unwrap();
    assert_eq!(host_stats.sessions_hosted, 1);

    let stats = s.get_user_aggregate(&attendee).await.unwrap();
    assert_eq!(stats.sessions_attended, 1);
    assert_eq!(stats.sessions_completed, 1);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.longest_streak, 1);
    assert_eq!(stats.reliability_score, 100.0);
}

#[tokio::test]
async fn rating_commit_maintains_group_and_host_aggregates() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 3).await;
    let (a, b) = (UserId::new(), UserId::new());
    commit(
        &s,
        &group,
        vec![
            insert(new_membership(&group, a, MembershipStatus::Joined)),
            insert(new_membership(&group, b, MembershipStatus::Joined)),
        ],
    )
    .await
    .unwrap();
    let group = complete(&s, &group).await;
    assert_eq!(group.aggregate().total_ratings, 0);

    let first = rating(&group, a, 4, None, Some(5));
    let g = s
        .commit_rating(&RatingCommit {
            rating: first.clone(),
            previous: None,
            host_id: group.host_id,
        })
        .await
        .unwrap();
    assert_eq!(g.avg_rating, Some(4.0));
    assert_eq!(g.avg_productivity, None);
    assert_eq!(g.rating_tally.count, 1);

    let g = s
        .commit_rating(&RatingCommit {
            rating: rating(&group, b, 2, Some(3), None),
            previous: None,
            host_id: group.host_id,
        })
        .await
        .unwrap();
    assert_eq!(g.avg_rating, Some(3.0));
    assert_eq!(g.avg_productivity, Some(3.0));
    assert_eq!(g.rating_tally.count, 2);

    // one rating per rater
    let err = s
        .commit_rating(&RatingCommit {
            rating: rating(&group, a, 1, None, None),
            previous: None,
            host_id: group.host_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    // edit replaces the old contribution
    let mut edited = first.clone();
    edited.overall_rating = 2;
    edited.host_rating = Some(3);
    edited.edit_count = 1;
    let g = s
        .commit_rating(&RatingCommit {
            rating: edited.clone(),
            previous: Some(first.clone()),
            host_id: group.host_id,
        })
        .await
        .unwrap();
    assert_eq!(g.avg_rating, Some(2.0));
    assert_eq!(g.rating_tally.count, 2);

    let stored = s.get_rating(&group.id, &a).await.unwrap();
    assert_eq!(stored.edit_count, 1);
    assert_eq!(stored.overall_rating, 2);

    // replaying the same edit loses the compare-and-set
    let err = s
        .commit_rating(&RatingCommit {
            rating: edited,
            previous: Some(first),
            host_id: group.host_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));

    let host_stats = s.get_user_aggregate(&group.host_id).await.unwrap();
    assert_eq!(host_stats.host_ratings.count, 1);
    assert_eq!(host_stats.avg_host_rating, Some(3.0));

    assert_eq!(s.list_group_ratings(&group.id).await.unwrap().len(), 2);
    assert_eq!(s.list_host_ratings(&group.host_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn ratings_require_completed_group() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 3).await;
    let err = s
        .commit_rating(&RatingCommit {
            rating: rating(&group, UserId::new(), 5, None, None),
            previous: None,
            host_id: group.host_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn repair_overwrites_derived_fields() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 5).await;

    let tally = RatingTally {
        count: 2,
        overall_sum: 9,
        productivity_count: 1,
        productivity_sum: 2,
    };
    s.overwrite_group_aggregate(&group.id, 3, &tally).await.unwrap();
    let g = s.get_group(&group.id).await.unwrap();
    assert_eq!(g.current_members, 3);
    assert_eq!(g.rating_tally, tally);
    assert_eq!(g.avg_rating, Some(4.5));
    assert_eq!(g.avg_productivity, Some(2.0));

    let user = UserId::new();
    let empty = UserAggregate::empty(user);
    let mut agg = empty.clone();
    agg.sessions_attended = 4;
    s.overwrite_user_aggregate(&empty, &agg).await.unwrap();
    let mut fixed = agg.clone();
    fixed.sessions_attended = 2;
    s.overwrite_user_aggregate(&agg, &fixed).await.unwrap();
    assert_eq!(s.get_user_aggregate(&user).await.unwrap().sessions_attended, 2);

    let known = s.list_known_users().await.unwrap();
    assert!(known.contains(&user));
    assert!(known.contains(&group.host_id));
}

#[tokio::test]
async fn user_overwrite_refuses_stale_counters() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = published_group(&s, 5).await;
    let user = UserId::new();

    // read before a join lands
    let before = UserAggregate::empty(user);
    commit(&s, &group, vec![insert(new_membership(&group, user, MembershipStatus::Joined))])
        .await
        .unwrap();

    let err = s.overwrite_user_aggregate(&before, &before).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
    assert_eq!(s.get_user_aggregate(&user).await.unwrap().sessions_attended, 1);

    // a missing row only matches the empty aggregate
    let stranger = UserId::new();
    let mut claimed = UserAggregate::empty(stranger);
    claimed.sessions_dropped = 1;
    let err = s
        .overwrite_user_aggregate(&claimed, &UserAggregate::empty(stranger))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict));
    assert!(matches!(
        s.get_user_aggregate(&stranger).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn tombstoned_group_is_still_readable_for_repair() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = s.create_group(&group_params(UserId::new(), 3)).await.unwrap();
    s.soft_delete_group(&group.id).await.unwrap();

    assert!(matches!(s.get_group(&group.id).await, Err(StoreError::NotFound)));
    let found = s.get_group_including_deleted(&group.id).await.unwrap();
    assert_eq!(found.id, group.id);
    assert!(found.deleted_at.is_some());
    assert!(matches!(
        s.get_group_including_deleted(&GroupId::new()).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("studysync.db").display());

    let group_id = {
        let s = SqliteStore::open(&url).await.unwrap();
        s.create_group(&group_params(UserId::new(), 4)).await.unwrap().id
    };

    let s = SqliteStore::open(&url).await.unwrap();
    assert_eq!(s.get_group(&group_id).await.unwrap().max_members, 4);
}

mod common;

use std::time::Duration;

use studysync_coordinator::{CoordinatorError, VerifyScope};
use studysync_storage::{GroupStatus, Store, UserId};

use common::{completed_group, fast_settings, open_group, scores, setup, setup_with};

#[tokio::test]
async fn group_averages_follow_each_rating() {
    let (c, _) = setup().await;
    let (a, b) = (UserId::new(), UserId::new());
    let group = completed_group(&c, &[a, b]).await;

    let agg = c.get_group_aggregate(&group.id).await.unwrap();
    assert_eq!(agg.avg_rating, None);
    assert_eq!(agg.avg_productivity, None);
    assert_eq!(agg.total_ratings, 0);

    c.submit_rating(&group.id, &a, scores(4, None, None)).await.unwrap();
    let agg = c.get_group_aggregate(&group.id).await.unwrap();
    assert_eq!(agg.avg_rating, Some(4.0));
    assert_eq!(agg.avg_productivity, None);
    assert_eq!(agg.total_ratings, 1);

    c.submit_rating(&group.id, &b, scores(2, Some(3), None)).await.unwrap();
    let agg = c.get_group_aggregate(&group.id).await.unwrap();
    assert_eq!(agg.avg_rating, Some(3.0));
    assert_eq!(agg.avg_productivity, Some(3.0));
    assert_eq!(agg.total_ratings, 2);

    assert!(c.verify_consistency(VerifyScope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn host_rating_lands_on_host_aggregate() {
    let (c, _) = setup().await;
    let (a, b) = (UserId::new(), UserId::new());
    let group = completed_group(&c, &[a, b]).await;

    c.submit_rating(&group.id, &a, scores(5, Some(4), Some(5))).await.unwrap();
    c.submit_rating(&group.id, &b, scores(3, None, Some(2))).await.unwrap();

    let host = c.get_user_aggregate(&group.host_id).await.unwrap();
    assert_eq!(host.host_ratings.count, 2);
    assert_eq!(host.host_ratings.sum, 7);
    assert_eq!(host.avg_host_rating, Some(3.5));
    assert_eq!(host.sessions_hosted, 1);
}

#[tokio::test]
async fn only_past_members_may_rate() {
    let (c, _) = setup().await;
    let member = UserId::new();
    let group = completed_group(&c, &[member]).await;

    let err = c
        .submit_rating(&group.id, &UserId::new(), scores(3, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotEligible(_)));

    let err = c
        .submit_rating(&group.id, &group.host_id, scores(5, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotEligible(_)));
}

#[tokio::test]
async fn member_who_left_early_may_still_rate() {
    let (c, _) = setup().await;
    let group = open_group(&c, 3).await;
    let (stayed, left) = (UserId::new(), UserId::new());
    c.join_group(&group.id, &stayed).await.unwrap();
    c.join_group(&group.id, &left).await.unwrap();
    c.change_group_status(&group.id, GroupStatus::Ongoing).await.unwrap();
    c.leave_group(&group.id, &left).await.unwrap();
    c.change_group_status(&group.id, GroupStatus::Completed).await.unwrap();

    c.submit_rating(&group.id, &left, scores(2, None, None)).await.unwrap();
    assert!(c.verify_consistency(VerifyScope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn pending_requester_is_not_eligible() {
    let (c, _) = setup().await;
    let group = open_group(&c, 3).await;
    let (member, requester) = (UserId::new(), UserId::new());
    c.join_group(&group.id, &member).await.unwrap();
    c.request_membership(&group.id, &requester).await.unwrap();
    c.change_group_status(&group.id, GroupStatus::Ongoing).await.unwrap();
    c.change_group_status(&group.id, GroupStatus::Completed).await.unwrap();

    let err = c
        .submit_rating(&group.id, &requester, scores(4, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotEligible(_)));
}

#[tokio::test]
async fn unfinished_sessions_cannot_be_rated() {
    let (c, _) = setup().await;
    let group = open_group(&c, 2).await;
    let member = UserId::new();
    c.join_group(&group.id, &member).await.unwrap();

    let err = c
        .submit_rating(&group.id, &member, scores(4, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotEligible(_)));
}

#[tokio::test]
async fn second_submission_is_a_duplicate() {
    let (c, _) = setup().await;
    let member = UserId::new();
    let group = completed_group(&c, &[member]).await;

    c.submit_rating(&group.id, &member, scores(4, None, None)).await.unwrap();
    let err = c
        .submit_rating(&group.id, &member, scores(1, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::DuplicateRating));
    assert_eq!(c.get_group_aggregate(&group.id).await.unwrap().avg_rating, Some(4.0));
}

#[tokio::test]
async fn out_of_range_scores_are_rejected() {
    let (c, _) = setup().await;
    let member = UserId::new();
    let group = completed_group(&c, &[member]).await;

    for bad in [
        scores(0, None, None),
        scores(6, None, None),
        scores(3, Some(9), None),
        scores(3, None, Some(0)),
    ] {
        let err = c.submit_rating(&group.id, &member, bad).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Validation(_)));
    }
    assert!(matches!(
        c.store().get_rating(&group.id, &member).await,
        Err(studysync_storage::StoreError::NotFound)
    ));
}

#[tokio::test]
async fn a_rating_can_be_edited_once() {
    let (c, _) = setup().await;
    let (a, b) = (UserId::new(), UserId::new());
    let group = completed_group(&c, &[a, b]).await;
    c.submit_rating(&group.id, &a, scores(5, Some(5), Some(4))).await.unwrap();
    c.submit_rating(&group.id, &b, scores(3, None, None)).await.unwrap();

    let edited = c
        .edit_rating(&group.id, &a, scores(1, None, Some(2)))
        .await
        .unwrap();
    assert_eq!(edited.edit_count, 1);
    assert_eq!(edited.overall_rating, 1);

    let agg = c.get_group_aggregate(&group.id).await.unwrap();
    assert_eq!(agg.avg_rating, Some(2.0));
    assert_eq!(agg.avg_productivity, None);
    assert_eq!(agg.total_ratings, 2);

    let host = c.get_user_aggregate(&group.host_id).await.unwrap();
    assert_eq!(host.avg_host_rating, Some(2.0));
    assert_eq!(host.host_ratings.count, 1);

    let err = c
        .edit_rating(&group.id, &a, scores(4, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::EditNotPermitted(_)));
    assert!(c.verify_consistency(VerifyScope::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn edits_close_with_the_window() {
    let mut settings = fast_settings();
    settings.rating_edit_window = Duration::ZERO;
    let (c, _) = setup_with(settings).await;
    let member = UserId::new();
    let group = completed_group(&c, &[member]).await;
    c.submit_rating(&group.id, &member, scores(4, None, None)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = c
        .edit_rating(&group.id, &member, scores(2, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::EditNotPermitted(_)));
    assert_eq!(c.get_group_aggregate(&group.id).await.unwrap().avg_rating, Some(4.0));
}

#[tokio::test]
async fn editing_a_missing_rating_is_not_found() {
    let (c, _) = setup().await;
    let member = UserId::new();
    let group = completed_group(&c, &[member]).await;
    let err = c
        .edit_rating(&group.id, &member, scores(3, None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotFound("rating")));
}

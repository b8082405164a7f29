use studysync_storage::{GroupId, RatingScores, UserId};

use super::fmt_avg;
use crate::App;

pub async fn cmd_rating_submit(
    app: &App,
    group_id: &GroupId,
    rater_id: &UserId,
    scores: RatingScores,
) -> Result<(), Box<dyn std::error::Error>> {
    let rating = app.submit_rating(group_id, rater_id, scores).await?;
    let group = app.get_group_aggregate(group_id).await?;

    println!("✓ Rating {} recorded", rating.id);
    println!(
        "  Group now at {} from {} ratings",
        fmt_avg(group.avg_rating),
        group.total_ratings
    );
    Ok(())
}

pub async fn cmd_rating_edit(
    app: &App,
    group_id: &GroupId,
    rater_id: &UserId,
    scores: RatingScores,
) -> Result<(), Box<dyn std::error::Error>> {
    let rating = app.edit_rating(group_id, rater_id, scores).await?;
    let group = app.get_group_aggregate(group_id).await?;

    println!("✓ Rating {} updated (no further edits allowed)", rating.id);
    println!("  Group now at {}", fmt_avg(group.avg_rating));
    Ok(())
}

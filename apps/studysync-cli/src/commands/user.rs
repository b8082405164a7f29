use studysync_storage::UserId;

use super::fmt_avg;
use crate::App;

pub async fn cmd_user_show(app: &App, user_id: &UserId) -> Result<(), Box<dyn std::error::Error>> {
    let agg = app.get_user_aggregate(user_id).await?;

    println!("User {}", agg.user_id);
    println!("  Hosted:     {}", agg.sessions_hosted);
    println!("  Attending:  {}", agg.sessions_attended);
    println!("  Completed:  {}", agg.sessions_completed);
    println!("  Dropped:    {}", agg.sessions_dropped);
    println!("  Reliability: {:.1}", agg.reliability_score);
    println!(
        "  Host rating: {} ({} ratings)",
        fmt_avg(agg.avg_host_rating),
        agg.host_ratings.count
    );
    println!(
        "  Streak: {} current, {} longest",
        agg.current_streak, agg.longest_streak
    );
    Ok(())
}

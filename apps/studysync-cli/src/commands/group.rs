use studysync_storage::{CreateGroupParams, GroupId, GroupStatus, Store};

use super::fmt_avg;
use crate::App;

pub async fn cmd_group_create(
    app: &App,
    params: CreateGroupParams,
) -> Result<(), Box<dyn std::error::Error>> {
    let group = app.create_group(params).await?;

    println!("✓ Group created: {}", group.title);
    println!("  ID: {}", group.id);
    println!(
        "  Session: {} {}-{} ({} min)",
        group.session_date, group.start_time, group.end_time, group.duration_minutes
    );
    println!("  Seats: {}..{}", group.min_members, group.max_members);

    Ok(())
}

pub async fn cmd_group_transition(
    app: &App,
    group_id: &GroupId,
    to: GroupStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    let group = app.change_group_status(group_id, to).await?;
    println!("✓ Group {} is now {}", group.id, group.status);
    Ok(())
}

pub async fn cmd_group_delete(
    app: &App,
    group_id: &GroupId,
) -> Result<(), Box<dyn std::error::Error>> {
    app.delete_group(group_id).await?;
    println!("✓ Group {group_id} deleted");
    Ok(())
}

pub async fn cmd_group_show(
    app: &App,
    group_id: &GroupId,
) -> Result<(), Box<dyn std::error::Error>> {
    let group = app.get_group(group_id).await?;
    let memberships = app.store().list_group_memberships(group_id).await?;

    println!("{} [{}]", group.title, group.status);
    println!("  ID: {}", group.id);
    println!("  Host: {}", group.host_id);
    if let Some(subject) = &group.subject {
        println!("  Subject: {subject}");
    }
    println!(
        "  Session: {} {}-{}",
        group.session_date, group.start_time, group.end_time
    );
    println!(
        "  Members: {}/{} (quorum {})",
        group.current_members, group.max_members, group.min_members
    );
    println!(
        "  Ratings: {} (avg {}, productivity {})",
        group.rating_tally.count,
        fmt_avg(group.avg_rating),
        fmt_avg(group.avg_productivity)
    );

    if memberships.is_empty() {
        println!("  No memberships.");
    } else {
        println!("  Memberships:");
        for m in memberships {
            match m.waitlist_position {
                Some(pos) => println!("    {} {} (#{pos})", m.user_id, m.status),
                None => println!("    {} {}", m.user_id, m.status),
            }
        }
    }

    Ok(())
}

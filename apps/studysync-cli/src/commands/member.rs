use studysync_storage::{GroupId, Membership, MembershipStatus, UserId};

use crate::App;

fn print_membership(m: &Membership) {
    match m.waitlist_position {
        Some(pos) => println!(
            "✓ {} is {} on {} (position {pos})",
            m.user_id, m.status, m.group_id
        ),
        None => println!("✓ {} is {} on {}", m.user_id, m.status, m.group_id),
    }
}

pub async fn cmd_member_join(
    app: &App,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    let membership = app.join_group(group_id, user_id).await?;
    print_membership(&membership);
    Ok(())
}

pub async fn cmd_member_waitlist(
    app: &App,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    let membership = app.join_waitlist(group_id, user_id).await?;
    print_membership(&membership);
    Ok(())
}

pub async fn cmd_member_request(
    app: &App,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    let membership = app.request_membership(group_id, user_id).await?;
    print_membership(&membership);
    Ok(())
}

pub async fn cmd_member_leave(
    app: &App,
    group_id: &GroupId,
    user_id: &UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    app.leave_group(group_id, user_id).await?;
    println!("✓ {user_id} left {group_id}");
    Ok(())
}

pub async fn cmd_member_set_status(
    app: &App,
    group_id: &GroupId,
    user_id: &UserId,
    status: MembershipStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    let membership = app
        .change_membership_status(group_id, user_id, status)
        .await?;
    print_membership(&membership);
    Ok(())
}

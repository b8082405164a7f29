use studysync_storage::MembershipStatus;

/// Change to a group's `current_members` caused by one membership write.
///
/// `old` is `None` when the row is being created.
pub fn member_count_delta(old: Option<MembershipStatus>, new: MembershipStatus) -> i32 {
    let was_joined = old == Some(MembershipStatus::Joined);
    let is_joined = new == MembershipStatus::Joined;
    match (was_joined, is_joined) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// Change to a member's dropped-session count caused by one membership write.
pub fn dropped_delta(old: Option<MembershipStatus>, new: MembershipStatus) -> i64 {
    let was_dropped = old.map(|s| s.is_dropped()).unwrap_or(false);
    match (was_dropped, new.is_dropped()) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

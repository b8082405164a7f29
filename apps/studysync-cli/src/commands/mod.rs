pub mod group;
pub mod member;
pub mod rating;
pub mod user;
pub mod verify;

pub use group::{cmd_group_create, cmd_group_delete, cmd_group_show, cmd_group_transition};
pub use member::{
    cmd_member_join, cmd_member_leave, cmd_member_request, cmd_member_set_status,
    cmd_member_waitlist,
};
pub use rating::{cmd_rating_edit, cmd_rating_submit};
pub use user::cmd_user_show;
pub use verify::cmd_verify;

/// Render an optional average the way every command prints it.
pub(crate) fn fmt_avg(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

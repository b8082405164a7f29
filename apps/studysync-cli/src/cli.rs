use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use studysync_storage::{GroupId, MembershipStatus, UserId};

#[derive(Parser)]
#[command(name = "studysync")]
#[command(about = "Study group aggregate maintenance CLI")]
pub struct Cli {
    /// Database URL (overrides the config file)
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Path to a JSON config file (defaults to ~/.studysync/config.json)
    #[arg(long, global = true, env = "STUDYSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Group lifecycle commands
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
    /// Membership commands
    Member {
        #[command(subcommand)]
        member_cmd: MemberCommand,
    },
    /// Rating commands
    Rating {
        #[command(subcommand)]
        rating_cmd: RatingCommand,
    },
    /// User aggregate commands
    User {
        #[command(subcommand)]
        user_cmd: UserCommand,
    },
    /// Recount derived fields and report drift
    Verify {
        /// Only check this group
        #[arg(long, conflicts_with = "user")]
        group: Option<GroupId>,

        /// Only check this user
        #[arg(long)]
        user: Option<UserId>,

        /// Overwrite drifted aggregates with their recounts
        #[arg(long)]
        repair: bool,
    },
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a draft group
    Create {
        /// Hosting user
        #[arg(long)]
        host: UserId,

        #[arg(long)]
        title: String,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Quorum needed to start the session
        #[arg(long, default_value_t = 2)]
        min_members: i32,

        #[arg(long, default_value_t = 10)]
        max_members: i32,

        /// Session date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Start time (HH:MM:SS)
        #[arg(long)]
        start: NaiveTime,

        /// Session length in minutes
        #[arg(long)]
        duration: i32,
    },
    /// Open a draft group for joining
    Publish { group_id: GroupId },
    /// Mark a published group as in session
    Start { group_id: GroupId },
    /// Finish an ongoing session
    Complete { group_id: GroupId },
    /// Cancel a draft, published or ongoing group
    Cancel { group_id: GroupId },
    /// Delete a draft or cancelled group
    Delete { group_id: GroupId },
    /// Show a group and its aggregates
    Show { group_id: GroupId },
}

#[derive(Subcommand)]
pub enum MemberCommand {
    /// Join a group directly
    Join { group_id: GroupId, user_id: UserId },
    /// Queue for a seat
    Waitlist { group_id: GroupId, user_id: UserId },
    /// Ask the host for a seat
    Request { group_id: GroupId, user_id: UserId },
    /// Leave a group or its waitlist
    Leave { group_id: GroupId, user_id: UserId },
    /// Force a membership into a status (approve, reject, remove)
    SetStatus {
        group_id: GroupId,
        user_id: UserId,
        status: MembershipStatus,
    },
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Overall score, 1-5
    #[arg(long)]
    pub overall: i16,

    /// Productivity score, 1-5
    #[arg(long)]
    pub productivity: Option<i16>,

    /// Score for the host, 1-5
    #[arg(long)]
    pub host_score: Option<i16>,

    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Subcommand)]
pub enum RatingCommand {
    /// Rate a completed session
    Submit {
        group_id: GroupId,
        rater_id: UserId,
        #[command(flatten)]
        scores: ScoreArgs,
    },
    /// Replace an existing rating
    Edit {
        group_id: GroupId,
        rater_id: UserId,
        #[command(flatten)]
        scores: ScoreArgs,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Show a user's aggregate counters
    Show { user_id: UserId },
}

impl From<ScoreArgs> for studysync_storage::RatingScores {
    fn from(args: ScoreArgs) -> Self {
        Self {
            overall: args.overall,
            productivity: args.productivity,
            host: args.host_score,
            comment: args.comment,
        }
    }
}

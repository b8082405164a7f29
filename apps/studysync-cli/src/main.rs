mod cli;
mod commands;

use clap::Parser;
use std::sync::Arc;

use cli::{Cli, Command, GroupCommand, MemberCommand, RatingCommand, UserCommand};
use commands::*;
use studysync_config::Config;
use studysync_coordinator::{Coordinator, CoordinatorSettings, VerifyScope};
use studysync_events_memory::MemoryEventBus;
use studysync_storage::GroupStatus;
use studysync_store_sqlite::SqliteStore;

pub type App = Coordinator<SqliteStore>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    config.validate()?;

    let store = SqliteStore::open(&config.database_url).await?;
    tracing::debug!(database_url = %config.database_url, "store opened");
    if let Command::Migrate = cli.command {
        println!("✓ Database at {} is up to date", config.database_url);
        return Ok(());
    }

    let app = Coordinator::new(
        Arc::new(store),
        Arc::new(MemoryEventBus::new()),
        CoordinatorSettings::from(&config),
    );

    match cli.command {
        Command::Migrate => {}
        Command::Group { group_cmd } => match group_cmd {
            GroupCommand::Create {
                host,
                title,
                subject,
                description,
                min_members,
                max_members,
                date,
                start,
                duration,
            } => {
                let params = studysync_storage::CreateGroupParams {
                    host_id: host,
                    title,
                    subject,
                    description,
                    min_members,
                    max_members,
                    session_date: date,
                    start_time: start,
                    duration_minutes: duration,
                };
                cmd_group_create(&app, params).await?;
            }
            GroupCommand::Publish { group_id } => {
                cmd_group_transition(&app, &group_id, GroupStatus::Published).await?;
            }
            GroupCommand::Start { group_id } => {
                cmd_group_transition(&app, &group_id, GroupStatus::Ongoing).await?;
            }
            GroupCommand::Complete { group_id } => {
                cmd_group_transition(&app, &group_id, GroupStatus::Completed).await?;
            }
            GroupCommand::Cancel { group_id } => {
                cmd_group_transition(&app, &group_id, GroupStatus::Cancelled).await?;
            }
            GroupCommand::Delete { group_id } => {
                cmd_group_delete(&app, &group_id).await?;
            }
            GroupCommand::Show { group_id } => {
                cmd_group_show(&app, &group_id).await?;
            }
        },
        Command::Member { member_cmd } => match member_cmd {
            MemberCommand::Join { group_id, user_id } => {
                cmd_member_join(&app, &group_id, &user_id).await?;
            }
            MemberCommand::Waitlist { group_id, user_id } => {
                cmd_member_waitlist(&app, &group_id, &user_id).await?;
            }
            MemberCommand::Request { group_id, user_id } => {
                cmd_member_request(&app, &group_id, &user_id).await?;
            }
            MemberCommand::Leave { group_id, user_id } => {
                cmd_member_leave(&app, &group_id, &user_id).await?;
            }
            MemberCommand::SetStatus {
                group_id,
                user_id,
                status,
            } => {
                cmd_member_set_status(&app, &group_id, &user_id, status).await?;
            }
        },
        Command::Rating { rating_cmd } => match rating_cmd {
            RatingCommand::Submit {
                group_id,
                rater_id,
                scores,
            } => {
                cmd_rating_submit(&app, &group_id, &rater_id, scores.into()).await?;
            }
            RatingCommand::Edit {
                group_id,
                rater_id,
                scores,
            } => {
                cmd_rating_edit(&app, &group_id, &rater_id, scores.into()).await?;
            }
        },
        Command::User { user_cmd } => match user_cmd {
            UserCommand::Show { user_id } => {
                cmd_user_show(&app, &user_id).await?;
            }
        },
        Command::Verify {
            group,
            user,
            repair,
        } => {
            let scope = match (group, user) {
                (Some(group_id), _) => VerifyScope::Group(group_id),
                (None, Some(user_id)) => VerifyScope::User(user_id),
                (None, None) => VerifyScope::All,
            };
            let clean = cmd_verify(&app, scope, repair).await?;
            if !clean {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

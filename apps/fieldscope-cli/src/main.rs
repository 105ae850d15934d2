mod cli;
mod commands;

use std::sync::Arc;

use clap::Parser;
use fieldscope_store_sqlite::SqliteStore;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, HierarchyCommand, RoleCommand};
use commands::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Arc::new(SqliteStore::open(&cli.database_url).await?);

    match cli.command {
        Command::Resolve(args) => {
            cmd_resolve(store, args).await?;
        }
        Command::Grant(args) => {
            cmd_assignment_grant(&store, args).await?;
        }
        Command::Update(args) => {
            cmd_assignment_update(&store, args).await?;
        }
        Command::Revoke {
            assignment_id,
            actor,
        } => {
            cmd_assignment_revoke(&store, assignment_id, actor).await?;
        }
        Command::Transfer {
            assignment_id,
            to,
            actor,
        } => {
            cmd_assignment_transfer(&store, assignment_id, to, actor).await?;
        }
        Command::History { principal } => {
            cmd_assignment_history(&store, principal).await?;
        }
        Command::Role { role_cmd } => match role_cmd {
            RoleCommand::Create { name, tier, org } => {
                cmd_role_create(&store, &name, tier, org).await?;
            }
            RoleCommand::Get { role_id } => {
                cmd_role_get(&store, role_id).await?;
            }
        },
        Command::Hierarchy { hierarchy_cmd } => match hierarchy_cmd {
            HierarchyCommand::Organization { id, name } => {
                cmd_hierarchy_organization(&store, id, &name).await?;
            }
            HierarchyCommand::Location { id, name, org } => {
                cmd_hierarchy_location(&store, id, &name, org).await?;
            }
            HierarchyCommand::Project {
                id,
                name,
                org,
                location,
            } => {
                cmd_hierarchy_project(&store, id, &name, org, location).await?;
            }
        },
    }

    Ok(())
}

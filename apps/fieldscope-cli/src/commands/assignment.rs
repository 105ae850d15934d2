use fieldscope_storage::{
    AssignmentId, AssignmentStore, ContextId, CreateAssignmentParams, PrincipalId,
    UpdateAssignmentParams, ValidityWindow,
};
use fieldscope_store_sqlite::SqliteStore;
use tracing::info;

use super::print_json;
use crate::cli::{GrantArgs, UpdateArgs};

pub async fn cmd_assignment_grant(
    store: &SqliteStore,
    args: GrantArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut params = CreateAssignmentParams::new(
        args.principal,
        args.role,
        args.tier,
        ContextId(args.context),
    )
    .with_validity(ValidityWindow::new(args.starts_on, args.ends_on));
    if let Some(trade) = args.trade {
        params = params.with_trade(trade);
    }
    if args.primary {
        params = params.primary();
    }
    if let Some(actor) = args.actor {
        params = params.created_by(actor);
    }

    let assignment = store.create_assignment(&params).await?;
    info!(
        assignment = %assignment.id,
        principal = %assignment.principal_id,
        tier = %assignment.context_tier,
        context = %assignment.context_id,
        "granted"
    );
    print_json(&assignment)
}

/// Turn a set/clear flag pair into a partial-update field.
fn set_or_clear<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

pub async fn cmd_assignment_update(
    store: &SqliteStore,
    args: UpdateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = UpdateAssignmentParams {
        role_id: args.role,
        trade: set_or_clear(args.trade, args.clear_trade),
        is_primary: args.primary,
        starts_on: set_or_clear(args.starts_on, args.clear_starts_on),
        ends_on: set_or_clear(args.ends_on, args.clear_ends_on),
        updated_by: args.actor,
    };

    let assignment = store
        .update_assignment(&args.assignment_id, &params)
        .await?;
    info!(assignment = %assignment.id, "updated");
    print_json(&assignment)
}

pub async fn cmd_assignment_revoke(
    store: &SqliteStore,
    assignment_id: AssignmentId,
    actor: Option<PrincipalId>,
) -> Result<(), Box<dyn std::error::Error>> {
    store.soft_delete_assignment(&assignment_id, actor).await?;
    info!(assignment = %assignment_id, "revoked");
    println!("Revoked assignment {}", assignment_id);
    Ok(())
}

pub async fn cmd_assignment_transfer(
    store: &SqliteStore,
    assignment_id: AssignmentId,
    to: PrincipalId,
    actor: Option<PrincipalId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let moved = store.transfer_assignment(&assignment_id, &to, actor).await?;
    info!(from = %assignment_id, to = %moved.id, principal = %to, "transferred");
    print_json(&moved)
}

pub async fn cmd_assignment_history(
    store: &SqliteStore,
    principal: PrincipalId,
) -> Result<(), Box<dyn std::error::Error>> {
    let history = store.list_assignment_history(&principal).await?;
    print_json(&history)
}

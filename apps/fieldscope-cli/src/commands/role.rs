use fieldscope_storage::{AssignmentStore, ContextTier, CreateRoleParams, OrganizationId, RoleId};
use fieldscope_store_sqlite::SqliteStore;
use tracing::info;

use super::print_json;

pub async fn cmd_role_create(
    store: &SqliteStore,
    name: &str,
    tier: ContextTier,
    org: Option<OrganizationId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let role = store
        .create_role(&CreateRoleParams {
            name: name.to_string(),
            scope_tier: tier,
            organization_id: org,
        })
        .await?;
    info!(role = %role.id, name = %role.name, "role created");
    print_json(&role)
}

pub async fn cmd_role_get(
    store: &SqliteStore,
    role_id: RoleId,
) -> Result<(), Box<dyn std::error::Error>> {
    let role = store.get_role(&role_id).await?;
    print_json(&role)
}

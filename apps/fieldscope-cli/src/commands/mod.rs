pub mod assignment;
pub mod hierarchy;
pub mod resolve;
pub mod role;

pub use assignment::{
    cmd_assignment_grant, cmd_assignment_history, cmd_assignment_revoke,
    cmd_assignment_transfer, cmd_assignment_update,
};
pub use hierarchy::{cmd_hierarchy_location, cmd_hierarchy_organization, cmd_hierarchy_project};
pub use resolve::cmd_resolve;
pub use role::{cmd_role_create, cmd_role_get};

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

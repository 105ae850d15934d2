use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fieldscope_storage::{
    AssignmentId, ContextTier, LocationId, OrganizationId, PrincipalId, ProjectId, RoleId,
};

#[derive(Parser)]
#[command(name = "fieldscope")]
#[command(about = "Manage role assignments and resolve hierarchical access scopes")]
pub struct Cli {
    /// SQLite database URL
    #[arg(
        long,
        env = "FIELDSCOPE_DATABASE_URL",
        default_value = "sqlite://fieldscope.db?mode=rwc"
    )]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve a principal's effective access and print it as JSON
    Resolve(ResolveArgs),
    /// Grant a role to a principal at a context
    Grant(GrantArgs),
    /// Update an active assignment
    Update(UpdateArgs),
    /// Soft-delete an assignment
    Revoke {
        /// Assignment ID
        assignment_id: AssignmentId,

        /// Acting principal, recorded for audit
        #[arg(long)]
        actor: Option<PrincipalId>,
    },
    /// Move an assignment to another principal
    Transfer {
        /// Assignment ID
        assignment_id: AssignmentId,

        /// Receiving principal
        #[arg(long)]
        to: PrincipalId,

        /// Acting principal, recorded for audit
        #[arg(long)]
        actor: Option<PrincipalId>,
    },
    /// Every assignment ever held by a principal, deleted ones included
    History {
        /// Principal ID
        principal: PrincipalId,
    },
    /// Role commands
    Role {
        #[command(subcommand)]
        role_cmd: RoleCommand,
    },
    /// Register resource rows the hierarchy is derived from
    Hierarchy {
        #[command(subcommand)]
        hierarchy_cmd: HierarchyCommand,
    },
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Principal ID
    #[arg(long)]
    pub principal: PrincipalId,

    /// Principal's home organization
    #[arg(long)]
    pub org: OrganizationId,

    /// Treat the principal as a super admin
    #[arg(long)]
    pub super_admin: bool,

    /// Resource being listed: "project" or the name of a project-nested resource
    #[arg(long, default_value = "project")]
    pub target: String,

    /// Explicit organization to narrow to
    #[arg(long)]
    pub scope_org: Option<OrganizationId>,

    /// Explicit location to narrow to
    #[arg(long)]
    pub location: Option<LocationId>,

    /// Evaluation date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Force location-first mode on, regardless of FIELDSCOPE_LOCATION_FIRST
    #[arg(long)]
    pub location_first: bool,
}

#[derive(Args)]
pub struct GrantArgs {
    /// Principal receiving the grant
    #[arg(long)]
    pub principal: PrincipalId,

    /// Role ID
    #[arg(long)]
    pub role: RoleId,

    /// Context tier: organization, location or project
    #[arg(long)]
    pub tier: ContextTier,

    /// Organization, location or project ID, matching the tier
    #[arg(long)]
    pub context: i64,

    /// First day the grant is active (inclusive)
    #[arg(long)]
    pub starts_on: Option<NaiveDate>,

    /// Last day the grant is active (inclusive)
    #[arg(long)]
    pub ends_on: Option<NaiveDate>,

    /// Trade/specialization tag
    #[arg(long)]
    pub trade: Option<String>,

    /// Mark as the principal's primary assignment
    #[arg(long)]
    pub primary: bool,

    /// Acting principal, recorded for audit
    #[arg(long)]
    pub actor: Option<PrincipalId>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Assignment ID
    pub assignment_id: AssignmentId,

    /// New role ID
    #[arg(long)]
    pub role: Option<RoleId>,

    /// New trade tag
    #[arg(long, conflicts_with = "clear_trade")]
    pub trade: Option<String>,

    /// Remove the trade tag
    #[arg(long)]
    pub clear_trade: bool,

    /// Set or unset the primary flag
    #[arg(long)]
    pub primary: Option<bool>,

    /// New start date
    #[arg(long, conflicts_with = "clear_starts_on")]
    pub starts_on: Option<NaiveDate>,

    /// Make the start open-ended
    #[arg(long)]
    pub clear_starts_on: bool,

    /// New end date
    #[arg(long, conflicts_with = "clear_ends_on")]
    pub ends_on: Option<NaiveDate>,

    /// Make the end open-ended
    #[arg(long)]
    pub clear_ends_on: bool,

    /// Acting principal, recorded for audit
    #[arg(long)]
    pub actor: Option<PrincipalId>,
}

#[derive(Subcommand)]
pub enum RoleCommand {
    /// Create a role
    Create {
        /// Role name
        name: String,

        /// Tier the role is meant for
        #[arg(long)]
        tier: ContextTier,

        /// Owning organization (omit for a global role)
        #[arg(long)]
        org: Option<OrganizationId>,
    },
    /// Show a role
    Get {
        /// Role ID
        role_id: RoleId,
    },
}

#[derive(Subcommand)]
pub enum HierarchyCommand {
    /// Add an organization
    Organization {
        id: OrganizationId,
        name: String,
    },
    /// Add a location under an organization
    Location {
        id: LocationId,
        name: String,
        #[arg(long)]
        org: OrganizationId,
    },
    /// Add a project under a location
    Project {
        id: ProjectId,
        name: String,
        #[arg(long)]
        org: OrganizationId,
        #[arg(long)]
        location: LocationId,
    },
}

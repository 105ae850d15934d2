//! The traits that backends implement.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::types::*;
use crate::StoreError;

/// Durable storage of role assignments.
///
/// "Active" always means: not soft-deleted AND inside the validity window on
/// the `as_of` day. Expiry is never written back; it is re-evaluated on read.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait AssignmentStore: Send + Sync {
    // ───────────────────────────────────── Roles ──────────────────────────────────────────

    /// Create a role (returns the stored record).
    async fn create_role(&self, params: &CreateRoleParams) -> Result<Role, StoreError>;

    /// Get a role by ID.
    async fn get_role(&self, role_id: &RoleId) -> Result<Role, StoreError>;

    // ─────────────────────────────────── Assignments ──────────────────────────────────────

    /// Grant a role to a principal at a context.
    ///
    /// Fails with `Conflict` if a non-deleted assignment with the same
    /// (principal, role, tier, context) tuple exists, and with `Invalid` if the
    /// role is unknown or the validity window is inverted.
    async fn create_assignment(
        &self,
        params: &CreateAssignmentParams,
    ) -> Result<Assignment, StoreError>;

    /// Apply a partial update. `NotFound` if missing or soft-deleted.
    async fn update_assignment(
        &self,
        assignment_id: &AssignmentId,
        params: &UpdateAssignmentParams,
    ) -> Result<Assignment, StoreError>;

    /// Retire an assignment. A second call returns `NotFound`.
    async fn soft_delete_assignment(
        &self,
        assignment_id: &AssignmentId,
        deleted_by: Option<PrincipalId>,
    ) -> Result<(), StoreError>;

    /// Move an assignment to another principal: the source is soft-deleted and
    /// an equivalent grant is created for `to_principal`, atomically.
    async fn transfer_assignment(
        &self,
        assignment_id: &AssignmentId,
        to_principal: &PrincipalId,
        actor: Option<PrincipalId>,
    ) -> Result<Assignment, StoreError>;

    /// Get an assignment by ID, including soft-deleted rows (audit read).
    async fn get_assignment(&self, assignment_id: &AssignmentId)
        -> Result<Assignment, StoreError>;

    /// List a principal's active assignments, optionally at a single tier.
    async fn list_active_assignments(
        &self,
        principal_id: &PrincipalId,
        tier: Option<ContextTier>,
        as_of: NaiveDate,
    ) -> Result<Vec<Assignment>, StoreError>;

    /// Raw, un-expanded context ids of a principal's active grants at exactly `tier`.
    async fn get_context_ids(
        &self,
        principal_id: &PrincipalId,
        tier: ContextTier,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<ContextId>, StoreError>;

    /// Every assignment ever created for a principal, deleted and expired
    /// included, oldest first.
    async fn list_assignment_history(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Vec<Assignment>, StoreError>;

    /// Active assignments held at one context (who can act here).
    async fn list_context_assignments(
        &self,
        tier: ContextTier,
        context_id: &ContextId,
        as_of: NaiveDate,
    ) -> Result<Vec<Assignment>, StoreError>;
}

/// Read-only parent/child relationships between organizations, locations and
/// projects, derived from the resource tables' own foreign keys.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait HierarchyIndex: Send + Sync {
    /// All locations belonging to an organization.
    async fn locations_of_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<LocationId>, StoreError>;

    /// Projects under a location, restricted to the given organization so a
    /// foreign location id cannot leak another tenant's projects.
    async fn projects_of_location(
        &self,
        location_id: &LocationId,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<ProjectId>, StoreError>;

    /// All projects belonging to an organization.
    async fn projects_of_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<ProjectId>, StoreError>;
}

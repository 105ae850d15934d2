//! In-memory store implementation.
//!
//! Suitable for:
//! - Single-process deployments that load the hierarchy at startup
//! - Development and testing
//!
//! Nothing survives a restart. Use the SQLite backend when grants must persist.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use fieldscope_storage::{
    Assignment, AssignmentId, AssignmentStore, ContextId, ContextTier, CreateAssignmentParams,
    CreateRoleParams, HierarchyIndex, Location, LocationId, Organization, OrganizationId,
    PrincipalId, Project, ProjectId, Role, RoleId, StoreError, UpdateAssignmentParams,
};
use tokio::sync::Mutex;

/// Grant state guarded by one lock so the uniqueness check and the insert
/// happen together.
#[derive(Default)]
struct Grants {
    next_role_id: i64,
    next_assignment_id: i64,
    roles: BTreeMap<RoleId, Role>,
    assignments: BTreeMap<AssignmentId, Assignment>,
}

impl Grants {
    fn has_live_duplicate(&self, candidate: &Assignment) -> bool {
        self.assignments.values().any(|existing| {
            existing.id != candidate.id
                && !existing.is_deleted()
                && existing.tuple() == candidate.tuple()
        })
    }

    fn ensure_role(&self, role_id: &RoleId, grant_tier: ContextTier) -> Result<(), StoreError> {
        self.roles
            .get(role_id)
            .ok_or_else(|| StoreError::Invalid(format!("unknown role {}", role_id)))?
            .scope_tier
            .check_grant_tier(grant_tier)
    }

    fn insert(&mut self, params: &CreateAssignmentParams) -> Result<Assignment, StoreError> {
        params.validity.validate()?;
        self.ensure_role(&params.role_id, params.context_tier)?;

        let now = Utc::now();
        let candidate = Assignment {
            id: AssignmentId(self.next_assignment_id + 1),
            principal_id: params.principal_id,
            role_id: params.role_id,
            context_tier: params.context_tier,
            context_id: params.context_id,
            trade: params.trade.clone(),
            is_primary: params.is_primary,
            validity: params.validity,
            created_by: params.created_by,
            updated_by: params.created_by,
            deleted_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        if self.has_live_duplicate(&candidate) {
            return Err(StoreError::Conflict);
        }

        self.next_assignment_id += 1;
        self.assignments.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    fn live_mut(&mut self, assignment_id: &AssignmentId) -> Result<&mut Assignment, StoreError> {
        self.assignments
            .get_mut(assignment_id)
            .filter(|a| !a.is_deleted())
            .ok_or(StoreError::NotFound)
    }

    fn retire(
        &mut self,
        assignment_id: &AssignmentId,
        deleted_by: Option<PrincipalId>,
    ) -> Result<(), StoreError> {
        let assignment = self.live_mut(assignment_id)?;
        let now = Utc::now();
        assignment.deleted_at = Some(now);
        assignment.deleted_by = deleted_by;
        assignment.updated_at = now;
        Ok(())
    }
}

/// In-memory assignment store and hierarchy index.
pub struct MemoryStore {
    organizations: DashMap<OrganizationId, Organization>,
    locations: DashMap<LocationId, Location>,
    projects: DashMap<ProjectId, Project>,
    grants: Mutex<Grants>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            organizations: DashMap::new(),
            locations: DashMap::new(),
            projects: DashMap::new(),
            grants: Mutex::new(Grants::default()),
        }
    }

    pub fn insert_organization(&self, org: Organization) -> Result<(), StoreError> {
        match self.organizations.entry(org.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(org);
                Ok(())
            }
        }
    }

    /// The parent organization must already be present.
    pub fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        self.ensure_organization(&location.organization_id)?;
        match self.locations.entry(location.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(location);
                Ok(())
            }
        }
    }

    /// The parent organization and location must already be present.
    pub fn insert_project(&self, project: Project) -> Result<(), StoreError> {
        self.ensure_organization(&project.organization_id)?;
        if !self.locations.contains_key(&project.location_id) {
            return Err(StoreError::Invalid(format!(
                "unknown location {}",
                project.location_id
            )));
        }
        match self.projects.entry(project.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(project);
                Ok(())
            }
        }
    }

    fn ensure_organization(&self, organization_id: &OrganizationId) -> Result<(), StoreError> {
        if self.organizations.contains_key(organization_id) {
            Ok(())
        } else {
            Err(StoreError::Invalid(format!(
                "unknown organization {}",
                organization_id
            )))
        }
    }

    /// Snapshot of every project row, ordered by id.
    pub fn projects(&self) -> Vec<Project> {
        let mut rows: Vec<Project> = self.projects.iter().map(|p| p.value().clone()).collect();
        rows.sort_by_key(|p| p.id);
        rows
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn create_role(&self, params: &CreateRoleParams) -> Result<Role, StoreError> {
        let mut grants = self.grants.lock().await;
        if grants.roles.values().any(|r| r.name == params.name) {
            return Err(StoreError::Conflict);
        }
        grants.next_role_id += 1;
        let role = Role {
            id: RoleId(grants.next_role_id),
            name: params.name.clone(),
            scope_tier: params.scope_tier,
            organization_id: params.organization_id,
            created_at: Utc::now(),
        };
        grants.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn get_role(&self, role_id: &RoleId) -> Result<Role, StoreError> {
        let grants = self.grants.lock().await;
        grants.roles.get(role_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create_assignment(
        &self,
        params: &CreateAssignmentParams,
    ) -> Result<Assignment, StoreError> {
        self.grants.lock().await.insert(params)
    }

    async fn update_assignment(
        &self,
        assignment_id: &AssignmentId,
        params: &UpdateAssignmentParams,
    ) -> Result<Assignment, StoreError> {
        let mut grants = self.grants.lock().await;
        let next = params.apply_to(grants.live_mut(assignment_id)?)?;
        grants.ensure_role(&next.role_id, next.context_tier)?;
        if grants.has_live_duplicate(&next) {
            return Err(StoreError::Conflict);
        }
        grants.assignments.insert(next.id, next.clone());
        Ok(next)
    }

    async fn soft_delete_assignment(
        &self,
        assignment_id: &AssignmentId,
        deleted_by: Option<PrincipalId>,
    ) -> Result<(), StoreError> {
        self.grants.lock().await.retire(assignment_id, deleted_by)
    }

    async fn transfer_assignment(
        &self,
        assignment_id: &AssignmentId,
        to_principal: &PrincipalId,
        actor: Option<PrincipalId>,
    ) -> Result<Assignment, StoreError> {
        let mut grants = self.grants.lock().await;
        let source = grants.live_mut(assignment_id)?.clone();

        let params = CreateAssignmentParams {
            principal_id: *to_principal,
            role_id: source.role_id,
            context_tier: source.context_tier,
            context_id: source.context_id,
            validity: source.validity,
            trade: source.trade.clone(),
            is_primary: source.is_primary,
            created_by: actor,
        };

        // Retire first so a same-principal transfer does not collide with itself,
        // then restore the source if the insert is rejected.
        grants.retire(assignment_id, actor)?;
        match grants.insert(&params) {
            Ok(moved) => Ok(moved),
            Err(e) => {
                grants.assignments.insert(source.id, source);
                Err(e)
            }
        }
    }

    async fn get_assignment(
        &self,
        assignment_id: &AssignmentId,
    ) -> Result<Assignment, StoreError> {
        let grants = self.grants.lock().await;
        grants
            .assignments
            .get(assignment_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_active_assignments(
        &self,
        principal_id: &PrincipalId,
        tier: Option<ContextTier>,
        as_of: NaiveDate,
    ) -> Result<Vec<Assignment>, StoreError> {
        let grants = self.grants.lock().await;
        Ok(grants
            .assignments
            .values()
            .filter(|a| a.principal_id == *principal_id && a.is_active_on(as_of))
            .filter(|a| tier.is_none_or(|t| a.context_tier == t))
            .cloned()
            .collect())
    }

    async fn get_context_ids(
        &self,
        principal_id: &PrincipalId,
        tier: ContextTier,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<ContextId>, StoreError> {
        let grants = self.grants.lock().await;
        Ok(grants
            .assignments
            .values()
            .filter(|a| {
                a.principal_id == *principal_id && a.context_tier == tier && a.is_active_on(as_of)
            })
            .map(|a| a.context_id)
            .collect())
    }

    async fn list_assignment_history(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Vec<Assignment>, StoreError> {
        let grants = self.grants.lock().await;
        Ok(grants
            .assignments
            .values()
            .filter(|a| a.principal_id == *principal_id)
            .cloned()
            .collect())
    }

    async fn list_context_assignments(
        &self,
        tier: ContextTier,
        context_id: &ContextId,
        as_of: NaiveDate,
    ) -> Result<Vec<Assignment>, StoreError> {
        let grants = self.grants.lock().await;
        Ok(grants
            .assignments
            .values()
            .filter(|a| {
                a.context_tier == tier && a.context_id == *context_id && a.is_active_on(as_of)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HierarchyIndex for MemoryStore {
    async fn locations_of_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<LocationId>, StoreError> {
        Ok(self
            .locations
            .iter()
            .filter(|l| l.organization_id == *organization_id)
            .map(|l| l.id)
            .collect())
    }

    async fn projects_of_location(
        &self,
        location_id: &LocationId,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<ProjectId>, StoreError> {
        Ok(self
            .projects
            .iter()
            .filter(|p| p.location_id == *location_id && p.organization_id == *organization_id)
            .map(|p| p.id)
            .collect())
    }

    async fn projects_of_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<ProjectId>, StoreError> {
        Ok(self
            .projects
            .iter()
            .filter(|p| p.organization_id == *organization_id)
            .map(|p| p.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fieldscope_storage::ValidityWindow;
    use std::sync::Arc;

    async fn store_with_role(tier: ContextTier) -> (MemoryStore, Role) {
        let store = MemoryStore::new();
        let role = store
            .create_role(&CreateRoleParams {
                name: "role".to_string(),
                scope_tier: tier,
                organization_id: None,
            })
            .await
            .unwrap();
        (store, role)
    }

    #[tokio::test]
    async fn test_conflict_then_regrant_after_delete() {
        let (store, role) = store_with_role(ContextTier::Project).await;
        let params =
            CreateAssignmentParams::new(PrincipalId(1), role.id, ContextTier::Project, ProjectId(6));

        let first = store.create_assignment(&params).await.unwrap();
        assert!(matches!(
            store.create_assignment(&params).await,
            Err(StoreError::Conflict)
        ));

        store.soft_delete_assignment(&first.id, None).await.unwrap();
        assert!(matches!(
            store.soft_delete_assignment(&first.id, None).await,
            Err(StoreError::NotFound)
        ));
        store.create_assignment(&params).await.unwrap();

        let history = store.list_assignment_history(&PrincipalId(1)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].is_deleted());
    }

    #[tokio::test]
    async fn test_concurrent_creates_admit_one() {
        let (store, role) = store_with_role(ContextTier::Location).await;
        let store = Arc::new(store);
        let params = CreateAssignmentParams::new(
            PrincipalId(1),
            role.id,
            ContextTier::Location,
            LocationId(24),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let params = params.clone();
            handles.push(tokio::spawn(async move {
                store.create_assignment(&params).await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_expired_grants_are_not_active() {
        let (store, role) = store_with_role(ContextTier::Project).await;
        let today = Utc::now().date_naive();
        store
            .create_assignment(
                &CreateAssignmentParams::new(
                    PrincipalId(1),
                    role.id,
                    ContextTier::Project,
                    ProjectId(6),
                )
                .with_validity(ValidityWindow::new(None, Some(today - Duration::days(1)))),
            )
            .await
            .unwrap();

        let ids = store
            .get_context_ids(&PrincipalId(1), ContextTier::Project, today)
            .await
            .unwrap();
        assert!(ids.is_empty());

        let yesterday = store
            .get_context_ids(
                &PrincipalId(1),
                ContextTier::Project,
                today - Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(yesterday.len(), 1);
    }

    #[tokio::test]
    async fn test_update_into_existing_tuple_conflicts() {
        let (store, role) = store_with_role(ContextTier::Project).await;
        let other = store
            .create_role(&CreateRoleParams {
                name: "other".to_string(),
                scope_tier: ContextTier::Project,
                organization_id: None,
            })
            .await
            .unwrap();

        store
            .create_assignment(&CreateAssignmentParams::new(
                PrincipalId(1),
                role.id,
                ContextTier::Project,
                ProjectId(6),
            ))
            .await
            .unwrap();
        let second = store
            .create_assignment(&CreateAssignmentParams::new(
                PrincipalId(1),
                other.id,
                ContextTier::Project,
                ProjectId(6),
            ))
            .await
            .unwrap();

        let err = store
            .update_assignment(
                &second.id,
                &UpdateAssignmentParams {
                    role_id: Some(role.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(
            store.get_assignment(&second.id).await.unwrap().role_id,
            other.id
        );
    }

    #[tokio::test]
    async fn test_transfer_restores_source_on_conflict() {
        let (store, role) = store_with_role(ContextTier::Project).await;
        let source = store
            .create_assignment(&CreateAssignmentParams::new(
                PrincipalId(1),
                role.id,
                ContextTier::Project,
                ProjectId(6),
            ))
            .await
            .unwrap();
        store
            .create_assignment(&CreateAssignmentParams::new(
                PrincipalId(2),
                role.id,
                ContextTier::Project,
                ProjectId(6),
            ))
            .await
            .unwrap();

        let err = store
            .transfer_assignment(&source.id, &PrincipalId(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert!(!store.get_assignment(&source.id).await.unwrap().is_deleted());

        let moved = store
            .transfer_assignment(&source.id, &PrincipalId(3), Some(PrincipalId(100)))
            .await
            .unwrap();
        assert_eq!(moved.principal_id, PrincipalId(3));
        assert!(store.get_assignment(&source.id).await.unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_hierarchy_scoped_by_organization() {
        let store = MemoryStore::new();
        for (id, name) in [(10, "Acme"), (20, "Globex")] {
            store
                .insert_organization(Organization {
                    id: OrganizationId(id),
                    name: name.to_string(),
                })
                .unwrap();
        }
        store
            .insert_location(Location {
                id: LocationId(24),
                organization_id: OrganizationId(10),
                name: "North Yard".to_string(),
            })
            .unwrap();
        store
            .insert_project(Project {
                id: ProjectId(6),
                organization_id: OrganizationId(10),
                location_id: LocationId(24),
                name: "Tower".to_string(),
            })
            .unwrap();
        store
            .insert_project(Project {
                id: ProjectId(9),
                organization_id: OrganizationId(20),
                location_id: LocationId(24),
                name: "Mislabelled".to_string(),
            })
            .unwrap();

        let projects = store
            .projects_of_location(&LocationId(24), &OrganizationId(10))
            .await
            .unwrap();
        assert_eq!(projects.into_iter().collect::<Vec<_>>(), vec![ProjectId(6)]);

        let locations = store
            .locations_of_organization(&OrganizationId(20))
            .await
            .unwrap();
        assert!(locations.is_empty());
        assert_eq!(store.projects().len(), 2);
    }

    #[test]
    fn test_hierarchy_rows_require_known_parents() {
        let store = MemoryStore::new();
        let yard = Location {
            id: LocationId(24),
            organization_id: OrganizationId(10),
            name: "North Yard".to_string(),
        };
        assert!(matches!(
            store.insert_location(yard.clone()),
            Err(StoreError::Invalid(_))
        ));

        let acme = Organization {
            id: OrganizationId(10),
            name: "Acme".to_string(),
        };
        store.insert_organization(acme.clone()).unwrap();
        assert!(matches!(
            store.insert_organization(acme),
            Err(StoreError::Conflict)
        ));

        let tower = Project {
            id: ProjectId(6),
            organization_id: OrganizationId(10),
            location_id: LocationId(24),
            name: "Tower".to_string(),
        };
        assert!(matches!(
            store.insert_project(tower.clone()),
            Err(StoreError::Invalid(_))
        ));

        store.insert_location(yard.clone()).unwrap();
        assert!(matches!(
            store.insert_location(yard),
            Err(StoreError::Conflict)
        ));
        store.insert_project(tower).unwrap();
        assert_eq!(store.projects().len(), 1);
    }

    #[tokio::test]
    async fn test_role_cannot_be_granted_above_its_tier() {
        let (store, role) = store_with_role(ContextTier::Location).await;

        let err = store
            .create_assignment(&CreateAssignmentParams::new(
                PrincipalId(1),
                role.id,
                ContextTier::Organization,
                OrganizationId(10),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));

        let held = store
            .create_assignment(&CreateAssignmentParams::new(
                PrincipalId(1),
                role.id,
                ContextTier::Project,
                ProjectId(6),
            ))
            .await
            .unwrap();
        assert_eq!(held.context_tier, ContextTier::Project);
        assert!(store
            .get_context_ids(&PrincipalId(1), ContextTier::Organization, Utc::now().date_naive())
            .await
            .unwrap()
            .is_empty());
    }
}

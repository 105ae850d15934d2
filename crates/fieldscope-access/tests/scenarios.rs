//! End-to-end resolution against the SQLite backend: grants in, rows out.

use std::sync::Arc;

use chrono::NaiveDate;
use fieldscope_access::{
    AccessError, AccessLevel, AccessPredicate, AccessibleProjects, ColumnMap, Resolution, ResolveRequest,
    ResolverConfig, ResourceRow, ScopeResolver, TargetResource,
};
use fieldscope_storage::{
    AssignmentStore, ContextTier, CreateAssignmentParams, CreateRoleParams, Location, LocationId,
    Organization, OrganizationId, Principal, PrincipalId, Project, ProjectId,
};
use fieldscope_store_sqlite::SqliteStore;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

/// Org 10: location 24 (projects 6, 7), location 25 (projects 8, 99).
/// Org 20: location 31 (project 9).
async fn seeded() -> Arc<SqliteStore> {
    let s = SqliteStore::open_in_memory().await.unwrap();
    for id in [10, 20] {
        s.insert_organization(&Organization {
            id: OrganizationId(id),
            name: format!("org-{}", id),
        })
        .await
        .unwrap();
    }
    for (id, org) in [(24, 10), (25, 10), (31, 20)] {
        s.insert_location(&Location {
            id: LocationId(id),
            organization_id: OrganizationId(org),
            name: format!("location-{}", id),
        })
        .await
        .unwrap();
    }
    for (id, org, loc) in [(6, 10, 24), (7, 10, 24), (8, 10, 25), (99, 10, 25), (9, 20, 31)] {
        s.insert_project(&Project {
            id: ProjectId(id),
            organization_id: OrganizationId(org),
            location_id: LocationId(loc),
            name: format!("project-{}", id),
        })
        .await
        .unwrap();
    }
    Arc::new(s)
}

async fn grant(s: &SqliteStore, principal: i64, tier: ContextTier, context: i64) {
    let role = s
        .create_role(&CreateRoleParams {
            name: format!("{}-{}-{}", tier, principal, context),
            scope_tier: tier,
            organization_id: None,
        })
        .await
        .unwrap();
    s.create_assignment(&CreateAssignmentParams::new(
        PrincipalId(principal),
        role.id,
        tier,
        fieldscope_storage::ContextId(context),
    ))
    .await
    .unwrap();
}

fn member(id: i64) -> Principal {
    Principal::new(PrincipalId(id), OrganizationId(10))
}

fn listing(principal: Principal) -> ResolveRequest {
    ResolveRequest::new(principal, TargetResource::Project).as_of(day())
}

/// Apply the predicate through SQL and, independently, in memory; both must agree.
async fn visible_projects(s: &SqliteStore, resolution: &Resolution) -> Vec<i64> {
    let sql = resolution.predicate.to_sql(&ColumnMap::PROJECTS);
    let from_sql: Vec<i64> = s
        .list_projects_matching(&sql.clause, &sql.binds)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id.0)
        .collect();

    let everything = s.list_projects_matching("1 = 1", &[]).await.unwrap();
    let in_memory: Vec<i64> = everything
        .iter()
        .filter(|p| resolution.predicate.matches(&ResourceRow::from(*p)))
        .map(|p| p.id.0)
        .collect();
    assert_eq!(from_sql, in_memory);
    from_sql
}

fn only(raw: &[i64]) -> AccessibleProjects {
    AccessibleProjects::Only(raw.iter().copied().map(ProjectId).collect())
}

#[tokio::test]
async fn scenario_a_single_project_grant() {
    let s = seeded().await;
    grant(&s, 1, ContextTier::Project, 6).await;

    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .resolve(&listing(member(1)))
        .await
        .unwrap();
    assert_eq!(resolution.access.level, AccessLevel::Project);
    assert_eq!(resolution.access.accessible, only(&[6]));
    assert_eq!(visible_projects(&s, &resolution).await, vec![6]);
}

#[tokio::test]
async fn scenario_b_organization_grant_wins_over_project_grant() {
    let s = seeded().await;
    grant(&s, 2, ContextTier::Organization, 10).await;
    grant(&s, 2, ContextTier::Project, 99).await;

    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .resolve(&listing(member(2)))
        .await
        .unwrap();
    assert_eq!(resolution.access.level, AccessLevel::Organization);
    assert_eq!(resolution.access.accessible, only(&[6, 7, 8, 99]));
    assert_eq!(visible_projects(&s, &resolution).await, vec![6, 7, 8, 99]);
}

#[tokio::test]
async fn scenario_c_location_first_without_selection_is_empty() {
    let s = seeded().await;
    grant(&s, 3, ContextTier::Location, 24).await;

    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .with_config(ResolverConfig::default().with_location_first(true))
        .resolve(&listing(member(3)))
        .await
        .unwrap();
    assert_eq!(resolution.access.level, AccessLevel::Location);
    assert!(resolution.access.requires_location_selection);
    assert!(resolution.access.accessible.is_empty());
    assert!(visible_projects(&s, &resolution).await.is_empty());
}

#[tokio::test]
async fn scenario_d_explicit_location_lists_its_projects() {
    let s = seeded().await;
    grant(&s, 3, ContextTier::Location, 24).await;

    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .with_config(ResolverConfig::default().with_location_first(true))
        .resolve(&listing(member(3)).with_location(LocationId(24)))
        .await
        .unwrap();
    assert!(!resolution.access.requires_location_selection);
    assert_eq!(resolution.access.accessible, only(&[6, 7]));
    assert_eq!(visible_projects(&s, &resolution).await, vec![6, 7]);
}

#[tokio::test]
async fn scenario_e_no_grants_means_no_rows_and_no_error() {
    let s = seeded().await;

    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .resolve(&listing(member(4)))
        .await
        .unwrap();
    assert_eq!(resolution.access.level, AccessLevel::None);
    assert!(resolution.access.accessible.is_empty());
    assert_eq!(resolution.predicate, AccessPredicate::DenyAll);
    assert!(visible_projects(&s, &resolution).await.is_empty());
}

#[tokio::test]
async fn soft_deleted_grant_stops_resolving_but_stays_auditable() {
    let s = seeded().await;
    grant(&s, 5, ContextTier::Project, 8).await;
    let resolver = ScopeResolver::new(s.clone(), s.clone());

    let before = resolver.resolve(&listing(member(5))).await.unwrap();
    assert_eq!(before.access.level, AccessLevel::Project);

    let history = s.list_assignment_history(&PrincipalId(5)).await.unwrap();
    s.soft_delete_assignment(&history[0].id, Some(PrincipalId(100)))
        .await
        .unwrap();

    let after = resolver.resolve(&listing(member(5))).await.unwrap();
    assert_eq!(after.access.level, AccessLevel::None);
    assert!(visible_projects(&s, &after).await.is_empty());

    let audit = s.get_assignment(&history[0].id).await.unwrap();
    assert!(audit.is_deleted());
}

#[tokio::test]
async fn nested_resources_share_project_scope() {
    let s = seeded().await;
    grant(&s, 6, ContextTier::Location, 25).await;

    let request = ResolveRequest::new(member(6), TargetResource::child("rfis")).as_of(day());
    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .resolve(&request)
        .await
        .unwrap();
    assert_eq!(resolution.access.accessible, only(&[8, 99]));

    let sql = resolution.predicate.to_sql(&request.target.columns());
    assert_eq!(sql.clause, "location_id IN (?) AND org_id = ?");
    assert_eq!(sql.binds, vec![25, 10]);
}

#[tokio::test]
async fn super_admin_sees_every_tenant() {
    let s = seeded().await;
    let admin = Principal::super_admin(PrincipalId(7), OrganizationId(10));

    let resolution = ScopeResolver::new(s.clone(), s.clone())
        .resolve(&listing(admin))
        .await
        .unwrap();
    assert_eq!(resolution.access.level, AccessLevel::SuperAdmin);
    assert_eq!(
        visible_projects(&s, &resolution).await,
        vec![6, 7, 8, 9, 99]
    );
}

#[tokio::test]
async fn project_grant_in_another_organization_is_rejected() {
    let s = seeded().await;
    grant(&s, 8, ContextTier::Project, 9).await;

    let err = ScopeResolver::new(s.clone(), s.clone())
        .resolve(&listing(member(8)))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::InvalidScope(_)));
    assert_eq!(err.status_code(), 400);
}

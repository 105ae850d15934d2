//! The scope resolver.
//!
//! Resolution order:
//! 1. Tier evaluators in precedence order; the first non-empty tier wins and
//!    tiers are never unioned.
//! 2. Explicit scope (organization and/or location) is validated against the
//!    resolved grant and narrows it.
//! 3. Location-first mode may withhold a project listing until a location is
//!    chosen.

use std::collections::BTreeSet;
use std::sync::Arc;

use fieldscope_storage::{
    AssignmentStore, ContextId, HierarchyIndex, LocationId, OrganizationId, ProjectId,
};
use tracing::debug;

use crate::access::{AccessLevel, AccessibleProjects, EffectiveAccess, ExplicitScope};
use crate::config::ResolverConfig;
use crate::error::AccessError;
use crate::filter::AccessPredicate;
use crate::request::{Resolution, ResolveRequest, TargetResource};
use crate::tiers::{default_tiers, TierContext, TierEvaluator};

pub struct ScopeResolver {
    assignments: Arc<dyn AssignmentStore>,
    hierarchy: Arc<dyn HierarchyIndex>,
    tiers: Vec<Box<dyn TierEvaluator>>,
    config: ResolverConfig,
}

impl ScopeResolver {
    pub fn new(assignments: Arc<dyn AssignmentStore>, hierarchy: Arc<dyn HierarchyIndex>) -> Self {
        Self {
            assignments,
            hierarchy,
            tiers: default_tiers(),
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the evaluator list. Order is precedence order.
    pub fn with_tiers(mut self, tiers: Vec<Box<dyn TierEvaluator>>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve access and compile its predicate.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<Resolution, AccessError> {
        let access = self.resolve_access(request).await?;
        let predicate = AccessPredicate::compile(&access);
        Ok(Resolution { access, predicate })
    }

    /// Resolve the effective access level and accessible project set.
    pub async fn resolve_access(
        &self,
        request: &ResolveRequest,
    ) -> Result<EffectiveAccess, AccessError> {
        let principal = &request.principal;
        let ctx = TierContext {
            principal,
            as_of: request.evaluation_date(),
            assignments: self.assignments.as_ref(),
            hierarchy: self.hierarchy.as_ref(),
        };

        let mut resolved = None;
        for tier in &self.tiers {
            if let Some(access) = tier.evaluate(&ctx).await? {
                resolved = Some(access);
                break;
            }
        }
        let access = resolved.unwrap_or_else(|| EffectiveAccess::none(principal.organization_id));

        let access = self.apply_scope(access, &request.scope).await?;
        let access = self.apply_location_first(access, request);

        debug!(
            principal = %principal.id,
            target = %request.target,
            level = %access.level,
            grants = access.context_ids.len(),
            location_pending = access.requires_location_selection,
            "resolved access"
        );
        Ok(access)
    }

    async fn apply_scope(
        &self,
        mut access: EffectiveAccess,
        scope: &ExplicitScope,
    ) -> Result<EffectiveAccess, AccessError> {
        if scope.is_empty() {
            return Ok(access);
        }
        let home = access.home_organization;

        match access.level {
            AccessLevel::None => return Ok(access),

            AccessLevel::SuperAdmin => {
                let org = scope.organization.unwrap_or(home);
                let projects = match scope.location {
                    Some(location) => {
                        let locations = self.hierarchy.locations_of_organization(&org).await?;
                        if !locations.contains(&location) {
                            return Err(AccessError::InvalidScope(format!(
                                "location {} does not belong to organization {}",
                                location, org
                            )));
                        }
                        self.hierarchy.projects_of_location(&location, &org).await?
                    }
                    None => self.hierarchy.projects_of_organization(&org).await?,
                };
                access.accessible = AccessibleProjects::Only(projects);
                access.scope = ExplicitScope {
                    organization: Some(org),
                    location: scope.location,
                };
                return Ok(access);
            }

            AccessLevel::Organization => {
                let granted: BTreeSet<OrganizationId> =
                    access.context_ids.iter().map(|id| id.as_organization()).collect();
                let mut orgs = match scope.organization {
                    Some(org) if granted.contains(&org) => BTreeSet::from([org]),
                    Some(org) => {
                        return Err(denied(format!("organization {} is not granted", org)));
                    }
                    None => granted,
                };

                let projects = match scope.location {
                    Some(location) => {
                        let owner = self
                            .owning_organization(&location, &orgs)
                            .await?
                            .ok_or_else(|| {
                                denied(format!("location {} is outside granted organizations", location))
                            })?;
                        orgs = BTreeSet::from([owner]);
                        self.hierarchy.projects_of_location(&location, &owner).await?
                    }
                    None => {
                        let mut projects = BTreeSet::new();
                        for org in &orgs {
                            projects.extend(self.hierarchy.projects_of_organization(org).await?);
                        }
                        projects
                    }
                };
                access.context_ids = orgs.into_iter().map(ContextId::from).collect();
                access.accessible = AccessibleProjects::Only(projects);
            }

            AccessLevel::Location => {
                require_home(scope, home)?;
                if let Some(location) = scope.location {
                    let id = ContextId::from(location);
                    if !access.context_ids.contains(&id) {
                        return Err(denied(format!("location {} is not granted", location)));
                    }
                    access.context_ids = BTreeSet::from([id]);
                    access.accessible = AccessibleProjects::Only(
                        self.hierarchy.projects_of_location(&location, &home).await?,
                    );
                }
            }

            AccessLevel::Project => {
                require_home(scope, home)?;
                if let Some(location) = scope.location {
                    let under = self.hierarchy.projects_of_location(&location, &home).await?;
                    let kept: BTreeSet<ProjectId> = access
                        .context_ids
                        .iter()
                        .map(|id| id.as_project())
                        .filter(|project| under.contains(project))
                        .collect();
                    if kept.is_empty() {
                        return Err(denied(format!(
                            "no granted project under location {}",
                            location
                        )));
                    }
                    access.context_ids = kept.iter().copied().map(ContextId::from).collect();
                    access.accessible = AccessibleProjects::Only(kept);
                }
            }
        }

        access.scope = *scope;
        Ok(access)
    }

    async fn owning_organization(
        &self,
        location: &LocationId,
        candidates: &BTreeSet<OrganizationId>,
    ) -> Result<Option<OrganizationId>, AccessError> {
        for org in candidates {
            if self
                .hierarchy
                .locations_of_organization(org)
                .await?
                .contains(location)
            {
                return Ok(Some(*org));
            }
        }
        Ok(None)
    }

    fn apply_location_first(
        &self,
        mut access: EffectiveAccess,
        request: &ResolveRequest,
    ) -> EffectiveAccess {
        if self.config.location_first
            && access.level == AccessLevel::Location
            && request.target == TargetResource::Project
            && request.scope.location.is_none()
        {
            access.accessible = AccessibleProjects::none();
            access.requires_location_selection = true;
        }
        access
    }
}

fn denied(reason: String) -> AccessError {
    AccessError::AccessDenied(reason)
}

/// Below organization level an explicit organization can only be the home one.
fn require_home(scope: &ExplicitScope, home: OrganizationId) -> Result<(), AccessError> {
    match scope.organization {
        Some(org) if org != home => Err(denied(format!("organization {} is not granted", org))),
        _ => Ok(()),
    }
}

//! Tier evaluators, one per access level, tried in precedence order.
//!
//! Each evaluator answers "does this principal hold access at my tier?" and,
//! if so, the expanded project set. The first evaluator returning `Some` wins.
//! Adding a tier is a new evaluator in [`default_tiers`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use fieldscope_storage::{AssignmentStore, ContextTier, HierarchyIndex, Principal};
use tracing::warn;

use crate::access::{AccessLevel, EffectiveAccess};
use crate::error::AccessError;

/// Inputs shared by every evaluator for one resolution.
pub struct TierContext<'a> {
    pub principal: &'a Principal,
    pub as_of: NaiveDate,
    pub assignments: &'a dyn AssignmentStore,
    pub hierarchy: &'a dyn HierarchyIndex,
}

#[async_trait::async_trait]
pub trait TierEvaluator: Send + Sync {
    fn level(&self) -> AccessLevel;

    /// `Ok(None)` means "no grant at this tier, try the next one".
    async fn evaluate(&self, ctx: &TierContext<'_>)
        -> Result<Option<EffectiveAccess>, AccessError>;
}

/// Super admin, organization, location, project.
pub fn default_tiers() -> Vec<Box<dyn TierEvaluator>> {
    vec![
        Box::new(SuperAdminTier),
        Box::new(OrganizationTier),
        Box::new(LocationTier),
        Box::new(ProjectTier),
    ]
}

pub struct SuperAdminTier;

#[async_trait::async_trait]
impl TierEvaluator for SuperAdminTier {
    fn level(&self) -> AccessLevel {
        AccessLevel::SuperAdmin
    }

    async fn evaluate(
        &self,
        ctx: &TierContext<'_>,
    ) -> Result<Option<EffectiveAccess>, AccessError> {
        if !ctx.principal.is_super_admin {
            return Ok(None);
        }
        Ok(Some(EffectiveAccess::unrestricted(
            ctx.principal.organization_id,
        )))
    }
}

pub struct OrganizationTier;

#[async_trait::async_trait]
impl TierEvaluator for OrganizationTier {
    fn level(&self) -> AccessLevel {
        AccessLevel::Organization
    }

    async fn evaluate(
        &self,
        ctx: &TierContext<'_>,
    ) -> Result<Option<EffectiveAccess>, AccessError> {
        let granted = ctx
            .assignments
            .get_context_ids(&ctx.principal.id, ContextTier::Organization, ctx.as_of)
            .await?;
        if granted.is_empty() {
            return Ok(None);
        }

        let mut projects = BTreeSet::new();
        for org in &granted {
            projects.extend(
                ctx.hierarchy
                    .projects_of_organization(&org.as_organization())
                    .await?,
            );
        }

        Ok(Some(EffectiveAccess::granted(
            AccessLevel::Organization,
            ctx.principal.organization_id,
            granted,
            projects,
        )))
    }
}

pub struct LocationTier;

#[async_trait::async_trait]
impl TierEvaluator for LocationTier {
    fn level(&self) -> AccessLevel {
        AccessLevel::Location
    }

    async fn evaluate(
        &self,
        ctx: &TierContext<'_>,
    ) -> Result<Option<EffectiveAccess>, AccessError> {
        let granted = ctx
            .assignments
            .get_context_ids(&ctx.principal.id, ContextTier::Location, ctx.as_of)
            .await?;
        if granted.is_empty() {
            return Ok(None);
        }

        let home = ctx.principal.organization_id;
        let home_locations = ctx.hierarchy.locations_of_organization(&home).await?;

        let mut projects = BTreeSet::new();
        for location in granted.iter().map(|id| id.as_location()) {
            if !home_locations.contains(&location) {
                warn!(
                    principal = %ctx.principal.id,
                    %location,
                    organization = %home,
                    "location grant outside principal's organization"
                );
                return Err(AccessError::InvalidScope(format!(
                    "location {} does not belong to organization {}",
                    location, home
                )));
            }
            projects.extend(ctx.hierarchy.projects_of_location(&location, &home).await?);
        }

        Ok(Some(EffectiveAccess::granted(
            AccessLevel::Location,
            home,
            granted,
            projects,
        )))
    }
}

pub struct ProjectTier;

#[async_trait::async_trait]
impl TierEvaluator for ProjectTier {
    fn level(&self) -> AccessLevel {
        AccessLevel::Project
    }

    async fn evaluate(
        &self,
        ctx: &TierContext<'_>,
    ) -> Result<Option<EffectiveAccess>, AccessError> {
        let granted = ctx
            .assignments
            .get_context_ids(&ctx.principal.id, ContextTier::Project, ctx.as_of)
            .await?;
        if granted.is_empty() {
            return Ok(None);
        }

        let home = ctx.principal.organization_id;
        let home_projects = ctx.hierarchy.projects_of_organization(&home).await?;

        let mut projects = BTreeSet::new();
        for project in granted.iter().map(|id| id.as_project()) {
            if !home_projects.contains(&project) {
                warn!(
                    principal = %ctx.principal.id,
                    %project,
                    organization = %home,
                    "project grant outside principal's organization"
                );
                return Err(AccessError::InvalidScope(format!(
                    "project {} does not belong to organization {}",
                    project, home
                )));
            }
            projects.insert(project);
        }

        Ok(Some(EffectiveAccess::granted(
            AccessLevel::Project,
            home,
            granted,
            projects,
        )))
    }
}

use chrono::{NaiveDate, Utc};
use fieldscope_storage::{LocationId, OrganizationId, Principal};
use serde::{Deserialize, Serialize};

use crate::access::{EffectiveAccess, ExplicitScope};
use crate::filter::{AccessPredicate, ColumnMap};

/// Resource type a listing is for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetResource {
    Project,
    /// A resource nested under a project (issues, RFIs, submittals...).
    /// Shares the project id set; only the column mapping differs.
    ProjectChild { resource: String },
}

impl TargetResource {
    pub fn child(resource: impl Into<String>) -> Self {
        TargetResource::ProjectChild {
            resource: resource.into(),
        }
    }

    /// Default column mapping for this resource's table.
    pub fn columns(&self) -> ColumnMap {
        match self {
            TargetResource::Project => ColumnMap::PROJECTS,
            TargetResource::ProjectChild { .. } => ColumnMap::PROJECT_CHILDREN,
        }
    }
}

impl std::fmt::Display for TargetResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetResource::Project => f.write_str("project"),
            TargetResource::ProjectChild { resource } => f.write_str(resource),
        }
    }
}

/// Input to the scope resolver.
#[derive(Clone, Debug)]
pub struct ResolveRequest {
    pub principal: Principal,
    pub target: TargetResource,
    pub scope: ExplicitScope,
    /// Evaluation date; today (UTC) when unset.
    pub as_of: Option<NaiveDate>,
}

impl ResolveRequest {
    pub fn new(principal: Principal, target: TargetResource) -> Self {
        Self {
            principal,
            target,
            scope: ExplicitScope::default(),
            as_of: None,
        }
    }

    pub fn with_organization(mut self, organization: OrganizationId) -> Self {
        self.scope.organization = Some(organization);
        self
    }

    pub fn with_location(mut self, location: LocationId) -> Self {
        self.scope.location = Some(location);
        self
    }

    pub fn as_of(mut self, day: NaiveDate) -> Self {
        self.as_of = Some(day);
        self
    }

    pub fn evaluation_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Resolver output: the effective access and its compiled predicate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub access: EffectiveAccess,
    pub predicate: AccessPredicate,
}

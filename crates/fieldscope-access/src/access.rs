//! Resolved access: the level a principal holds and what it reaches.

use std::collections::BTreeSet;

use fieldscope_storage::{ContextId, LocationId, OrganizationId, ProjectId};
use serde::{Deserialize, Serialize};

/// Effective access level, in precedence order (highest first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    SuperAdmin,
    Organization,
    Location,
    Project,
    None,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::SuperAdmin => "super_admin",
            AccessLevel::Organization => "organization",
            AccessLevel::Location => "location",
            AccessLevel::Project => "project",
            AccessLevel::None => "none",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete project ids a principal can reach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "ids")]
pub enum AccessibleProjects {
    Unrestricted,
    Only(BTreeSet<ProjectId>),
}

impl AccessibleProjects {
    pub fn none() -> Self {
        AccessibleProjects::Only(BTreeSet::new())
    }

    pub fn contains(&self, project: &ProjectId) -> bool {
        match self {
            AccessibleProjects::Unrestricted => true,
            AccessibleProjects::Only(ids) => ids.contains(project),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AccessibleProjects::Only(ids) if ids.is_empty())
    }
}

/// Organization and/or location the caller explicitly asked to narrow to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitScope {
    pub organization: Option<OrganizationId>,
    pub location: Option<LocationId>,
}

impl ExplicitScope {
    pub fn is_empty(&self) -> bool {
        self.organization.is_none() && self.location.is_none()
    }
}

/// Outcome of scope resolution for one principal.
///
/// `context_ids` are the raw grants at the resolved tier (after any explicit
/// narrowing) and drive the query predicate; `accessible` is their expansion
/// into project ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAccess {
    pub level: AccessLevel,
    pub context_ids: BTreeSet<ContextId>,
    pub accessible: AccessibleProjects,
    pub home_organization: OrganizationId,
    /// Explicit scope that was validated and applied.
    pub scope: ExplicitScope,
    /// Set when location-first mode withheld a listing until a location is chosen.
    pub requires_location_selection: bool,
}

impl EffectiveAccess {
    pub fn none(home_organization: OrganizationId) -> Self {
        Self {
            level: AccessLevel::None,
            context_ids: BTreeSet::new(),
            accessible: AccessibleProjects::none(),
            home_organization,
            scope: ExplicitScope::default(),
            requires_location_selection: false,
        }
    }

    pub fn unrestricted(home_organization: OrganizationId) -> Self {
        Self {
            level: AccessLevel::SuperAdmin,
            context_ids: BTreeSet::new(),
            accessible: AccessibleProjects::Unrestricted,
            home_organization,
            scope: ExplicitScope::default(),
            requires_location_selection: false,
        }
    }

    pub fn granted(
        level: AccessLevel,
        home_organization: OrganizationId,
        context_ids: BTreeSet<ContextId>,
        projects: BTreeSet<ProjectId>,
    ) -> Self {
        Self {
            level,
            context_ids,
            accessible: AccessibleProjects::Only(projects),
            home_organization,
            scope: ExplicitScope::default(),
            requires_location_selection: false,
        }
    }

    pub fn can_access(&self, project: &ProjectId) -> bool {
        self.accessible.contains(project)
    }
}

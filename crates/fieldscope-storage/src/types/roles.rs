//! Context tiers and role records.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OrganizationId, RoleId};
use crate::StoreError;

/// Scope unit a role assignment applies to.
///
/// Tiers nest: an organization contains locations, a location contains projects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTier {
    Organization,
    Location,
    Project,
}

/// Error type for parsing ContextTier from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContextTierError(pub String);

impl std::fmt::Display for ParseContextTierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid context tier: {}", self.0)
    }
}

impl std::error::Error for ParseContextTierError {}

impl FromStr for ContextTier {
    type Err = ParseContextTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" => Ok(ContextTier::Organization),
            "location" => Ok(ContextTier::Location),
            "project" => Ok(ContextTier::Project),
            _ => Err(ParseContextTierError(s.to_string())),
        }
    }
}

impl std::fmt::Display for ContextTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ContextTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTier::Organization => "organization",
            ContextTier::Location => "location",
            ContextTier::Project => "project",
        }
    }

    /// Check if this tier is at least as coarse as another (an organization
    /// contains locations and projects; a location contains projects).
    pub fn contains(&self, other: &ContextTier) -> bool {
        self <= other
    }

    /// Reject granting a role scoped to this tier at a coarser tier
    /// (a project role held over a whole organization).
    pub fn check_grant_tier(&self, grant_tier: ContextTier) -> Result<(), StoreError> {
        if self.contains(&grant_tier) {
            Ok(())
        } else {
            Err(StoreError::Invalid(format!(
                "{} role cannot be granted at {} tier",
                self, grant_tier
            )))
        }
    }
}

/// Role record.
///
/// `organization_id` is `None` for global roles shared by every tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// Tier the role is intended to be granted at.
    pub scope_tier: ContextTier,
    pub organization_id: Option<OrganizationId>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a role
#[derive(Clone, Debug)]
pub struct CreateRoleParams {
    pub name: String,
    pub scope_tier: ContextTier,
    pub organization_id: Option<OrganizationId>,
}

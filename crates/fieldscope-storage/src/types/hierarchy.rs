//! Resource records the hierarchy is derived from.
//!
//! These rows belong to the CRUD layer; this crate only reads their foreign
//! keys (location → organization, project → location/organization).

use serde::{Deserialize, Serialize};

use super::{LocationId, OrganizationId, ProjectId};

/// Organization record (tenant root)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
}

/// Location record (site within an organization)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub organization_id: OrganizationId,
    pub name: String,
}

/// Project record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub location_id: LocationId,
    pub name: String,
}

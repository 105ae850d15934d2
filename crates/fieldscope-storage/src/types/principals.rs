//! Principal types.

use serde::{Deserialize, Serialize};

use super::{OrganizationId, PrincipalId};

/// The authenticated actor on whose behalf access is resolved.
///
/// Issued by the external identity provider; this crate never persists it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    /// Home organization of the principal.
    pub organization_id: OrganizationId,
    /// Global flag that bypasses all tiered checks.
    pub is_super_admin: bool,
}

impl Principal {
    pub fn new(id: PrincipalId, organization_id: OrganizationId) -> Self {
        Self {
            id,
            organization_id,
            is_super_admin: false,
        }
    }

    pub fn super_admin(id: PrincipalId, organization_id: OrganizationId) -> Self {
        Self {
            id,
            organization_id,
            is_super_admin: true,
        }
    }
}

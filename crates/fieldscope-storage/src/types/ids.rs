//! Strongly-typed identifiers (avoid mixing raw integers arbitrarily).
//!
//! Resource records (organizations, locations, projects) are owned by the
//! CRUD layer and keyed by integer primary keys, so every id here wraps `i64`.

use serde::{Deserialize, Serialize};

macro_rules! int_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

int_id!(
    /// Principal (authenticated actor) identifier, issued by the identity provider.
    PrincipalId
);

int_id!(
    /// Role identifier.
    RoleId
);

int_id!(
    /// Assignment identifier.
    AssignmentId
);

int_id!(
    /// Organization identifier.
    OrganizationId
);

int_id!(
    /// Location identifier.
    LocationId
);

int_id!(
    /// Project identifier.
    ProjectId
);

int_id!(
    /// Id of the context an assignment applies to. Its meaning depends on the
    /// assignment's tier: an organization, location, or project id.
    ContextId
);

impl From<OrganizationId> for ContextId {
    fn from(id: OrganizationId) -> Self {
        ContextId(id.0)
    }
}

impl From<LocationId> for ContextId {
    fn from(id: LocationId) -> Self {
        ContextId(id.0)
    }
}

impl From<ProjectId> for ContextId {
    fn from(id: ProjectId) -> Self {
        ContextId(id.0)
    }
}

impl ContextId {
    /// Read this context as an organization id.
    pub fn as_organization(self) -> OrganizationId {
        OrganizationId(self.0)
    }

    /// Read this context as a location id.
    pub fn as_location(self) -> LocationId {
        LocationId(self.0)
    }

    /// Read this context as a project id.
    pub fn as_project(self) -> ProjectId {
        ProjectId(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_id_debug() {
        let principal_id = PrincipalId(42);
        assert!(format!("{:?}", principal_id).contains("42"));
    }

    #[test]
    fn test_typed_ids_equality() {
        assert_eq!(ProjectId(6), ProjectId(6));
        assert_ne!(ProjectId(6), ProjectId(7));
    }

    #[test]
    fn test_typed_ids_display_and_parse() {
        let id: LocationId = "24".parse().unwrap();
        assert_eq!(id, LocationId(24));
        assert_eq!(id.to_string(), "24");
        assert!("not-a-number".parse::<LocationId>().is_err());
    }

    #[test]
    fn test_context_id_conversions() {
        let ctx = ContextId::from(OrganizationId(10));
        assert_eq!(ctx, ContextId(10));
        assert_eq!(ctx.as_organization(), OrganizationId(10));
        assert_eq!(ContextId::from(LocationId(24)).as_location(), LocationId(24));
        assert_eq!(ContextId::from(ProjectId(6)).as_project(), ProjectId(6));
    }

    #[test]
    fn test_typed_ids_ordering() {
        use std::collections::BTreeSet;

        let set: BTreeSet<ProjectId> = [ProjectId(9), ProjectId(1), ProjectId(5)].into();
        let ordered: Vec<i64> = set.into_iter().map(|p| p.0).collect();
        assert_eq!(ordered, vec![1, 5, 9]);
    }

    #[test]
    fn test_typed_ids_serialize_transparent() {
        let json = serde_json::to_string(&OrganizationId(10)).unwrap();
        assert_eq!(json, "10");
        let back: OrganizationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrganizationId(10));
    }
}

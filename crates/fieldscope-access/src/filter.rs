//! Compiles an [`EffectiveAccess`] into a query predicate.
//!
//! The predicate is a plain value over three abstract properties
//! (organization, location, project). It can be evaluated in memory with
//! [`AccessPredicate::matches`] or rendered to a parameterized SQL `WHERE`
//! fragment with [`AccessPredicate::to_sql`] once a table's columns are known.

use std::collections::BTreeSet;

use fieldscope_storage::{ContextId, LocationId, OrganizationId, Project, ProjectId};
use serde::{Deserialize, Serialize};

use crate::access::{AccessLevel, EffectiveAccess};

/// Abstract property of a project-scoped row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Organization,
    Location,
    Project,
}

/// One conjunct of an [`AccessPredicate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Condition {
    In { property: Property, ids: BTreeSet<i64> },
    Eq { property: Property, id: i64 },
}

impl Condition {
    fn within(property: Property, ids: &BTreeSet<ContextId>) -> Self {
        Condition::In {
            property,
            ids: ids.iter().map(|id| id.0).collect(),
        }
    }

    fn holds(&self, row: &ResourceRow) -> bool {
        match self {
            Condition::In { property, ids } => ids.contains(&row.get(*property)),
            Condition::Eq { property, id } => row.get(*property) == *id,
        }
    }
}

/// Row filter produced from an [`EffectiveAccess`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "conditions")]
pub enum AccessPredicate {
    /// Every row matches.
    Unrestricted,
    /// No row matches.
    DenyAll,
    /// All conditions must hold.
    All(Vec<Condition>),
}

impl AccessPredicate {
    /// Compile resolved access into a predicate. Pure; touches no store.
    pub fn compile(access: &EffectiveAccess) -> Self {
        if access.requires_location_selection {
            return AccessPredicate::DenyAll;
        }

        let home = access.home_organization.0;
        let mut conditions = match access.level {
            AccessLevel::None => return AccessPredicate::DenyAll,
            AccessLevel::SuperAdmin => Vec::new(),
            AccessLevel::Organization | AccessLevel::Location | AccessLevel::Project
                if access.context_ids.is_empty() =>
            {
                return AccessPredicate::DenyAll;
            }
            AccessLevel::Organization => {
                vec![Condition::within(Property::Organization, &access.context_ids)]
            }
            AccessLevel::Location => vec![
                Condition::within(Property::Location, &access.context_ids),
                Condition::Eq {
                    property: Property::Organization,
                    id: home,
                },
            ],
            AccessLevel::Project => vec![
                Condition::within(Property::Project, &access.context_ids),
                Condition::Eq {
                    property: Property::Organization,
                    id: home,
                },
            ],
        };

        let explicit = [
            access.scope.organization.map(|org| Condition::Eq {
                property: Property::Organization,
                id: org.0,
            }),
            access.scope.location.map(|location| Condition::Eq {
                property: Property::Location,
                id: location.0,
            }),
        ];
        for condition in explicit.into_iter().flatten() {
            if !conditions.contains(&condition) {
                conditions.push(condition);
            }
        }

        if conditions.is_empty() {
            AccessPredicate::Unrestricted
        } else {
            AccessPredicate::All(conditions)
        }
    }

    /// Evaluate against one row in memory.
    pub fn matches(&self, row: &ResourceRow) -> bool {
        match self {
            AccessPredicate::Unrestricted => true,
            AccessPredicate::DenyAll => false,
            AccessPredicate::All(conditions) => conditions.iter().all(|c| c.holds(row)),
        }
    }

    /// Render as a SQL `WHERE` fragment with `?` placeholders.
    pub fn to_sql(&self, columns: &ColumnMap) -> SqlFragment {
        match self {
            AccessPredicate::Unrestricted => SqlFragment::constant("1 = 1"),
            AccessPredicate::DenyAll => SqlFragment::constant("1 = 0"),
            AccessPredicate::All(conditions) => {
                let mut parts = Vec::with_capacity(conditions.len());
                let mut binds = Vec::new();
                for condition in conditions {
                    match condition {
                        Condition::In { ids, .. } if ids.is_empty() => {
                            parts.push("1 = 0".to_string());
                        }
                        Condition::In { property, ids } => {
                            let placeholders = vec!["?"; ids.len()].join(", ");
                            parts.push(format!(
                                "{} IN ({})",
                                columns.column(*property),
                                placeholders
                            ));
                            binds.extend(ids.iter().copied());
                        }
                        Condition::Eq { property, id } => {
                            parts.push(format!("{} = ?", columns.column(*property)));
                            binds.push(*id);
                        }
                    }
                }
                SqlFragment {
                    clause: parts.join(" AND "),
                    binds,
                }
            }
        }
    }

    pub fn is_deny_all(&self) -> bool {
        matches!(self, AccessPredicate::DenyAll)
    }
}

/// The (organization, location, project) triple of a row being filtered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceRow {
    pub organization: OrganizationId,
    pub location: LocationId,
    pub project: ProjectId,
}

impl ResourceRow {
    fn get(&self, property: Property) -> i64 {
        match property {
            Property::Organization => self.organization.0,
            Property::Location => self.location.0,
            Property::Project => self.project.0,
        }
    }
}

impl From<&Project> for ResourceRow {
    fn from(project: &Project) -> Self {
        Self {
            organization: project.organization_id,
            location: project.location_id,
            project: project.id,
        }
    }
}

/// Table columns holding each abstract property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnMap {
    pub organization: &'static str,
    pub location: &'static str,
    pub project: &'static str,
}

impl ColumnMap {
    /// The `projects` table itself.
    pub const PROJECTS: ColumnMap = ColumnMap {
        organization: "org_id",
        location: "location_id",
        project: "id",
    };

    /// Tables of resources nested under a project.
    pub const PROJECT_CHILDREN: ColumnMap = ColumnMap {
        organization: "org_id",
        location: "location_id",
        project: "project_id",
    };

    pub fn column(&self, property: Property) -> &'static str {
        match property {
            Property::Organization => self.organization,
            Property::Location => self.location,
            Property::Project => self.project,
        }
    }
}

/// Parameterized SQL condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlFragment {
    pub clause: String,
    pub binds: Vec<i64>,
}

impl SqlFragment {
    fn constant(clause: &str) -> Self {
        Self {
            clause: clause.to_string(),
            binds: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessibleProjects, ExplicitScope};

    fn ids(raw: &[i64]) -> BTreeSet<ContextId> {
        raw.iter().copied().map(ContextId).collect()
    }

    fn granted(level: AccessLevel, raw: &[i64]) -> EffectiveAccess {
        EffectiveAccess::granted(level, OrganizationId(10), ids(raw), BTreeSet::new())
    }

    fn row(org: i64, location: i64, project: i64) -> ResourceRow {
        ResourceRow {
            organization: OrganizationId(org),
            location: LocationId(location),
            project: ProjectId(project),
        }
    }

    #[test]
    fn test_none_is_deny_all() {
        let predicate = AccessPredicate::compile(&EffectiveAccess::none(OrganizationId(10)));
        assert_eq!(predicate, AccessPredicate::DenyAll);
        assert!(!predicate.matches(&row(10, 24, 6)));
        assert_eq!(
            predicate.to_sql(&ColumnMap::PROJECTS),
            SqlFragment {
                clause: "1 = 0".to_string(),
                binds: vec![]
            }
        );
    }

    #[test]
    fn test_super_admin_is_unrestricted() {
        let predicate =
            AccessPredicate::compile(&EffectiveAccess::unrestricted(OrganizationId(10)));
        assert_eq!(predicate, AccessPredicate::Unrestricted);
        assert!(predicate.matches(&row(99, 1, 1)));
        assert_eq!(predicate.to_sql(&ColumnMap::PROJECTS).clause, "1 = 1");
    }

    #[test]
    fn test_super_admin_with_explicit_scope() {
        let mut access = EffectiveAccess::unrestricted(OrganizationId(10));
        access.scope = ExplicitScope {
            organization: Some(OrganizationId(20)),
            location: Some(LocationId(31)),
        };
        let predicate = AccessPredicate::compile(&access);
        assert!(predicate.matches(&row(20, 31, 9)));
        assert!(!predicate.matches(&row(20, 32, 9)));
        assert!(!predicate.matches(&row(10, 31, 9)));

        let sql = predicate.to_sql(&ColumnMap::PROJECTS);
        assert_eq!(sql.clause, "org_id = ? AND location_id = ?");
        assert_eq!(sql.binds, vec![20, 31]);
    }

    #[test]
    fn test_organization_level() {
        let predicate = AccessPredicate::compile(&granted(AccessLevel::Organization, &[10, 11]));
        assert!(predicate.matches(&row(11, 1, 1)));
        assert!(!predicate.matches(&row(12, 1, 1)));

        let sql = predicate.to_sql(&ColumnMap::PROJECTS);
        assert_eq!(sql.clause, "org_id IN (?, ?)");
        assert_eq!(sql.binds, vec![10, 11]);
    }

    #[test]
    fn test_location_level_pins_home_organization() {
        let predicate = AccessPredicate::compile(&granted(AccessLevel::Location, &[24]));
        assert!(predicate.matches(&row(10, 24, 6)));
        // Same location id under a foreign organization is filtered out.
        assert!(!predicate.matches(&row(20, 24, 6)));

        let sql = predicate.to_sql(&ColumnMap::PROJECT_CHILDREN);
        assert_eq!(sql.clause, "location_id IN (?) AND org_id = ?");
        assert_eq!(sql.binds, vec![24, 10]);
    }

    #[test]
    fn test_project_level_uses_resource_column() {
        let predicate = AccessPredicate::compile(&granted(AccessLevel::Project, &[6, 7]));
        assert!(predicate.matches(&row(10, 24, 7)));
        assert!(!predicate.matches(&row(10, 24, 8)));

        assert_eq!(
            predicate.to_sql(&ColumnMap::PROJECTS).clause,
            "id IN (?, ?) AND org_id = ?"
        );
        assert_eq!(
            predicate.to_sql(&ColumnMap::PROJECT_CHILDREN).clause,
            "project_id IN (?, ?) AND org_id = ?"
        );
    }

    #[test]
    fn test_empty_grant_set_never_unrestricted() {
        for level in [
            AccessLevel::Organization,
            AccessLevel::Location,
            AccessLevel::Project,
        ] {
            assert_eq!(
                AccessPredicate::compile(&granted(level, &[])),
                AccessPredicate::DenyAll
            );
        }
    }

    #[test]
    fn test_location_selection_pending_denies_all() {
        let mut access = granted(AccessLevel::Location, &[24]);
        access.accessible = AccessibleProjects::none();
        access.requires_location_selection = true;
        assert!(AccessPredicate::compile(&access).is_deny_all());
    }

    #[test]
    fn test_explicit_location_adds_conjunct_once() {
        let mut access = granted(AccessLevel::Location, &[24]);
        access.scope = ExplicitScope {
            organization: Some(OrganizationId(10)),
            location: Some(LocationId(24)),
        };
        let sql = AccessPredicate::compile(&access).to_sql(&ColumnMap::PROJECTS);
        assert_eq!(
            sql.clause,
            "location_id IN (?) AND org_id = ? AND location_id = ?"
        );
        assert_eq!(sql.binds, vec![24, 10, 24]);
    }

    #[test]
    fn test_serializes_as_tagged_value() {
        let predicate = AccessPredicate::compile(&granted(AccessLevel::Project, &[6]));
        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(json["kind"], "all");
        assert_eq!(json["conditions"][0]["op"], "in");
        assert_eq!(json["conditions"][0]["property"], "project");
    }
}

//! Hierarchical scope resolution for fieldscope.
//!
//! Given a principal and a target resource type, [`ScopeResolver`] decides the
//! single highest-precedence access level the principal holds
//! (super admin > organization > location > project > none), expands it into
//! concrete project ids through the [`HierarchyIndex`](fieldscope_storage::HierarchyIndex),
//! and compiles the result into an [`AccessPredicate`] that listing handlers
//! apply to their queries.

mod access;
mod config;
mod error;
mod filter;
mod request;
mod resolver;
mod tiers;

pub use access::{AccessLevel, AccessibleProjects, EffectiveAccess, ExplicitScope};
pub use config::{ConfigError, ResolverConfig, LOCATION_FIRST_VAR};
pub use error::AccessError;
pub use filter::{AccessPredicate, ColumnMap, Condition, Property, ResourceRow, SqlFragment};
pub use request::{Resolution, ResolveRequest, TargetResource};
pub use resolver::ScopeResolver;
pub use tiers::{
    default_tiers, LocationTier, OrganizationTier, ProjectTier, SuperAdminTier, TierContext,
    TierEvaluator,
};

use std::sync::Arc;

use fieldscope_access::{ResolveRequest, ResolverConfig, ScopeResolver, TargetResource};
use fieldscope_storage::Principal;
use fieldscope_store_sqlite::SqliteStore;

use super::print_json;
use crate::cli::ResolveArgs;

fn target_from_arg(target: &str) -> TargetResource {
    match target {
        "project" | "projects" => TargetResource::Project,
        other => TargetResource::child(other),
    }
}

pub async fn cmd_resolve(
    store: Arc<SqliteStore>,
    args: ResolveArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ResolverConfig::from_env()?;
    if args.location_first {
        config = config.with_location_first(true);
    }

    let principal = if args.super_admin {
        Principal::super_admin(args.principal, args.org)
    } else {
        Principal::new(args.principal, args.org)
    };

    let mut request = ResolveRequest::new(principal, target_from_arg(&args.target));
    if let Some(org) = args.scope_org {
        request = request.with_organization(org);
    }
    if let Some(location) = args.location {
        request = request.with_location(location);
    }
    if let Some(day) = args.as_of {
        request = request.as_of(day);
    }

    let resolver = ScopeResolver::new(store.clone(), store).with_config(config);
    let resolution = resolver.resolve(&request).await?;
    print_json(&resolution)
}

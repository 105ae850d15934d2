use fieldscope_storage::{Location, LocationId, Organization, OrganizationId, Project, ProjectId};
use fieldscope_store_sqlite::SqliteStore;

pub async fn cmd_hierarchy_organization(
    store: &SqliteStore,
    id: OrganizationId,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    store
        .insert_organization(&Organization {
            id,
            name: name.to_string(),
        })
        .await?;
    println!("Added organization {} ({})", name, id);
    Ok(())
}

pub async fn cmd_hierarchy_location(
    store: &SqliteStore,
    id: LocationId,
    name: &str,
    org: OrganizationId,
) -> Result<(), Box<dyn std::error::Error>> {
    store
        .insert_location(&Location {
            id,
            organization_id: org,
            name: name.to_string(),
        })
        .await?;
    println!("Added location {} ({}) to organization {}", name, id, org);
    Ok(())
}

pub async fn cmd_hierarchy_project(
    store: &SqliteStore,
    id: ProjectId,
    name: &str,
    org: OrganizationId,
    location: LocationId,
) -> Result<(), Box<dyn std::error::Error>> {
    store
        .insert_project(&Project {
            id,
            organization_id: org,
            location_id: location,
            name: name.to_string(),
        })
        .await?;
    println!("Added project {} ({}) to location {}", name, id, location);
    Ok(())
}

//! SQLite backend for fieldscope.
//!
//! Implements both [`AssignmentStore`] and [`HierarchyIndex`] over one pool.
//! Duplicate live grants are rejected by a partial unique index, so two
//! concurrent creates of the same tuple cannot both commit.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use fieldscope_storage::{
    Assignment, AssignmentId, AssignmentStore, ContextId, ContextTier, CreateAssignmentParams,
    CreateRoleParams, HierarchyIndex, Location, LocationId, Organization, OrganizationId,
    PrincipalId, Project, ProjectId, Role, RoleId, StoreError, UpdateAssignmentParams,
    ValidityWindow,
};
use sqlx::{sqlite::SqlitePoolOptions, SqliteConnection, SqlitePool};
use tracing::debug;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const ASSIGNMENT_COLUMNS: &str = "id, principal_id, role_id, context_tier, context_id, trade, \
     is_primary, starts_on, ends_on, created_by, updated_by, deleted_by, created_at, \
     updated_at, deleted_at";

const ACTIVE_ON: &str = "deleted_at IS NULL \
     AND (starts_on IS NULL OR starts_on <= ?2) \
     AND (ends_on IS NULL OR ends_on >= ?2)";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!(%url, "sqlite store opened");

        Ok(Self { pool })
    }

    // ──────────────────────── Resource rows (CRUD-layer tables) ────────────────────────

    /// Insert an organization row.
    pub async fn insert_organization(&self, org: &Organization) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO organizations(id, name) VALUES(?, ?)")
            .bind(org.id.0)
            .bind(&org.name)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    /// Insert a location row.
    pub async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO locations(id, org_id, name) VALUES(?, ?, ?)")
            .bind(location.id.0)
            .bind(location.organization_id.0)
            .bind(&location.name)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    /// Insert a project row.
    pub async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO projects(id, org_id, location_id, name) VALUES(?, ?, ?, ?)")
            .bind(project.id.0)
            .bind(project.organization_id.0)
            .bind(project.location_id.0)
            .bind(&project.name)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(())
    }

    /// List projects matching a pre-compiled `WHERE` clause with `?` placeholders.
    ///
    /// The clause must come from a trusted predicate compiler; only the bind
    /// values are parameterized.
    pub async fn list_projects_matching(
        &self,
        clause: &str,
        binds: &[i64],
    ) -> Result<Vec<Project>, StoreError> {
        let sql = format!(
            "SELECT id, org_id, location_id, name FROM projects WHERE {} ORDER BY id",
            clause
        );
        let mut query = sqlx::query_as::<_, (i64, i64, i64, String)>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, org_id, location_id, name)| Project {
                id: ProjectId(id),
                organization_id: OrganizationId(org_id),
                location_id: LocationId(location_id),
                name,
            })
            .collect())
    }

    async fn fetch_live_assignment(
        conn: &mut SqliteConnection,
        assignment_id: &AssignmentId,
    ) -> Result<Assignment, StoreError> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE id = ? AND deleted_at IS NULL",
            ASSIGNMENT_COLUMNS
        );
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id.0)
            .fetch_optional(conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    /// The role must exist and be grantable at `grant_tier`.
    async fn ensure_role(
        conn: &mut SqliteConnection,
        role_id: &RoleId,
        grant_tier: ContextTier,
    ) -> Result<(), StoreError> {
        let found: Option<(String,)> = sqlx::query_as("SELECT scope_tier FROM roles WHERE id = ?")
            .bind(role_id.0)
            .fetch_optional(conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (scope_tier,) =
            found.ok_or_else(|| StoreError::Invalid(format!("unknown role {}", role_id)))?;
        scope_tier
            .parse::<ContextTier>()
            .map_err(|e| StoreError::Backend(format!("invalid tier in database: {}", e)))?
            .check_grant_tier(grant_tier)
    }

    async fn insert_assignment(
        conn: &mut SqliteConnection,
        params: &CreateAssignmentParams,
    ) -> Result<Assignment, StoreError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO assignments(principal_id, role_id, context_tier, context_id, trade,
                 is_primary, starts_on, ends_on, created_by, updated_by, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(params.principal_id.0)
            .bind(params.role_id.0)
            .bind(params.context_tier.as_str())
            .bind(params.context_id.0)
            .bind(&params.trade)
            .bind(params.is_primary)
            .bind(params.validity.starts_on)
            .bind(params.validity.ends_on)
            .bind(params.created_by.map(|p| p.0))
            .bind(params.created_by.map(|p| p.0))
            .bind(now)
            .bind(now)
            .fetch_one(conn)
            .await
            .map_err(map_write_error)?
            .try_into()
    }

    async fn retire_assignment(
        conn: &mut SqliteConnection,
        assignment_id: &AssignmentId,
        deleted_by: Option<PrincipalId>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE assignments SET deleted_at = ?, deleted_by = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(deleted_by.map(|p| p.0))
        .bind(now)
        .bind(assignment_id.0)
        .execute(conn)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Map insert/update failures: unique-index hits become `Conflict`.
fn map_write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::Invalid(db.message().to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: i64,
    principal_id: i64,
    role_id: i64,
    context_tier: String,
    context_id: i64,
    trade: Option<String>,
    is_primary: bool,
    starts_on: Option<NaiveDate>,
    ends_on: Option<NaiveDate>,
    created_by: Option<i64>,
    updated_by: Option<i64>,
    deleted_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = StoreError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let context_tier = row
            .context_tier
            .parse::<ContextTier>()
            .map_err(|e| StoreError::Backend(format!("invalid tier in database: {}", e)))?;

        Ok(Assignment {
            id: AssignmentId(row.id),
            principal_id: PrincipalId(row.principal_id),
            role_id: RoleId(row.role_id),
            context_tier,
            context_id: ContextId(row.context_id),
            trade: row.trade,
            is_primary: row.is_primary,
            validity: ValidityWindow::new(row.starts_on, row.ends_on),
            created_by: row.created_by.map(PrincipalId),
            updated_by: row.updated_by.map(PrincipalId),
            deleted_by: row.deleted_by.map(PrincipalId),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    scope_tier: String,
    org_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RoleRow> for Role {
    type Error = StoreError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let scope_tier = row
            .scope_tier
            .parse::<ContextTier>()
            .map_err(|e| StoreError::Backend(format!("invalid tier in database: {}", e)))?;

        Ok(Role {
            id: RoleId(row.id),
            name: row.name,
            scope_tier,
            organization_id: row.org_id.map(OrganizationId),
            created_at: row.created_at,
        })
    }
}

fn collect_assignments(rows: Vec<AssignmentRow>) -> Result<Vec<Assignment>, StoreError> {
    rows.into_iter().map(Assignment::try_from).collect()
}

#[async_trait::async_trait]
impl AssignmentStore for SqliteStore {
    // ───────────────────────────── Roles ─────────────────────────────

    async fn create_role(&self, params: &CreateRoleParams) -> Result<Role, StoreError> {
        sqlx::query_as::<_, RoleRow>(
            "INSERT INTO roles(name, scope_tier, org_id, created_at) VALUES(?, ?, ?, ?)
             RETURNING id, name, scope_tier, org_id, created_at",
        )
        .bind(&params.name)
        .bind(params.scope_tier.as_str())
        .bind(params.organization_id.map(|o| o.0))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?
        .try_into()
    }

    async fn get_role(&self, role_id: &RoleId) -> Result<Role, StoreError> {
        sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, scope_tier, org_id, created_at FROM roles WHERE id = ?",
        )
        .bind(role_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }

    // ───────────────────────────── Assignments ─────────────────────────────

    async fn create_assignment(
        &self,
        params: &CreateAssignmentParams,
    ) -> Result<Assignment, StoreError> {
        params.validity.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Self::ensure_role(&mut tx, &params.role_id, params.context_tier).await?;
        let assignment = Self::insert_assignment(&mut tx, params).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        assignment_id: &AssignmentId,
        params: &UpdateAssignmentParams,
    ) -> Result<Assignment, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let current = Self::fetch_live_assignment(&mut tx, assignment_id).await?;
        let next = params.apply_to(&current)?;
        if next.role_id != current.role_id {
            Self::ensure_role(&mut tx, &next.role_id, next.context_tier).await?;
        }

        let sql = format!(
            "UPDATE assignments
             SET role_id = ?, trade = ?, is_primary = ?, starts_on = ?, ends_on = ?,
                 updated_by = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL
             RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        let updated: Assignment = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(next.role_id.0)
            .bind(&next.trade)
            .bind(next.is_primary)
            .bind(next.validity.starts_on)
            .bind(next.validity.ends_on)
            .bind(next.updated_by.map(|p| p.0))
            .bind(next.updated_at)
            .bind(assignment_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound)?
            .try_into()?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(updated)
    }

    async fn soft_delete_assignment(
        &self,
        assignment_id: &AssignmentId,
        deleted_by: Option<PrincipalId>,
    ) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::retire_assignment(&mut conn, assignment_id, deleted_by).await
    }

    async fn transfer_assignment(
        &self,
        assignment_id: &AssignmentId,
        to_principal: &PrincipalId,
        actor: Option<PrincipalId>,
    ) -> Result<Assignment, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let source = Self::fetch_live_assignment(&mut tx, assignment_id).await?;
        Self::retire_assignment(&mut tx, assignment_id, actor).await?;

        let params = CreateAssignmentParams {
            principal_id: *to_principal,
            role_id: source.role_id,
            context_tier: source.context_tier,
            context_id: source.context_id,
            validity: source.validity,
            trade: source.trade.clone(),
            is_primary: source.is_primary,
            created_by: actor,
        };
        // A conflict here drops `tx`, rolling back the retirement as well.
        let transferred = Self::insert_assignment(&mut tx, &params).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(transferred)
    }

    async fn get_assignment(
        &self,
        assignment_id: &AssignmentId,
    ) -> Result<Assignment, StoreError> {
        let sql = format!("SELECT {} FROM assignments WHERE id = ?", ASSIGNMENT_COLUMNS);
        sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(assignment_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_active_assignments(
        &self,
        principal_id: &PrincipalId,
        tier: Option<ContextTier>,
        as_of: NaiveDate,
    ) -> Result<Vec<Assignment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM assignments
             WHERE principal_id = ?1 AND {} AND (?3 IS NULL OR context_tier = ?3)
             ORDER BY id",
            ASSIGNMENT_COLUMNS, ACTIVE_ON
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(principal_id.0)
            .bind(as_of)
            .bind(tier.map(|t| t.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        collect_assignments(rows)
    }

    async fn get_context_ids(
        &self,
        principal_id: &PrincipalId,
        tier: ContextTier,
        as_of: NaiveDate,
    ) -> Result<BTreeSet<ContextId>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT context_id FROM assignments
             WHERE principal_id = ?1 AND {} AND context_tier = ?3",
            ACTIVE_ON
        );
        let rows = sqlx::query_as::<_, (i64,)>(&sql)
            .bind(principal_id.0)
            .bind(as_of)
            .bind(tier.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| ContextId(id)).collect())
    }

    async fn list_assignment_history(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Vec<Assignment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE principal_id = ? ORDER BY id",
            ASSIGNMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(principal_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        collect_assignments(rows)
    }

    async fn list_context_assignments(
        &self,
        tier: ContextTier,
        context_id: &ContextId,
        as_of: NaiveDate,
    ) -> Result<Vec<Assignment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM assignments
             WHERE context_id = ?1 AND {} AND context_tier = ?3
             ORDER BY id",
            ASSIGNMENT_COLUMNS, ACTIVE_ON
        );
        let rows = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(context_id.0)
            .bind(as_of)
            .bind(tier.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        collect_assignments(rows)
    }
}

#[async_trait::async_trait]
impl HierarchyIndex for SqliteStore {
    async fn locations_of_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<LocationId>, StoreError> {
        let rows = sqlx::query_as::<_, (i64,)>("SELECT id FROM locations WHERE org_id = ?")
            .bind(organization_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|(id,)| LocationId(id)).collect())
    }

    async fn projects_of_location(
        &self,
        location_id: &LocationId,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<ProjectId>, StoreError> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM projects WHERE location_id = ? AND org_id = ?",
        )
        .bind(location_id.0)
        .bind(organization_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|(id,)| ProjectId(id)).collect())
    }

    async fn projects_of_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<BTreeSet<ProjectId>, StoreError> {
        let rows = sqlx::query_as::<_, (i64,)>("SELECT id FROM projects WHERE org_id = ?")
            .bind(organization_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(|(id,)| ProjectId(id)).collect())
    }
}

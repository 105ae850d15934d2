//! Assignment types: time-bounded grants of a role to a principal at a context.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{AssignmentId, ContextId, ContextTier, PrincipalId, RoleId};
use crate::StoreError;

/// Calendar validity window of an assignment. Either bound may be open.
///
/// Both bounds are inclusive: an assignment ending on the 31st is still
/// active on the 31st.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

impl ValidityWindow {
    /// Window open at both ends.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn new(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> Self {
        Self { starts_on, ends_on }
    }

    /// Check if the window covers the given day.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.starts_on.is_none_or(|start| start <= day) && self.ends_on.is_none_or(|end| end >= day)
    }

    /// Reject windows that end before they start.
    pub fn validate(&self) -> Result<(), StoreError> {
        match (self.starts_on, self.ends_on) {
            (Some(start), Some(end)) if start > end => Err(StoreError::Invalid(format!(
                "validity window ends ({}) before it starts ({})",
                end, start
            ))),
            _ => Ok(()),
        }
    }
}

/// Assignment record.
///
/// Rows are never physically erased; retirement sets `deleted_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
    pub context_tier: ContextTier,
    pub context_id: ContextId,
    /// Opaque trade/specialization tag (e.g. "electrical").
    pub trade: Option<String>,
    pub is_primary: bool,
    pub validity: ValidityWindow,
    pub created_by: Option<PrincipalId>,
    pub updated_by: Option<PrincipalId>,
    pub deleted_by: Option<PrincipalId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Not deleted and inside its validity window on `day`.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        !self.is_deleted() && self.validity.contains(day)
    }

    /// The uniqueness tuple among non-deleted assignments.
    pub fn tuple(&self) -> (PrincipalId, RoleId, ContextTier, ContextId) {
        (
            self.principal_id,
            self.role_id,
            self.context_tier,
            self.context_id,
        )
    }
}

/// Parameters for creating an assignment
#[derive(Clone, Debug)]
pub struct CreateAssignmentParams {
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
    pub context_tier: ContextTier,
    pub context_id: ContextId,
    pub validity: ValidityWindow,
    pub trade: Option<String>,
    pub is_primary: bool,
    /// Acting principal, recorded for audit.
    pub created_by: Option<PrincipalId>,
}

impl CreateAssignmentParams {
    /// Open-ended, non-primary grant without a trade tag.
    pub fn new(
        principal_id: PrincipalId,
        role_id: RoleId,
        context_tier: ContextTier,
        context_id: impl Into<ContextId>,
    ) -> Self {
        Self {
            principal_id,
            role_id,
            context_tier,
            context_id: context_id.into(),
            validity: ValidityWindow::open(),
            trade: None,
            is_primary: false,
            created_by: None,
        }
    }

    pub fn with_validity(mut self, validity: ValidityWindow) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_trade(mut self, trade: impl Into<String>) -> Self {
        self.trade = Some(trade.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn created_by(mut self, actor: PrincipalId) -> Self {
        self.created_by = Some(actor);
        self
    }
}

/// Partial update of an assignment. `None` leaves a field untouched; for the
/// clearable fields `Some(None)` clears the value.
#[derive(Clone, Debug, Default)]
pub struct UpdateAssignmentParams {
    pub role_id: Option<RoleId>,
    pub trade: Option<Option<String>>,
    pub is_primary: Option<bool>,
    pub starts_on: Option<Option<NaiveDate>>,
    pub ends_on: Option<Option<NaiveDate>>,
    /// Acting principal, recorded for audit.
    pub updated_by: Option<PrincipalId>,
}

impl UpdateAssignmentParams {
    /// Apply the changes to an existing record, validating the resulting window.
    ///
    /// Returns the updated copy; the caller persists it.
    pub fn apply_to(&self, current: &Assignment) -> Result<Assignment, StoreError> {
        let mut next = current.clone();
        if let Some(role_id) = self.role_id {
            next.role_id = role_id;
        }
        if let Some(trade) = &self.trade {
            next.trade = trade.clone();
        }
        if let Some(is_primary) = self.is_primary {
            next.is_primary = is_primary;
        }
        if let Some(starts_on) = self.starts_on {
            next.validity.starts_on = starts_on;
        }
        if let Some(ends_on) = self.ends_on {
            next.validity.ends_on = ends_on;
        }
        next.validity.validate()?;
        next.updated_by = self.updated_by;
        next.updated_at = Utc::now();
        Ok(next)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use super::domain::CarerId;
use super::error::VisitError;

/// Roles recognised by the visit workflows. Session issuance happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Coordinator,
    Carer,
    FamilyMember,
    System,
}

/// Which shifts a role may see or act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftScope {
    All,
    OwnOnly,
    Nothing,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "coordinator" => Some(Self::Coordinator),
            "carer" | "caregiver" => Some(Self::Carer),
            "family" | "family_member" => Some(Self::FamilyMember),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Coordinator => "coordinator",
            Self::Carer => "carer",
            Self::FamilyMember => "family_member",
            Self::System => "system",
        }
    }

    pub const fn shift_scope(self) -> ShiftScope {
        match self {
            Self::Admin | Self::Manager | Self::Coordinator | Self::System => ShiftScope::All,
            Self::Carer => ShiftScope::OwnOnly,
            Self::FamilyMember => ShiftScope::Nothing,
        }
    }

    /// Roles allowed to create, cancel, and sweep shifts.
    pub const fn manages_schedule(self) -> bool {
        matches!(self.shift_scope(), ShiftScope::All)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The single capability check shared by every component.
pub fn can_access_shift(role: Role, is_owner: bool) -> bool {
    match role.shift_scope() {
        ShiftScope::All => true,
        ShiftScope::OwnOnly => is_owner,
        ShiftScope::Nothing => false,
    }
}

/// Caller identity for scoped queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub role: Role,
    pub id: Option<CarerId>,
}

impl Requester {
    pub fn new(role: Role, id: Option<CarerId>) -> Self {
        Self { role, id }
    }

    pub fn system() -> Self {
        Self {
            role: Role::System,
            id: None,
        }
    }

    pub fn owns(&self, carer: &CarerId) -> bool {
        self.id.as_ref() == Some(carer)
    }

    pub fn can_access(&self, carer: &CarerId) -> bool {
        can_access_shift(self.role, self.owns(carer))
    }

    /// Rejects requesters that cannot run a scoped query at all.
    pub(crate) fn ensure_can_query(&self) -> Result<(), VisitError> {
        match self.role.shift_scope() {
            ShiftScope::All => Ok(()),
            ShiftScope::OwnOnly if self.id.is_some() => Ok(()),
            ShiftScope::OwnOnly => Err(VisitError::Authorization(format!(
                "role {} needs a requester id for own-shift queries",
                self.role
            ))),
            ShiftScope::Nothing => Err(VisitError::Authorization(format!(
                "role {} cannot view shifts",
                self.role
            ))),
        }
    }

    pub(crate) fn ensure_manages_schedule(&self) -> Result<(), VisitError> {
        if self.role.manages_schedule() {
            Ok(())
        } else {
            Err(VisitError::Authorization(format!(
                "role {} cannot manage the schedule",
                self.role
            )))
        }
    }
}

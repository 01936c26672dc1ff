//! Role and capability types
//!
//! Roles are a closed set. What a role may do to events and tasks is
//! answered by its capability table, independent of which dashboard a
//! client renders for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Acting party category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Resident,
    Prospect,
    Operator,
    Maintenance,
    Vendor,
    Admin,
}

/// Something a role is allowed to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateEvent,
    RescheduleEvent,
    CancelEvent,
    AddFollowUp,
    /// Complete or start tasks assigned to the acting role
    CompleteAssignedTask,
    /// Complete or start tasks assigned to any role
    OverrideTaskAssignment,
    /// See events the user is not assigned to
    ViewAllEvents,
}

const RESIDENT: &[Capability] = &[Capability::CompleteAssignedTask, Capability::AddFollowUp];

const PROSPECT: &[Capability] = &[Capability::CompleteAssignedTask];

const OPERATOR: &[Capability] = &[
    Capability::CreateEvent,
    Capability::RescheduleEvent,
    Capability::CancelEvent,
    Capability::AddFollowUp,
    Capability::CompleteAssignedTask,
    Capability::ViewAllEvents,
];

const MAINTENANCE: &[Capability] = &[
    Capability::RescheduleEvent,
    Capability::AddFollowUp,
    Capability::CompleteAssignedTask,
];

const VENDOR: &[Capability] = &[Capability::CompleteAssignedTask];

const ADMIN: &[Capability] = &[
    Capability::CreateEvent,
    Capability::RescheduleEvent,
    Capability::CancelEvent,
    Capability::AddFollowUp,
    Capability::CompleteAssignedTask,
    Capability::OverrideTaskAssignment,
    Capability::ViewAllEvents,
];

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Resident,
        Role::Prospect,
        Role::Operator,
        Role::Maintenance,
        Role::Vendor,
        Role::Admin,
    ];

    /// Permission set for this role
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Resident => RESIDENT,
            Self::Prospect => PROSPECT,
            Self::Operator => OPERATOR,
            Self::Maintenance => MAINTENANCE,
            Self::Vendor => VENDOR,
            Self::Admin => ADMIN,
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Whether this role may act on a task assigned to `assigned`
    pub fn can_act_on_task(self, assigned: Role) -> bool {
        self.can(Capability::OverrideTaskAssignment)
            || (self == assigned && self.can(Capability::CompleteAssignedTask))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::Prospect => "prospect",
            Self::Operator => "operator",
            Self::Maintenance => "maintenance",
            Self::Vendor => "vendor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resident" | "tenant" => Ok(Self::Resident),
            "prospect" => Ok(Self::Prospect),
            "operator" | "manager" | "property_manager" => Ok(Self::Operator),
            "maintenance" => Ok(Self::Maintenance),
            "vendor" => Ok(Self::Vendor),
            "admin" | "administrator" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

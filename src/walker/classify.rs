//! Membership classification
//!
//! Maps the relationship kind reported for a membership onto what the
//! crawler does with it:
//!
//! | kind               | edge now    | record object | queue          |
//! |--------------------|-------------|---------------|----------------|
//! | Role               | RoleMember  | first claim   | never          |
//! | Group              | no          | first claim   | on first claim |
//! | AdministrativeUnit | no          | first claim   | never          |
//! | anything else      | no          | no            | never          |
//!
//! Group edges are written later, when the group itself is enumerated.

use crate::directory::MembershipRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipKind {
    Role,
    Group,
    AdministrativeUnit,
    Unknown,
}

/// What to do with one membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipAction {
    /// Write a subject → object edge immediately
    pub record_edge: bool,

    /// Write the object record if this is the first claim
    pub record_object: bool,

    /// Queue the object for expansion if this is the first claim
    pub queue: bool,
}

impl MembershipKind {
    /// Parse the service's relationship kind; exact, case-sensitive match
    pub fn from_object_type(object_type: &str) -> Self {
        match object_type {
            "Role" => MembershipKind::Role,
            "Group" => MembershipKind::Group,
            "AdministrativeUnit" => MembershipKind::AdministrativeUnit,
            _ => MembershipKind::Unknown,
        }
    }

    pub fn action(&self) -> MembershipAction {
        match self {
            MembershipKind::Role => MembershipAction {
                record_edge: true,
                record_object: true,
                queue: false,
            },
            MembershipKind::Group => MembershipAction {
                record_edge: false,
                record_object: true,
                queue: true,
            },
            MembershipKind::AdministrativeUnit => MembershipAction {
                record_edge: false,
                record_object: true,
                queue: false,
            },
            MembershipKind::Unknown => MembershipAction {
                record_edge: false,
                record_object: false,
                queue: false,
            },
        }
    }
}

pub fn classify(membership: &MembershipRecord) -> MembershipKind {
    MembershipKind::from_object_type(&membership.object_type)
}

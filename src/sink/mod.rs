//! Record sink for crawl output
//!
//! Seven independent append-only streams, one per record kind plus one for
//! errors. Each stream is synchronized on its own, so a slow write to one
//! never holds up another, and a record is always appended whole.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Expansion tasks (N)                      │
//! │  - write_user / write_group / write_edge / ...          │
//! └──────┬──────────┬──────────┬──────────┬─────────────────┘
//!        │          │          │          │
//!        ▼          ▼          ▼          ▼
//!   ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐
//!   │ users  │ │ groups │ │ roles  │ │ errors │  ... one lock each
//!   └────────┘ └────────┘ └────────┘ └────────┘
//!        │          │          │          │
//!        ▼          ▼          ▼          ▼
//!   {tenant}_users.txt  {tenant}_groups.txt  ...
//! ```

pub mod csv_writer;
pub mod memory;

use crate::directory::UserRecord;
use crate::error::SinkResult;

pub use csv_writer::{CsvSink, SinkStats};
pub use memory::MemorySink;

/// One output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Users,
    Groups,
    GroupsMembership,
    Roles,
    RolesMembership,
    AdministrativeUnits,
    Errors,
}

impl Stream {
    /// Every stream, in file creation order
    pub const ALL: [Stream; 7] = [
        Stream::Users,
        Stream::Groups,
        Stream::GroupsMembership,
        Stream::Roles,
        Stream::RolesMembership,
        Stream::AdministrativeUnits,
        Stream::Errors,
    ];

    /// Stream name, also the file name suffix
    pub fn name(&self) -> &'static str {
        match self {
            Stream::Users => "users",
            Stream::Groups => "groups",
            Stream::GroupsMembership => "groups_membership",
            Stream::Roles => "roles",
            Stream::RolesMembership => "roles_membership",
            Stream::AdministrativeUnits => "administrativeunits",
            Stream::Errors => "errors",
        }
    }

    /// Header row
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Stream::Users => &["objectId", "userType", "userPrincipalName", "displayName"],
            Stream::Groups => &["objectId", "displayname"],
            Stream::GroupsMembership => &["groupId", "userId"],
            Stream::Roles => &["objectId", "displayname"],
            Stream::RolesMembership => &["roleId", "userId"],
            Stream::AdministrativeUnits => &["objectId"],
            Stream::Errors => &["objectId", "message"],
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

/// Group discovered as a membership target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupRecord {
    pub id: String,
    pub display_name: String,
}

/// Directory role; recorded, never expanded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleRecord {
    pub id: String,
    pub display_name: String,
}

/// Administrative unit; recorded, never expanded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdministrativeUnitRecord {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    GroupMember,
    RoleMember,
}

/// "subject belongs to object"
///
/// Edges are facts about the graph: they are written every time they are
/// observed and never retracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MembershipEdge {
    pub subject_id: String,
    pub object_id: String,
    pub kind: EdgeKind,
}

impl MembershipEdge {
    pub fn group_member(group_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            subject_id: member_id.into(),
            object_id: group_id.into(),
            kind: EdgeKind::GroupMember,
        }
    }

    pub fn role_member(role_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            subject_id: member_id.into(),
            object_id: role_id.into(),
            kind: EdgeKind::RoleMember,
        }
    }

    /// Stream this edge is written to
    pub fn stream(&self) -> Stream {
        match self.kind {
            EdgeKind::GroupMember => Stream::GroupsMembership,
            EdgeKind::RoleMember => Stream::RolesMembership,
        }
    }
}

/// Failed expansion of one object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorRecord {
    pub object_id: String,
    pub message: String,
}

/// Destination for crawl records
///
/// Implementations must be safe for concurrent writers and keep every
/// stream independent of the others.
pub trait RecordSink: Send + Sync {
    fn write_user(&self, user: &UserRecord) -> SinkResult<()>;

    fn write_group(&self, group: &GroupRecord) -> SinkResult<()>;

    fn write_role(&self, role: &RoleRecord) -> SinkResult<()>;

    fn write_admin_unit(&self, unit: &AdministrativeUnitRecord) -> SinkResult<()>;

    /// Append to the groups_membership or roles_membership stream
    fn write_edge(&self, edge: &MembershipEdge) -> SinkResult<()>;

    fn write_error(&self, error: &ErrorRecord) -> SinkResult<()>;

    /// Push buffered records to their destination
    fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}

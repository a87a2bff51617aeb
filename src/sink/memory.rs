//! In-memory sink
//!
//! Keeps every record in process memory. Used by tests and by callers that
//! post-process the crawl without going through files.

use super::{
    AdministrativeUnitRecord, EdgeKind, ErrorRecord, GroupRecord, MembershipEdge, RecordSink,
    RoleRecord,
};
use crate::directory::UserRecord;
use crate::error::SinkResult;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct MemorySink {
    users: Mutex<Vec<UserRecord>>,
    groups: Mutex<Vec<GroupRecord>>,
    group_edges: Mutex<Vec<MembershipEdge>>,
    roles: Mutex<Vec<RoleRecord>>,
    role_edges: Mutex<Vec<MembershipEdge>>,
    admin_units: Mutex<Vec<AdministrativeUnitRecord>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> Vec<UserRecord> {
        self.users.lock().clone()
    }

    pub fn groups(&self) -> Vec<GroupRecord> {
        self.groups.lock().clone()
    }

    pub fn group_edges(&self) -> Vec<MembershipEdge> {
        self.group_edges.lock().clone()
    }

    pub fn roles(&self) -> Vec<RoleRecord> {
        self.roles.lock().clone()
    }

    pub fn role_edges(&self) -> Vec<MembershipEdge> {
        self.role_edges.lock().clone()
    }

    pub fn admin_units(&self) -> Vec<AdministrativeUnitRecord> {
        self.admin_units.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors.lock().clone()
    }
}

impl RecordSink for MemorySink {
    fn write_user(&self, user: &UserRecord) -> SinkResult<()> {
        self.users.lock().push(user.clone());
        Ok(())
    }

    fn write_group(&self, group: &GroupRecord) -> SinkResult<()> {
        self.groups.lock().push(group.clone());
        Ok(())
    }

    fn write_role(&self, role: &RoleRecord) -> SinkResult<()> {
        self.roles.lock().push(role.clone());
        Ok(())
    }

    fn write_admin_unit(&self, unit: &AdministrativeUnitRecord) -> SinkResult<()> {
        self.admin_units.lock().push(unit.clone());
        Ok(())
    }

    fn write_edge(&self, edge: &MembershipEdge) -> SinkResult<()> {
        match edge.kind {
            EdgeKind::GroupMember => self.group_edges.lock().push(edge.clone()),
            EdgeKind::RoleMember => self.role_edges.lock().push(edge.clone()),
        }
        Ok(())
    }

    fn write_error(&self, error: &ErrorRecord) -> SinkResult<()> {
        self.errors.lock().push(error.clone());
        Ok(())
    }
}

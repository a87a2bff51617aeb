//! Directory API access
//!
//! The crawler talks to the tenant through the [`DirectoryClient`] trait.
//! [`GraphClient`] is the production implementation over Microsoft Graph;
//! tests substitute an in-memory stub.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  WaveCoordinator                     │
//! │  - user phase:  get_memberships(user)               │
//! │  - group phase: stream_group_members(group, cb)     │
//! └─────────────────────────┬───────────────────────────┘
//!                           │ Arc<dyn DirectoryClient>
//!                           ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                    GraphClient                       │
//! │  - bearer token supplied by the caller              │
//! │  - @odata.nextLink pagination, one page in memory   │
//! │  - 429 / 5xx retry with Retry-After                 │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod graph;
pub mod types;

use crate::error::QueryResult;
use async_trait::async_trait;

pub use graph::{GraphClient, GraphConfig};
pub use types::{MemberRecord, MembershipRecord, ObjectSummary, UserRecord};

/// Read access to one directory tenant
///
/// Every call fails independently; a failure never poisons the client.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Resolve a seed identifier (object id or principal name) to its user
    async fn get_direct_object(&self, id: &str) -> QueryResult<ObjectSummary>;

    /// Direct group, role and administrative unit memberships of an object
    async fn get_memberships(&self, id: &str) -> QueryResult<Vec<MembershipRecord>>;

    /// Invoke `on_member` once per direct member of a group
    ///
    /// Members are delivered as they arrive; the full member list is never
    /// materialized. An error aborts the stream for this group only, after
    /// the members already delivered.
    async fn stream_group_members(
        &self,
        group_id: &str,
        on_member: &mut (dyn FnMut(MemberRecord) + Send),
    ) -> QueryResult<()>;
}

//! Wave-based membership crawler
//!
//! Starting from seed users, this module alternately expands the user
//! frontier (memberOf) and the group frontier (members) until neither
//! yields anything new. Every object is expanded at most once.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │     WaveCoordinator     │
//!                     │  - drains frontiers     │
//!                     │  - bounds concurrency   │
//!                     └───────────┬─────────────┘
//!                                 │
//!            ┌────────────────────┴────────────────────┐
//!            │                                         │
//!     ┌──────▼──────┐   groups discovered       ┌──────▼──────┐
//!     │ user phase  │ ────────────────────────▶ │ group phase │
//!     │  memberOf   │                           │   members   │
//!     └──────▲──────┘                           └──────┬──────┘
//!            │          users discovered               │
//!            └─────────────────────────────────────────┘
//!                         (next wave)
//! ```
//!
//! Claims go through [`VisitedRegistry`]; pending ids sit in a [`Frontier`].

pub mod classify;
pub mod coordinator;
pub mod frontier;
pub mod registry;

pub use classify::{classify, MembershipAction, MembershipKind};
pub use coordinator::{
    Phase, ProgressHandle, WalkOptions, WalkOutcome, WalkProgress, WalkResult, WalkStats,
    WalkStatsSnapshot, WaveCoordinator,
};
pub use frontier::Frontier;
pub use registry::VisitedRegistry;

//! tenant-walker - Directory membership crawler
//!
//! Starting from a handful of seed accounts, walks the group, role and
//! administrative unit memberships of a directory tenant until nothing new
//! turns up, and writes what it found as seven comma separated tables.
//!
//! # Features
//!
//! - **Wave Scheduling**: users and groups are expanded in alternating
//!   phases, each phase bounded to a fixed number of concurrent queries.
//!
//! - **At-Most-Once Expansion**: a shared claim registry guarantees no
//!   object's membership is queried twice, even when many tasks discover
//!   it in the same instant.
//!
//! - **Failure Isolation**: a failed query produces an error row for that
//!   object and the crawl moves on.
//!
//! - **Streaming Groups**: group members are processed page by page, so a
//!   group with millions of members never sits in memory at once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Directory API (Graph)                        │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ memberOf / members (paged)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       WaveCoordinator                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐    │
//! │  │ user frontier│   │group frontier│   │ VisitedRegistry   │    │
//! │  │ (crossbeam)  │   │ (crossbeam)  │   │ expanded/recorded │    │
//! │  └──────┬───────┘   └──────┬───────┘   └───────────────────┘    │
//! │         └────────┬─────────┘                                     │
//! │                  ▼                                               │
//! │       tokio tasks, Semaphore(N) per phase                        │
//! └──────────────────┬──────────────────────────────────────────────┘
//!                    │ RecordSink
//!                    ▼
//!          ┌──────────────────────────┐
//!          │ {tenant}_users.txt       │
//!          │ {tenant}_groups.txt ...  │
//!          └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! export TENANT_WALKER_TOKEN=eyJ0eXAi...
//! tenant-walker -t contoso.onmicrosoft.com alice@contoso.com -o out/
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod progress;
pub mod sink;
pub mod walker;

pub use config::{CliArgs, WalkConfig};
pub use directory::{DirectoryClient, GraphClient};
pub use error::{Result, WalkerError};
pub use sink::{CsvSink, MemorySink, RecordSink};
pub use walker::{WalkOptions, WalkOutcome, WalkResult, WaveCoordinator};

//! Wave coordinator - drives the membership crawl
//!
//! The crawl advances in waves. Each wave expands every queued user, then
//! every queued group, each phase with at most `concurrency` queries in
//! flight. Users discovered while enumerating groups form the next wave's
//! user frontier; groups discovered while expanding users form this wave's
//! group frontier. The crawl ends when a wave leaves both frontiers empty.

use super::classify::{classify, MembershipKind};
use super::frontier::Frontier;
use super::registry::VisitedRegistry;
use crate::directory::{DirectoryClient, MemberRecord, MembershipRecord};
use crate::error::{
    ExpansionOutcome, QueryError, Result, SinkError, SinkResult, WalkerError, WorkerError,
};
use crate::sink::{
    AdministrativeUnitRecord, ErrorRecord, GroupRecord, MembershipEdge, RecordSink, RoleRecord,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Tuning knobs for a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Maximum concurrent expansions per phase
    pub concurrency: usize,

    /// Log a progress line every this many processed objects
    pub progress_every: u64,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            concurrency: 20,
            progress_every: 1000,
        }
    }
}

/// Statistics collected during the crawl
#[derive(Debug, Default)]
pub struct WalkStats {
    pub seeds_resolved: AtomicU64,
    pub seeds_failed: AtomicU64,
    pub users_expanded: AtomicU64,
    pub groups_expanded: AtomicU64,
    pub users_recorded: AtomicU64,
    pub groups_recorded: AtomicU64,
    pub roles_recorded: AtomicU64,
    pub admin_units_recorded: AtomicU64,
    pub group_edges: AtomicU64,
    pub role_edges: AtomicU64,
    pub errors: AtomicU64,
    pub throttled: AtomicU64,
    pub anomalies: AtomicU64,
    pub skipped: AtomicU64,
    pub waves: AtomicU64,
}

impl WalkStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Plain copy of every counter
    pub fn snapshot(&self) -> WalkStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        WalkStatsSnapshot {
            seeds_resolved: load(&self.seeds_resolved),
            seeds_failed: load(&self.seeds_failed),
            users_expanded: load(&self.users_expanded),
            groups_expanded: load(&self.groups_expanded),
            users_recorded: load(&self.users_recorded),
            groups_recorded: load(&self.groups_recorded),
            roles_recorded: load(&self.roles_recorded),
            admin_units_recorded: load(&self.admin_units_recorded),
            group_edges: load(&self.group_edges),
            role_edges: load(&self.role_edges),
            errors: load(&self.errors),
            throttled: load(&self.throttled),
            anomalies: load(&self.anomalies),
            skipped: load(&self.skipped),
            waves: load(&self.waves),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStatsSnapshot {
    pub seeds_resolved: u64,
    pub seeds_failed: u64,
    pub users_expanded: u64,
    pub groups_expanded: u64,
    pub users_recorded: u64,
    pub groups_recorded: u64,
    pub roles_recorded: u64,
    pub admin_units_recorded: u64,
    pub group_edges: u64,
    pub role_edges: u64,
    pub errors: u64,
    pub throttled: u64,
    pub anomalies: u64,
    pub skipped: u64,
    pub waves: u64,
}

/// Step of the crawl currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Resolving = 0,
    Users = 1,
    Groups = 2,
    Done = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Resolving,
            1 => Phase::Users,
            2 => Phase::Groups,
            _ => Phase::Done,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Resolving => "resolving seeds",
            Phase::Users => "users",
            Phase::Groups => "groups",
            Phase::Done => "done",
        }
    }
}

/// Point-in-time view of the crawl for display
#[derive(Debug, Clone)]
pub struct WalkProgress {
    pub wave: u64,
    pub phase: Phase,
    pub phase_processed: u64,
    pub phase_total: u64,
    pub user_frontier: usize,
    pub group_frontier: usize,
    pub stats: WalkStatsSnapshot,
    pub elapsed: Duration,
}

/// How the crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Both frontiers drained
    Completed,
    /// No seed could be resolved, nothing was crawled
    NoSeedsResolved,
    /// Shutdown was requested before the frontiers drained
    Interrupted,
}

/// Result of a finished crawl
#[derive(Debug, Clone)]
pub struct WalkResult {
    pub outcome: WalkOutcome,
    pub stats: WalkStatsSnapshot,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl WalkResult {
    pub fn completed(&self) -> bool {
        self.outcome != WalkOutcome::Interrupted
    }
}

/// State shared by every expansion task of a crawl
struct CrawlState {
    client: Arc<dyn DirectoryClient>,
    sink: Arc<dyn RecordSink>,
    options: WalkOptions,
    /// Objects whose membership has been queried
    expanded: VisitedRegistry,
    /// Objects whose record has been written
    recorded: VisitedRegistry,
    users: Frontier<String>,
    groups: Frontier<GroupRecord>,
    stats: WalkStats,
    shutdown: Arc<AtomicBool>,
    wave: AtomicU64,
    phase: AtomicU8,
    phase_processed: AtomicU64,
    phase_total: AtomicU64,
    created: Instant,
}

impl CrawlState {
    fn set_phase(&self, phase: Phase, total: usize) {
        self.phase.store(phase as u8, Ordering::Relaxed);
        self.phase_processed.store(0, Ordering::Relaxed);
        self.phase_total.store(total as u64, Ordering::Relaxed);
    }

    fn progress(&self) -> WalkProgress {
        WalkProgress {
            wave: self.wave.load(Ordering::Relaxed),
            phase: Phase::from_u8(self.phase.load(Ordering::Relaxed)),
            phase_processed: self.phase_processed.load(Ordering::Relaxed),
            phase_total: self.phase_total.load(Ordering::Relaxed),
            user_frontier: self.users.len(),
            group_frontier: self.groups.len(),
            stats: self.stats.snapshot(),
            elapsed: self.created.elapsed(),
        }
    }

    /// Count one processed object, logging every `progress_every`
    fn tick(&self, kind: &str) {
        let count = self.phase_processed.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.options.progress_every == 0 {
            let total = self.phase_total.load(Ordering::Relaxed);
            info!(
                "Analyzed {} {}, {} to go",
                count,
                kind,
                total.saturating_sub(count)
            );
        }
    }

    /// Apply one membership discovered while expanding `subject`
    fn record_membership(&self, subject: &str, membership: MembershipRecord) -> SinkResult<()> {
        let kind = classify(&membership);
        let action = kind.action();

        if kind == MembershipKind::Unknown {
            WalkStats::bump(&self.stats.anomalies);
            warn!(
                subject,
                object = %membership.object_id,
                object_type = %membership.object_type,
                "Unknown membership type"
            );
            return Ok(());
        }

        if action.record_edge {
            self.sink
                .write_edge(&MembershipEdge::role_member(&membership.object_id, subject))?;
            WalkStats::bump(&self.stats.role_edges);
        }

        if !action.record_object || !self.recorded.try_claim(&membership.object_id) {
            return Ok(());
        }

        let MembershipRecord {
            object_id,
            display_name,
            ..
        } = membership;

        match kind {
            MembershipKind::Role => {
                info!(role = %display_name, "Found role");
                self.sink.write_role(&RoleRecord {
                    id: object_id,
                    display_name,
                })?;
                WalkStats::bump(&self.stats.roles_recorded);
            }
            MembershipKind::Group => {
                debug!(group = %display_name, "Found group");
                let group = GroupRecord {
                    id: object_id,
                    display_name,
                };
                self.sink.write_group(&group)?;
                WalkStats::bump(&self.stats.groups_recorded);
                if action.queue {
                    self.groups.push(group);
                }
            }
            MembershipKind::AdministrativeUnit => {
                debug!(unit = %object_id, "Found administrative unit");
                self.sink
                    .write_admin_unit(&AdministrativeUnitRecord { id: object_id })?;
                WalkStats::bump(&self.stats.admin_units_recorded);
            }
            MembershipKind::Unknown => {}
        }

        Ok(())
    }

    /// Apply one member streamed while enumerating `group`
    ///
    /// Returns true if the member was a newly recorded user.
    fn record_group_member(&self, group: &GroupRecord, member: MemberRecord) -> SinkResult<bool> {
        self.sink
            .write_edge(&MembershipEdge::group_member(&group.id, &member.object_id))?;
        WalkStats::bump(&self.stats.group_edges);

        if !member.is_user() || !self.recorded.try_claim(&member.object_id) {
            return Ok(false);
        }

        let user = member.into_user_record();
        self.sink.write_user(&user)?;
        WalkStats::bump(&self.stats.users_recorded);
        self.users.push(user.id);
        Ok(true)
    }

    /// Record a failed expansion; the object is not retried
    fn record_failure(&self, id: &str, error: &QueryError) -> SinkResult<()> {
        WalkStats::bump(&self.stats.errors);
        if error.is_throttling() {
            WalkStats::bump(&self.stats.throttled);
        }
        if error.is_recoverable() {
            debug!(object = id, error = %error, "Expansion failed");
        } else {
            error!(object = id, error = %error, "Expansion failed, credential rejected");
        }
        self.sink.write_error(&ErrorRecord {
            object_id: id.to_string(),
            message: error.to_string(),
        })
    }
}

/// Expand one user: query its memberships and classify each one
async fn expand_user(state: Arc<CrawlState>, id: String) -> Result<ExpansionOutcome> {
    state.tick("users");

    if !state.expanded.try_claim(&id) {
        WalkStats::bump(&state.stats.skipped);
        return Ok(ExpansionOutcome::Skipped { id });
    }

    match state.client.get_memberships(&id).await {
        Ok(memberships) => {
            let discovered = memberships.len();
            for membership in memberships {
                state.record_membership(&id, membership)?;
            }
            WalkStats::bump(&state.stats.users_expanded);
            Ok(ExpansionOutcome::Expanded { id, discovered })
        }
        Err(error) => {
            state.record_failure(&id, &error)?;
            Ok(ExpansionOutcome::Failed { id, error })
        }
    }
}

/// Expand one group: stream its members, recording an edge for each
async fn expand_group(state: Arc<CrawlState>, group: GroupRecord) -> Result<ExpansionOutcome> {
    state.tick("groups");

    if !state.expanded.try_claim(&group.id) {
        WalkStats::bump(&state.stats.skipped);
        return Ok(ExpansionOutcome::Skipped { id: group.id });
    }

    let mut members = 0u64;
    let mut new_users = 0u64;
    let mut sink_error: Option<SinkError> = None;

    let result = {
        let state = &state;
        let group = &group;
        let mut on_member = |member: MemberRecord| {
            if sink_error.is_some() {
                return;
            }
            members += 1;
            match state.record_group_member(group, member) {
                Ok(true) => new_users += 1,
                Ok(false) => {}
                Err(e) => sink_error = Some(e),
            }
            if members % state.options.progress_every == 0 {
                info!(
                    group = %group.display_name,
                    members,
                    "Busy enumerating group"
                );
            }
        };
        state
            .client
            .stream_group_members(&group.id, &mut on_member)
            .await
    };

    if let Some(e) = sink_error {
        return Err(e.into());
    }

    match result {
        Ok(()) => {
            if new_users > 0 {
                info!(group = %group.display_name, users = new_users, "Found new users in group");
            }
            WalkStats::bump(&state.stats.groups_expanded);
            Ok(ExpansionOutcome::Expanded {
                id: group.id,
                discovered: members as usize,
            })
        }
        Err(error) => {
            state.record_failure(&group.id, &error)?;
            Ok(ExpansionOutcome::Failed {
                id: group.id,
                error,
            })
        }
    }
}

/// Turn a joined task into the crawl's view of it
fn settle(
    phase: &str,
    joined: std::result::Result<Result<ExpansionOutcome>, JoinError>,
) -> Result<()> {
    match joined {
        Ok(Ok(outcome)) => {
            if outcome.is_success() {
                debug!(object = outcome.id(), phase, "Expanded");
            } else {
                debug!(object = outcome.id(), phase, "Not expanded");
            }
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(join_error) => {
            let task = format!("{phase} expansion");
            if join_error.is_panic() {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(WorkerError::Panicked { task, message }.into())
            } else {
                Err(WorkerError::Cancelled.into())
            }
        }
    }
}

/// Iterative, deduplicated, bounded-concurrency membership crawler
pub struct WaveCoordinator {
    state: Arc<CrawlState>,
}

impl WaveCoordinator {
    /// Create a coordinator with fresh registries and empty frontiers
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        sink: Arc<dyn RecordSink>,
        options: WalkOptions,
    ) -> Self {
        let options = WalkOptions {
            concurrency: options.concurrency.max(1),
            progress_every: options.progress_every.max(1),
        };

        Self {
            state: Arc::new(CrawlState {
                client,
                sink,
                options,
                expanded: VisitedRegistry::new(),
                recorded: VisitedRegistry::new(),
                users: Frontier::new(),
                groups: Frontier::new(),
                stats: WalkStats::default(),
                shutdown: Arc::new(AtomicBool::new(false)),
                wave: AtomicU64::new(0),
                phase: AtomicU8::new(Phase::Resolving as u8),
                phase_processed: AtomicU64::new(0),
                phase_total: AtomicU64::new(0),
                created: Instant::now(),
            }),
        }
    }

    /// Get shutdown flag for signal handlers
    ///
    /// Once set, no new expansion is launched; in-flight ones finish.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.state.shutdown)
    }

    /// Handle for polling progress from another task
    pub fn progress_handle(&self) -> ProgressHandle {
        ProgressHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn is_shutdown(&self) -> bool {
        self.state.shutdown.load(Ordering::Relaxed)
    }

    /// Run the crawl from `seeds` until both frontiers are empty
    ///
    /// Per-object query failures end up in the error stream; only sink
    /// failures and worker panics abort the run.
    pub async fn run(&self, seeds: &[String]) -> Result<WalkResult> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let state = &self.state;

        info!(
            seeds = seeds.len(),
            concurrency = state.options.concurrency,
            "Starting tenant walk"
        );
        debug!(start_time = %started_at.to_rfc3339(), "Walk started");

        self.resolve_seeds(seeds).await?;

        if state.users.is_empty() {
            let outcome = if self.is_shutdown() {
                WalkOutcome::Interrupted
            } else {
                info!("No user found to start the analysis");
                WalkOutcome::NoSeedsResolved
            };
            return self.finish(outcome, started_at, start_time);
        }

        while !(state.users.is_empty() && state.groups.is_empty()) {
            if self.is_shutdown() {
                break;
            }

            let wave = state.wave.fetch_add(1, Ordering::Relaxed) + 1;
            WalkStats::bump(&state.stats.waves);

            let users = state.users.drain();
            info!(wave, users = users.len(), "Processing users");
            state.set_phase(Phase::Users, users.len());
            self.run_phase(Phase::Users, users, expand_user).await?;

            let groups = state.groups.drain();
            info!(wave, groups = groups.len(), "Processing groups");
            state.set_phase(Phase::Groups, groups.len());
            self.run_phase(Phase::Groups, groups, expand_group).await?;

            debug!(wave, "Wave done");
        }

        let outcome = if self.is_shutdown() {
            WalkOutcome::Interrupted
        } else {
            WalkOutcome::Completed
        };
        self.finish(outcome, started_at, start_time)
    }

    /// Resolve every seed to its canonical user and queue it
    async fn resolve_seeds(&self, seeds: &[String]) -> Result<()> {
        let state = &self.state;
        state.set_phase(Phase::Resolving, seeds.len());
        info!("{} user(s) to proceed", seeds.len());

        for seed in seeds {
            if self.is_shutdown() {
                break;
            }

            match state.client.get_direct_object(seed).await {
                Ok(user) => {
                    WalkStats::bump(&state.stats.seeds_resolved);
                    if state.recorded.try_claim(&user.id) {
                        state.sink.write_user(&user)?;
                        WalkStats::bump(&state.stats.users_recorded);
                    }
                    state.users.push(user.id);
                }
                Err(e) => {
                    WalkStats::bump(&state.stats.seeds_failed);
                    warn!(seed = %seed, error = %e, "Unable to locate seed account");
                }
            }
            state.phase_processed.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Expand every item with at most `concurrency` tasks in flight
    ///
    /// Returns once every launched task has finished. The first fatal error
    /// stops further launches and is returned after the rest drain.
    async fn run_phase<T, F, Fut>(&self, phase: Phase, items: Vec<T>, expand: F) -> Result<()>
    where
        T: Send + 'static,
        F: Fn(Arc<CrawlState>, T) -> Fut,
        Fut: Future<Output = Result<ExpansionOutcome>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.state.options.concurrency));
        let mut tasks = JoinSet::new();
        let mut fatal: Option<WalkerError> = None;

        for item in items {
            if self.is_shutdown() {
                break;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::Cancelled)?;

            let work = expand(Arc::clone(&self.state), item);
            tasks.spawn(async move {
                let outcome = work.await;
                drop(permit);
                outcome
            });

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = settle(phase.label(), joined) {
                    fatal.get_or_insert(e);
                }
            }
            if fatal.is_some() {
                break;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = settle(phase.label(), joined) {
                fatal.get_or_insert(e);
            }
        }

        match fatal {
            Some(e) => {
                error!(error = %e, "Aborting walk");
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn finish(
        &self,
        outcome: WalkOutcome,
        started_at: DateTime<Utc>,
        start_time: Instant,
    ) -> Result<WalkResult> {
        let state = &self.state;
        state.set_phase(Phase::Done, 0);
        state.sink.flush()?;

        let stats = state.stats.snapshot();
        let duration = start_time.elapsed();

        info!(
            waves = stats.waves,
            users = stats.users_recorded,
            groups = stats.groups_recorded,
            roles = stats.roles_recorded,
            errors = stats.errors,
            expanded = state.expanded.len(),
            recorded = state.recorded.len(),
            duration_secs = duration.as_secs(),
            "Walk finished"
        );
        if outcome == WalkOutcome::Interrupted {
            info!("Walk was interrupted before completion");
        }

        Ok(WalkResult {
            outcome,
            stats,
            started_at,
            duration,
        })
    }
}

/// Read-only view of a running crawl
#[derive(Clone)]
pub struct ProgressHandle {
    state: Arc<CrawlState>,
}

impl ProgressHandle {
    pub fn snapshot(&self) -> WalkProgress {
        self.state.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::ObjectSummary;
    use crate::error::QueryResult;
    use crate::sink::MemorySink;
    use async_trait::async_trait;

    /// alice is in G1 and R1; G1 holds alice and bob
    struct TinyTenant;

    #[async_trait]
    impl DirectoryClient for TinyTenant {
        async fn get_direct_object(&self, id: &str) -> QueryResult<ObjectSummary> {
            Ok(ObjectSummary {
                id: id.to_string(),
                user_type: "Member".into(),
                user_principal_name: format!("{id}@contoso.com"),
                display_name: id.to_string(),
            })
        }

        async fn get_memberships(&self, id: &str) -> QueryResult<Vec<MembershipRecord>> {
            match id {
                "alice" => Ok(vec![
                    MembershipRecord::new("G1", "Group", "Engineering"),
                    MembershipRecord::new("R1", "Role", "Admins"),
                ]),
                _ => Ok(Vec::new()),
            }
        }

        async fn stream_group_members(
            &self,
            _group_id: &str,
            on_member: &mut (dyn FnMut(MemberRecord) + Send),
        ) -> QueryResult<()> {
            for id in ["alice", "bob"] {
                on_member(MemberRecord {
                    object_id: id.into(),
                    user_type: "Member".into(),
                    user_principal_name: String::new(),
                    display_name: id.into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_phase_roundtrip() {
        for phase in [Phase::Resolving, Phase::Users, Phase::Groups, Phase::Done] {
            assert_eq!(Phase::from_u8(phase as u8), phase);
        }
    }

    #[test]
    fn test_options_clamped() {
        let coordinator = WaveCoordinator::new(
            Arc::new(TinyTenant),
            Arc::new(MemorySink::new()),
            WalkOptions {
                concurrency: 0,
                progress_every: 0,
            },
        );
        assert_eq!(coordinator.state.options.concurrency, 1);
        assert_eq!(coordinator.state.options.progress_every, 1);
    }

    #[tokio::test]
    async fn test_two_waves() {
        let sink = Arc::new(MemorySink::new());
        let coordinator =
            WaveCoordinator::new(Arc::new(TinyTenant), sink.clone(), WalkOptions::default());

        let result = coordinator.run(&["alice".to_string()]).await.unwrap();

        assert_eq!(result.outcome, WalkOutcome::Completed);
        // wave 1 expands alice and G1, wave 2 expands bob
        assert_eq!(result.stats.waves, 2);
        assert_eq!(result.stats.users_expanded, 2);
        assert_eq!(result.stats.groups_expanded, 1);
        assert_eq!(sink.users().len(), 2);
        assert_eq!(sink.group_edges().len(), 2);

        let progress = coordinator.progress_handle().snapshot();
        assert_eq!(progress.phase, Phase::Done);
        assert_eq!(progress.user_frontier, 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let sink = Arc::new(MemorySink::new());
        let coordinator =
            WaveCoordinator::new(Arc::new(TinyTenant), sink.clone(), WalkOptions::default());
        coordinator.shutdown_flag().store(true, Ordering::SeqCst);

        let result = coordinator.run(&["alice".to_string()]).await.unwrap();
        assert!(!result.completed());
        assert_eq!(result.outcome, WalkOutcome::Interrupted);
    }
}

//! Reconciliation policies.
//!
//! Each policy plans first, using only reads, and the plan is then applied
//! as a separate step. Dry runs apply the same plan against a simulated
//! store, so planning is the single source of truth for what a pass evicts.
//!
//! Age and status policies only delete metadata. Artifact directories of
//! evicted builds become orphans and are picked up by [`OrphanPolicy`],
//! which runs last in a pass.

mod age;
mod nuclear;
mod orphan;
mod queue;
mod status;

pub use age::{AgePolicy, STUCK_RUNNING_AFTER_SECS};
pub use nuclear::NuclearPolicy;
pub use orphan::OrphanPolicy;
pub use queue::QueuePolicy;
pub use status::StatusPolicy;

use chrono::{DateTime, Utc};
use std::fmt;

use crate::artifacts::{ArtifactStore, Removal};
use crate::record::{BuildRecord, BuildState};
use crate::store::{MetadataStore, RecordFetch};
use crate::{rlog, rlog_debug, rlog_error, Result};

/// Read/delete handles shared by every policy in a pass.
pub struct Context<'a> {
    pub store: &'a dyn MetadataStore,
    pub artifacts: &'a dyn ArtifactStore,
    pub now: DateTime<Utc>,
    /// Only changes what gets logged; the handles decide whether deletes
    /// are real.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    Record(String),
    Directory(String),
    Queue,
}

impl Target {
    pub fn id(&self) -> Option<&str> {
        match self {
            Target::Record(id) | Target::Directory(id) => Some(id),
            Target::Queue => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Old { age_hours: f64 },
    Stuck { age_hours: f64 },
    Status(BuildState),
    Orphaned,
    QueueBacklog { len: usize },
    Nuclear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Eviction {
    pub target: Target,
    pub reason: Reason,
}

impl Eviction {
    pub fn new(target: Target, reason: Reason) -> Self {
        Self { target, reason }
    }

    /// Items this eviction accounts for in the pass total.
    fn weight(&self) -> usize {
        match self.reason {
            Reason::QueueBacklog { len } => len,
            _ => 1,
        }
    }
}

impl fmt::Display for Eviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.target, &self.reason) {
            (Target::Record(id), Reason::Old { age_hours }) => {
                write!(f, "Cleaning up old build: {} (age: {:.1} hours)", id, age_hours)
            }
            (Target::Record(id), Reason::Stuck { age_hours }) => write!(
                f,
                "Cleaning up stuck RUNNING build: {} (age: {:.1} hours)",
                id, age_hours
            ),
            (Target::Record(id), Reason::Status(state)) => {
                write!(f, "Cleaning up {} build: {}", state, id)
            }
            (Target::Record(id), _) => write!(f, "Deleting build record: {}", id),
            (Target::Directory(id), Reason::Orphaned) => {
                write!(f, "Removing orphaned artifact directory: {}", id)
            }
            (Target::Directory(id), _) => write!(f, "Removing artifact directory: {}", id),
            (Target::Queue, Reason::QueueBacklog { len }) => {
                write!(f, "Clearing build queue ({} items)", len)
            }
            (Target::Queue, _) => write!(f, "Clearing build queue"),
        }
    }
}

/// What a policy intends to evict, computed from reads only.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub evictions: Vec<Eviction>,
    /// Records that could not be judged, with the reason.
    pub skipped: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.evictions.is_empty()
    }
}

/// What applying a plan actually did.
#[derive(Debug, Clone, Default)]
pub struct PolicyOutcome {
    pub policy: &'static str,
    pub evicted: Vec<Eviction>,
    /// Planned targets that were gone by the time they were deleted.
    pub already_gone: usize,
    pub skipped: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
    pub warnings: Vec<String>,
    pub cleaned: usize,
}

impl PolicyOutcome {
    fn from_plan(policy: &'static str, plan: &Plan) -> Self {
        Self {
            policy,
            skipped: plan.skipped.clone(),
            warnings: plan.warnings.clone(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn evicted_ids(&self) -> Vec<&str> {
        self.evicted.iter().filter_map(|e| e.target.id()).collect()
    }
}

pub trait Policy {
    fn name(&self) -> &'static str;

    fn plan(&self, ctx: &Context<'_>) -> Result<Plan>;

    fn apply(&self, ctx: &Context<'_>, plan: &Plan) -> Result<PolicyOutcome> {
        apply_plan(self.name(), ctx, plan)
    }

    fn run(&self, ctx: &Context<'_>) -> Result<PolicyOutcome> {
        let plan = self.plan(ctx)?;
        rlog_debug!(
            "{} planned {} evictions, {} skipped",
            self.name(),
            plan.evictions.len(),
            plan.skipped.len()
        );
        self.apply(ctx, &plan)
    }
}

fn log_eviction(ctx: &Context<'_>, eviction: &Eviction) {
    if ctx.dry_run {
        rlog!("[dry run] {}", eviction);
    } else {
        rlog!("{}", eviction);
    }
}

/// Applies record deletes in one request, then directories and the queue
/// one by one. Store failures propagate; directory failures are recorded
/// and the rest of the plan still runs.
pub(crate) fn apply_plan(
    policy: &'static str,
    ctx: &Context<'_>,
    plan: &Plan,
) -> Result<PolicyOutcome> {
    let mut outcome = PolicyOutcome::from_plan(policy, plan);

    let records: Vec<String> = plan
        .evictions
        .iter()
        .filter_map(|e| match &e.target {
            Target::Record(id) => Some(id.clone()),
            _ => None,
        })
        .collect();
    if !records.is_empty() {
        let removed = ctx.store.delete_records(&records)?;
        outcome.cleaned += removed;
        outcome.already_gone += records.len().saturating_sub(removed);
    }

    for eviction in &plan.evictions {
        match &eviction.target {
            Target::Record(_) => {
                log_eviction(ctx, eviction);
                outcome.evicted.push(eviction.clone());
            }
            Target::Directory(id) => match ctx.artifacts.remove_directory(id) {
                Ok(Removal::Removed) => {
                    log_eviction(ctx, eviction);
                    outcome.cleaned += 1;
                    outcome.evicted.push(eviction.clone());
                }
                Ok(Removal::AlreadyGone) => outcome.already_gone += 1,
                Err(e) => {
                    rlog_error!("Failed to remove artifact directory {}: {}", id, e);
                    outcome.failed.push((id.clone(), e.to_string()));
                }
            },
            Target::Queue => {
                if ctx.store.clear_queue()? {
                    log_eviction(ctx, eviction);
                    outcome.cleaned += eviction.weight();
                    outcome.evicted.push(eviction.clone());
                } else {
                    outcome.already_gone += 1;
                }
            }
        }
    }

    Ok(outcome)
}

/// Fetches every record and asks `judge` whether to evict it. Vanished and
/// corrupt records never abort the scan.
pub(crate) fn scan_records<F>(ctx: &Context<'_>, mut judge: F) -> Result<Plan>
where
    F: FnMut(&str, &BuildRecord) -> Option<Reason>,
{
    let mut plan = Plan::default();
    for id in ctx.store.list_build_ids()? {
        match ctx.store.get_record(&id)? {
            RecordFetch::Found(record) => match judge(&id, &record) {
                Some(reason) => plan
                    .evictions
                    .push(Eviction::new(Target::Record(id), reason)),
                None => rlog_debug!("Keeping build {} ({})", id, record.state()),
            },
            RecordFetch::Missing => rlog_debug!("Build {} vanished before it was read", id),
            RecordFetch::Corrupt(reason) => plan.skipped.push((id, reason)),
        }
    }
    Ok(plan)
}

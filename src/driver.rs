//! Runs one cleanup pass: picks the policies, sequences them, and sums
//! what they did.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::artifacts::ArtifactStore;
use crate::policy::{
    AgePolicy, Context, NuclearPolicy, OrphanPolicy, Plan, Policy, PolicyOutcome, QueuePolicy,
    StatusPolicy, Target,
};
use crate::record::BuildState;
use crate::simulate::{SimulatedArtifacts, SimulatedStore};
use crate::store::MetadataStore;
use crate::{rlog, rlog_warn, Result};

pub const DEFAULT_MAX_AGE_HOURS: u32 = 24;

/// Which policies a pass runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOptions {
    pub max_age_hours: u32,
    /// `None` disables status eviction.
    pub clean_statuses: Option<BTreeSet<BuildState>>,
    pub clean_queue: bool,
    pub clean_orphans: bool,
    /// Runs alone; every other option except `dry_run` is ignored.
    pub nuclear: bool,
    pub dry_run: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            clean_statuses: None,
            clean_queue: false,
            clean_orphans: true,
            nuclear: false,
            dry_run: false,
        }
    }
}

impl PassOptions {
    /// Policies in the order they run. Orphans go last so directories of
    /// builds evicted earlier in the same pass are collected too.
    pub fn policies(&self) -> Vec<Box<dyn Policy>> {
        let mut policies: Vec<Box<dyn Policy>> =
            vec![Box::new(AgePolicy::new(self.max_age_hours))];
        if let Some(states) = &self.clean_statuses {
            policies.push(Box::new(StatusPolicy::new(states.iter().cloned())));
        }
        if self.clean_queue {
            policies.push(Box::new(QueuePolicy));
        }
        if self.clean_orphans {
            policies.push(Box::new(OrphanPolicy));
        }
        policies
    }
}

/// What the operator is asked to confirm before a nuclear pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NuclearSummary {
    pub records: usize,
    pub directories: usize,
}

impl NuclearSummary {
    fn from_plan(plan: &Plan) -> Self {
        let records = plan
            .evictions
            .iter()
            .filter(|e| matches!(e.target, Target::Record(_)))
            .count();
        Self {
            records,
            directories: plan.evictions.len() - records,
        }
    }
}

/// Source of the operator's answer to the nuclear prompt.
pub trait Confirm {
    /// The raw answer. End of input should be an empty answer, not an error.
    fn ask(&mut self, summary: &NuclearSummary) -> Result<String>;
}

impl<F> Confirm for F
where
    F: FnMut(&NuclearSummary) -> Result<String>,
{
    fn ask(&mut self, summary: &NuclearSummary) -> Result<String> {
        self(summary)
    }
}

/// Only the word "yes", in any case, confirms.
pub fn is_confirmed(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub dry_run: bool,
    /// The nuclear prompt was declined; nothing ran.
    pub cancelled: bool,
    pub outcomes: Vec<PolicyOutcome>,
}

impl PassReport {
    pub fn total(&self) -> usize {
        self.outcomes.iter().map(|o| o.cleaned).sum()
    }

    pub fn outcome(&self, policy: &str) -> Option<&PolicyOutcome> {
        self.outcomes.iter().find(|o| o.policy == policy)
    }

    /// Every target evicted in the pass, across policies.
    pub fn evicted_targets(&self) -> BTreeSet<Target> {
        self.outcomes
            .iter()
            .flat_map(|o| o.evicted.iter().map(|e| e.target.clone()))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PolicyOutcome::is_success)
    }
}

pub struct Driver<S, A> {
    store: S,
    artifacts: A,
    now: Option<DateTime<Utc>>,
}

impl<S: MetadataStore, A: ArtifactStore> Driver<S, A> {
    pub fn new(store: S, artifacts: A) -> Self {
        Self {
            store,
            artifacts,
            now: None,
        }
    }

    /// Pins the clock used for age checks.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn artifacts(&self) -> &A {
        &self.artifacts
    }

    pub fn run(&self, options: &PassOptions, confirm: &mut dyn Confirm) -> Result<PassReport> {
        let now = self.now.unwrap_or_else(Utc::now);
        rlog!(
            "Cleanup pass starting: max_age_hours={} statuses={:?} queue={} orphans={} nuclear={} dry_run={}",
            options.max_age_hours,
            options.clean_statuses,
            options.clean_queue,
            options.clean_orphans,
            options.nuclear,
            options.dry_run
        );

        let report = if options.dry_run {
            let store = SimulatedStore::new(&self.store);
            let artifacts = SimulatedArtifacts::new(&self.artifacts);
            let ctx = Context {
                store: &store,
                artifacts: &artifacts,
                now,
                dry_run: true,
            };
            run_policies(&ctx, options, confirm)?
        } else {
            let ctx = Context {
                store: &self.store,
                artifacts: &self.artifacts,
                now,
                dry_run: false,
            };
            run_policies(&ctx, options, confirm)?
        };

        rlog!(
            "Cleanup pass finished: total={} dry_run={} cancelled={}",
            report.total(),
            report.dry_run,
            report.cancelled
        );
        Ok(report)
    }
}

fn run_policies(
    ctx: &Context<'_>,
    options: &PassOptions,
    confirm: &mut dyn Confirm,
) -> Result<PassReport> {
    let mut report = PassReport {
        dry_run: ctx.dry_run,
        ..Default::default()
    };

    if options.nuclear {
        let policy = NuclearPolicy;
        let plan = policy.plan(ctx)?;
        // A dry run cannot delete anything, so there is nothing to confirm.
        if !ctx.dry_run {
            let answer = confirm.ask(&NuclearSummary::from_plan(&plan))?;
            if !is_confirmed(&answer) {
                rlog_warn!("Nuclear cleanup cancelled (answer {:?})", answer.trim());
                report.cancelled = true;
                return Ok(report);
            }
        }
        report.outcomes.push(policy.apply(ctx, &plan)?);
        return Ok(report);
    }

    for policy in options.policies() {
        report.outcomes.push(policy.run(ctx)?);
    }
    Ok(report)
}

use super::{
    apply_plan, log_eviction, Context, Eviction, Plan, Policy, PolicyOutcome, Reason, Target,
};
use crate::{rlog, rlog_warn, Result};

/// Deletes every record and every artifact directory.
///
/// Confirmation is the caller's job; this policy deletes unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NuclearPolicy;

impl Policy for NuclearPolicy {
    fn name(&self) -> &'static str {
        "nuclear"
    }

    fn plan(&self, ctx: &Context<'_>) -> Result<Plan> {
        let mut plan = Plan::default();
        for id in ctx.store.list_build_ids()? {
            plan.evictions
                .push(Eviction::new(Target::Record(id), Reason::Nuclear));
        }
        if ctx.artifacts.root_exists() {
            for id in ctx.artifacts.list_build_directories()? {
                plan.evictions
                    .push(Eviction::new(Target::Directory(id), Reason::Nuclear));
            }
        } else {
            plan.warnings.push(format!(
                "Artifacts directory {} does not exist",
                ctx.artifacts.root().display()
            ));
        }
        Ok(plan)
    }

    /// Records go in a single namespace-wide delete, which also catches
    /// builds created after the plan was made. Directories then go through
    /// the shared path.
    fn apply(&self, ctx: &Context<'_>, plan: &Plan) -> Result<PolicyOutcome> {
        let deleted = ctx.store.delete_all_records()?;
        if ctx.dry_run {
            rlog!("[dry run] Would delete ALL {} build entries", deleted);
        } else {
            rlog_warn!("Deleted ALL {} build entries", deleted);
        }

        let (records, directories): (Vec<Eviction>, Vec<Eviction>) = plan
            .evictions
            .iter()
            .cloned()
            .partition(|e| matches!(e.target, Target::Record(_)));

        for eviction in &records {
            log_eviction(ctx, eviction);
        }

        let mut outcome = apply_plan(
            self.name(),
            ctx,
            &Plan {
                evictions: directories,
                skipped: plan.skipped.clone(),
                warnings: plan.warnings.clone(),
            },
        )?;
        outcome.cleaned += deleted;
        outcome.already_gone += records.len().saturating_sub(deleted);
        let mut evicted = records;
        evicted.append(&mut outcome.evicted);
        outcome.evicted = evicted;
        Ok(outcome)
    }
}

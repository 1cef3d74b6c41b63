use super::{Context, Eviction, Plan, Policy, Reason, Target};
use crate::{rlog_debug, Result};

/// Removes artifact directories with no live build record.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrphanPolicy;

impl Policy for OrphanPolicy {
    fn name(&self) -> &'static str {
        "orphans"
    }

    fn plan(&self, ctx: &Context<'_>) -> Result<Plan> {
        let mut plan = Plan::default();
        if !ctx.artifacts.root_exists() {
            plan.warnings.push(format!(
                "Artifacts directory {} does not exist",
                ctx.artifacts.root().display()
            ));
            return Ok(plan);
        }

        let directories = ctx.artifacts.list_build_directories()?;
        let live = ctx.store.list_build_ids()?;
        rlog_debug!(
            "Orphan scan: {} directories, {} live records",
            directories.len(),
            live.len()
        );

        plan.evictions = directories
            .difference(&live)
            .map(|id| Eviction::new(Target::Directory(id.clone()), Reason::Orphaned))
            .collect();
        Ok(plan)
    }
}

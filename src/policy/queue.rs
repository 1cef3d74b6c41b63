use super::{Context, Eviction, Plan, Policy, Reason, Target};
use crate::{rlog_debug, Result};

/// Clears the pending queue wholesale when anything is left in it. Items
/// are never retried individually.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueuePolicy;

impl Policy for QueuePolicy {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn plan(&self, ctx: &Context<'_>) -> Result<Plan> {
        let mut plan = Plan::default();
        let len = ctx.store.queue_length()?;
        if len > 0 {
            plan.evictions
                .push(Eviction::new(Target::Queue, Reason::QueueBacklog { len }));
        } else {
            rlog_debug!("Build queue is empty");
        }
        Ok(plan)
    }
}

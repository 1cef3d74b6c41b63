use std::collections::BTreeSet;

use super::{scan_records, Context, Plan, Policy, Reason};
use crate::record::{BuildRecord, BuildState};
use crate::Result;

/// Evicts records whose state is in `states`, whatever their age.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    states: BTreeSet<BuildState>,
}

impl StatusPolicy {
    /// Unrecognized states are dropped from the set; they never match.
    pub fn new(states: impl IntoIterator<Item = BuildState>) -> Self {
        Self {
            states: states.into_iter().filter(BuildState::is_known).collect(),
        }
    }

    pub fn states(&self) -> &BTreeSet<BuildState> {
        &self.states
    }

    pub fn judge(&self, record: &BuildRecord) -> Option<Reason> {
        let state = record.state();
        (state.is_known() && self.states.contains(state)).then(|| Reason::Status(state.clone()))
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::new(BuildState::DEFAULT_CLEAN)
    }
}

impl Policy for StatusPolicy {
    fn name(&self) -> &'static str {
        "status"
    }

    fn plan(&self, ctx: &Context<'_>) -> Result<Plan> {
        scan_records(ctx, |_, record| self.judge(record))
    }
}

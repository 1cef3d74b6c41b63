use chrono::{DateTime, Duration, Utc};

use super::{scan_records, Context, Plan, Policy, Reason};
use crate::record::{hours, BuildRecord};
use crate::Result;

/// A RUNNING build older than this many seconds is presumed abandoned.
pub const STUCK_RUNNING_AFTER_SECS: i64 = 3600;

/// Evicts records older than `max_age`. RUNNING records use the fixed
/// [`STUCK_RUNNING_AFTER_SECS`] threshold instead.
#[derive(Debug, Clone)]
pub struct AgePolicy {
    pub max_age: Duration,
    pub stuck_after: Duration,
}

impl AgePolicy {
    pub fn new(max_age_hours: u32) -> Self {
        Self {
            max_age: Duration::hours(i64::from(max_age_hours)),
            stuck_after: Duration::seconds(STUCK_RUNNING_AFTER_SECS),
        }
    }

    /// Why `record` should go, if it should. Thresholds are strict: a
    /// record exactly at the limit stays, and so does one with no usable
    /// creation time.
    pub fn judge(&self, record: &BuildRecord, now: DateTime<Utc>) -> Option<Reason> {
        let age = record.age(now)?;
        let age_hours = hours(age);
        if record.is_running() {
            if age <= self.stuck_after {
                return None;
            }
            // Old enough for the general rule too; report it as old.
            if age > self.max_age {
                return Some(Reason::Old { age_hours });
            }
            return Some(Reason::Stuck { age_hours });
        }
        (age > self.max_age).then_some(Reason::Old { age_hours })
    }
}

impl Policy for AgePolicy {
    fn name(&self) -> &'static str {
        "age"
    }

    fn plan(&self, ctx: &Context<'_>) -> Result<Plan> {
        scan_records(ctx, |_, record| self.judge(record, ctx.now))
    }
}

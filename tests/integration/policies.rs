//! Each eviction rule on a real (non-simulated) pass.

use std::collections::BTreeSet;

use chrono::Duration;

use buildreap::policy::{Reason, Target};
use buildreap::{BuildState, MetadataStore, PassOptions};

use crate::fixtures::{never_asked, populate, set, Fixture};

fn records_only() -> PassOptions {
    PassOptions {
        clean_orphans: false,
        ..Default::default()
    }
}

fn with_failed(options: PassOptions) -> PassOptions {
    PassOptions {
        clean_statuses: Some(BuildState::DEFAULT_CLEAN.into_iter().collect()),
        ..options
    }
}

fn evicted_records(report: &buildreap::PassReport) -> BTreeSet<String> {
    report
        .evicted_targets()
        .into_iter()
        .filter_map(|t| match t {
            Target::Record(id) => Some(id),
            _ => None,
        })
        .collect()
}

/// Given A (30h SUCCESS), B (30min RUNNING), C (10h FAILURE) and a 24h limit
/// When a default pass runs, then with --clean-failed
/// Then only A goes, then C as well, and B survives both
#[test]
fn test_scenario_age_then_failed() {
    let fixture = Fixture::new();
    fixture
        .record("A", Duration::hours(30), BuildState::Success)
        .record("B", Duration::minutes(30), BuildState::Running)
        .record("C", Duration::hours(10), BuildState::Failure);

    let report = fixture.driver().run(&records_only(), &mut never_asked).unwrap();
    assert_eq!(evicted_records(&report), set(&["A"]));
    assert_eq!(report.total(), 1);
    assert_eq!(fixture.record_ids(), set(&["B", "C"]));

    let report = fixture
        .driver()
        .run(&with_failed(records_only()), &mut never_asked)
        .unwrap();
    assert_eq!(evicted_records(&report), set(&["C"]));
    assert_eq!(fixture.record_ids(), set(&["B"]));
}

/// Both passes at once see the same result: A and C go, B stays.
#[test]
fn test_scenario_single_pass_with_failed() {
    let fixture = Fixture::new();
    fixture
        .record("A", Duration::hours(30), BuildState::Success)
        .record("B", Duration::minutes(30), BuildState::Running)
        .record("C", Duration::hours(10), BuildState::Failure);

    let report = fixture
        .driver()
        .run(&with_failed(records_only()), &mut never_asked)
        .unwrap();
    assert_eq!(evicted_records(&report), set(&["A", "C"]));
    assert_eq!(report.total(), 2);
    assert_eq!(fixture.record_ids(), set(&["B"]));
}

#[test]
fn test_running_past_an_hour_is_evicted_as_stuck() {
    let fixture = Fixture::new();
    fixture.record("B", Duration::hours(2), BuildState::Running);

    let report = fixture.driver().run(&records_only(), &mut never_asked).unwrap();
    let age = report.outcome("age").unwrap();
    assert_eq!(age.evicted.len(), 1);
    assert!(matches!(age.evicted[0].reason, Reason::Stuck { .. }));
    assert_eq!(
        age.evicted[0].to_string(),
        "Cleaning up stuck RUNNING build: B (age: 2.0 hours)"
    );
    assert!(fixture.record_ids().is_empty());
}

#[test]
fn test_status_eviction_is_idempotent() {
    let fixture = Fixture::new();
    fixture
        .record("f1", Duration::minutes(5), BuildState::Failure)
        .record("e1", Duration::minutes(5), BuildState::Error)
        .record("ok", Duration::minutes(5), BuildState::Success)
        .record("odd", Duration::minutes(5), BuildState::Other("CANCELLED".into()));
    let options = with_failed(records_only());

    let first = fixture.driver().run(&options, &mut never_asked).unwrap();
    assert_eq!(first.outcome("status").unwrap().cleaned, 2);
    assert_eq!(fixture.record_ids(), set(&["odd", "ok"]));

    let second = fixture.driver().run(&options, &mut never_asked).unwrap();
    assert_eq!(second.total(), 0);
}

#[test]
fn test_corrupt_record_is_skipped_not_fatal() {
    let fixture = Fixture::new();
    fixture
        .corrupt("broken")
        .record("old", Duration::hours(48), BuildState::Success);

    let report = fixture.driver().run(&records_only(), &mut never_asked).unwrap();
    let age = report.outcome("age").unwrap();
    assert_eq!(age.cleaned, 1);
    assert_eq!(age.skipped.len(), 1);
    assert_eq!(age.skipped[0].0, "broken");
    assert!(fixture.store.contains("broken"));
}

#[test]
fn test_out_of_range_timestamp_is_skipped_not_fatal() {
    let fixture = Fixture::new();
    fixture.store.put_raw(
        "ancient",
        br#"{"time_created": -1e300, "progress": {"state": "SUCCESS"}}"#.to_vec(),
    );
    fixture.record("old", Duration::hours(48), BuildState::Success);

    let report = fixture.driver().run(&records_only(), &mut never_asked).unwrap();
    let age = report.outcome("age").unwrap();
    assert_eq!(age.evicted_ids(), vec!["old"]);
    assert_eq!(age.skipped.len(), 1);
    assert_eq!(age.skipped[0].0, "ancient");
    assert_eq!(fixture.record_ids(), set(&["ancient"]));
}

/// Given directories A, D and live records A, C
/// When the orphan pass runs
/// Then D is removed, A is kept, and C is not touched
#[test]
fn test_scenario_orphans() {
    let fixture = Fixture::new();
    fixture
        .record("A", Duration::minutes(10), BuildState::Success)
        .record("C", Duration::minutes(10), BuildState::Success)
        .dir("A")
        .dir("D");

    let report = fixture
        .driver()
        .run(&PassOptions::default(), &mut never_asked)
        .unwrap();
    let orphans = report.outcome("orphans").unwrap();
    assert_eq!(orphans.evicted_ids(), vec!["D"]);
    assert_eq!(orphans.cleaned, 1);
    assert_eq!(fixture.dir_ids(), set(&["A"]));
    assert_eq!(fixture.record_ids(), set(&["A", "C"]));

    let again = fixture
        .driver()
        .run(&PassOptions::default(), &mut never_asked)
        .unwrap();
    assert_eq!(again.total(), 0);
}

#[test]
fn test_missing_artifacts_root_is_a_warning() {
    let fixture = Fixture::without_root();
    fixture.record("A", Duration::minutes(10), BuildState::Success);

    let report = fixture
        .driver()
        .run(&PassOptions::default(), &mut never_asked)
        .unwrap();
    let orphans = report.outcome("orphans").unwrap();
    assert_eq!(orphans.cleaned, 0);
    assert_eq!(orphans.warnings.len(), 1);
    assert!(orphans.warnings[0].contains("does not exist"));
}

#[test]
fn test_evicted_build_directory_collected_same_pass() {
    let fixture = Fixture::new();
    fixture
        .record("old", Duration::hours(30), BuildState::Success)
        .dir("old");

    let report = fixture
        .driver()
        .run(&PassOptions::default(), &mut never_asked)
        .unwrap();
    assert_eq!(report.total(), 2);
    assert!(fixture.dir_ids().is_empty());
    assert!(fixture.record_ids().is_empty());
}

/// Given a queue with 5 items and --clean-queue
/// Then the queue is emptied and the pass reports 5
#[test]
fn test_scenario_queue() {
    let fixture = Fixture::new();
    fixture.queue(5);
    let options = PassOptions {
        clean_queue: true,
        ..records_only()
    };

    let report = fixture.driver().run(&options, &mut never_asked).unwrap();
    assert_eq!(report.outcome("queue").unwrap().cleaned, 5);
    assert_eq!(report.total(), 5);
    assert_eq!(fixture.store.queue_length().unwrap(), 0);
}

#[test]
fn test_empty_queue_reports_nothing() {
    let fixture = Fixture::new();
    let options = PassOptions {
        clean_queue: true,
        ..records_only()
    };
    let report = fixture.driver().run(&options, &mut never_asked).unwrap();
    assert!(report.outcome("queue").unwrap().evicted.is_empty());
    assert_eq!(report.total(), 0);
}

#[test]
fn test_full_pass_on_reference_state() {
    let fixture = Fixture::new();
    populate(&fixture);
    let options = PassOptions {
        clean_queue: true,
        ..with_failed(PassOptions::default())
    };

    let report = fixture.driver().run(&options, &mut never_asked).unwrap();

    assert_eq!(fixture.record_ids(), set(&["broken", "fresh"]));
    assert_eq!(fixture.dir_ids(), set(&["fresh"]));
    assert_eq!(fixture.store.queue_length().unwrap(), 0);
    // old, stuck, failed records + 3 queued + old, stuck, ghost directories
    assert_eq!(report.total(), 9);
    assert!(report.is_success());
}

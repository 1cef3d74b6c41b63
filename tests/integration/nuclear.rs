//! Nuclear eviction only runs on an explicit "yes".

use buildreap::driver::NuclearSummary;
use buildreap::{MetadataStore, PassOptions, Result};

use crate::fixtures::{populate, Fixture};

fn nuclear() -> PassOptions {
    PassOptions {
        nuclear: true,
        // Ignored when nuclear is selected.
        clean_queue: true,
        ..Default::default()
    }
}

fn answering(answer: &'static str) -> impl FnMut(&NuclearSummary) -> Result<String> {
    move |_: &NuclearSummary| Ok(answer.to_string())
}

#[test]
fn test_confirmed_wipes_everything() {
    for answer in ["yes", "YES\n", "Yes"] {
        let fixture = Fixture::new();
        populate(&fixture);

        let report = fixture
            .driver()
            .run(&nuclear(), &mut answering(answer))
            .unwrap();

        assert!(!report.cancelled, "answer {:?} should confirm", answer);
        assert!(fixture.record_ids().is_empty());
        assert!(fixture.dir_ids().is_empty());
        assert_eq!(report.total(), 9);
        // Only the nuclear policy runs; the queue is not its concern.
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(fixture.store.queue_length().unwrap(), 3);
    }
}

#[test]
fn test_anything_else_changes_nothing() {
    for answer in ["no", "", "y", "yes please", "oui"] {
        let fixture = Fixture::new();
        populate(&fixture);
        let records_before = fixture.record_ids();
        let dirs_before = fixture.dir_ids();

        let report = fixture
            .driver()
            .run(&nuclear(), &mut answering(answer))
            .unwrap();

        assert!(report.cancelled, "answer {:?} should cancel", answer);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.total(), 0);
        assert_eq!(fixture.record_ids(), records_before);
        assert_eq!(fixture.dir_ids(), dirs_before);
        assert_eq!(fixture.store.queue_length().unwrap(), 3);
    }
}

#[test]
fn test_prompt_sees_what_will_be_deleted() {
    let fixture = Fixture::new();
    populate(&fixture);

    let mut seen = None;
    let mut confirm = |summary: &NuclearSummary| -> Result<String> {
        seen = Some(*summary);
        Ok("no".to_string())
    };
    fixture.driver().run(&nuclear(), &mut confirm).unwrap();

    assert_eq!(
        seen,
        Some(NuclearSummary {
            records: 5,
            directories: 4
        })
    );
}

//! Storage invariants: idempotent ingestion, the unprocessed delta,
//! per-user scoping, and category id assignment.

mod common;

use common::{RawEmailBuilder, TestHarness};
use mailsort::db::email_repo::{self, ProcessedEmailRow};

#[test]
fn test_ingesting_same_batch_twice_stores_once() {
    let harness = TestHarness::new();
    let batch = vec![
        RawEmailBuilder::new("u1", "m1")
            .received_at("2025-01-01T10:00:00+00:00")
            .build(),
        RawEmailBuilder::new("u1", "m2").build(),
    ];

    harness.ingest(&batch);
    harness.ingest(&batch);

    assert_eq!(email_repo::count_raw(&harness.db, "u1").unwrap(), 2);
}

#[test]
fn test_reingesting_updates_fields_in_place() {
    let harness = TestHarness::new();
    harness.ingest(&[RawEmailBuilder::new("u1", "m1")
        .subject("Old subject")
        .build()]);
    harness.ingest(&[RawEmailBuilder::new("u1", "m1")
        .subject("New subject")
        .body("Refetched body")
        .build()]);

    let detail = email_repo::get_by_id(&harness.db, "u1", "m1")
        .unwrap()
        .unwrap();
    assert_eq!(detail.raw.subject, "New subject");
    assert_eq!(detail.raw.body, "Refetched body");
    assert_eq!(email_repo::count_raw(&harness.db, "u1").unwrap(), 1);
}

#[test]
fn test_unprocessed_delta_excludes_classified_messages() {
    let harness = TestHarness::new();
    let category = harness.create_category("u1", "Work");
    harness.ingest(&[
        RawEmailBuilder::new("u1", "m1").build(),
        RawEmailBuilder::new("u1", "m2").build(),
        RawEmailBuilder::new("u1", "m3").build(),
    ]);
    harness.classify("u1", "m2", category);

    let backlog = email_repo::get_unprocessed(&harness.db, "u1").unwrap();
    let ids: Vec<&str> = backlog.iter().map(|r| r.email_id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m3"]);
}

#[test]
fn test_same_email_id_under_other_account_stays_unprocessed() {
    let harness = TestHarness::new();
    let category = harness.create_category("u1", "Work");
    harness.ingest(&[
        RawEmailBuilder::new("u1", "m1").build(),
        RawEmailBuilder::new("u1", "m1").google_sub("sub-b").build(),
    ]);
    // Classification stored under the default account only.
    harness.classify("u1", "m1", category);

    let backlog = email_repo::get_unprocessed(&harness.db, "u1").unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].google_sub, "sub-b");
}

#[test]
fn test_per_user_rows_stay_scoped() {
    let harness = TestHarness::new();
    harness.ingest(&[RawEmailBuilder::new("u1", "m1").subject("For u1").build()]);
    harness.ingest(&[RawEmailBuilder::new("u2", "m1").subject("For u2").build()]);

    let u2_view = email_repo::get_by_id(&harness.db, "u2", "m1")
        .unwrap()
        .unwrap();
    assert_eq!(u2_view.raw.subject, "For u2");

    let deleted = email_repo::delete_raw(&harness.db, "u1", &["m1".to_string()]).unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(email_repo::count_raw(&harness.db, "u1").unwrap(), 0);
    assert_eq!(email_repo::count_raw(&harness.db, "u2").unwrap(), 1);
}

#[test]
fn test_category_ids_assigned_max_plus_one_over_gaps() {
    let harness = TestHarness::new();
    assert_eq!(harness.create_category("u1", "Work"), 1);
    assert_eq!(harness.create_category("u1", "Personal"), 2);

    // A deleted middle category leaves a gap; seed a high id directly.
    harness
        .db
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories (user_id, category_id, name) VALUES ('u1', 4, 'Travel')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    assert_eq!(harness.create_category("u1", "News"), 5);
}

#[test]
fn test_category_ids_are_per_user() {
    let harness = TestHarness::new();
    assert_eq!(harness.create_category("u1", "Work"), 1);
    assert_eq!(harness.create_category("u2", "Work"), 1);
    assert_eq!(harness.create_category("u1", "Personal"), 2);
}

#[test]
fn test_list_processed_orders_newest_first() {
    let harness = TestHarness::new();
    let category = harness.create_category("u1", "Work");

    for (id, received_at) in [
        ("older", Some("2025-01-01T10:00:00+00:00")),
        ("newer", Some("2025-02-01T10:00:00+00:00")),
        ("undated", None),
    ] {
        email_repo::upsert_processed(
            &harness.db,
            &ProcessedEmailRow {
                user_id: "u1".to_string(),
                email_id: id.to_string(),
                thread_id: format!("thread-{}", id),
                subject: format!("Subject {}", id),
                summary: "A summary".to_string(),
                category_id: category,
                unsubscribed: false,
                received_at: received_at.map(|s| s.to_string()),
                archived: false,
                google_sub: "sub-a".to_string(),
            },
        )
        .unwrap();
    }

    let listed = email_repo::list_processed(&harness.db, "u1").unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.email_id.as_str()).collect();
    assert_eq!(ids, vec!["newer", "older", "undated"]);
}

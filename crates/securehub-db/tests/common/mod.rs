// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and Postgres backends.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use securehub_core::attachment::{AttachmentParent, AttachmentState, NewAttachment};
use securehub_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_attachment(parent: &AttachmentParent, name: &str, created_at: DateTime<Utc>) -> NewAttachment {
    NewAttachment {
        parent: parent.clone(),
        file_name: name.to_string(),
        content_type: "application/pdf".to_string(),
        file_size: 1024,
        object_key: format!("pending/{}", uuid::Uuid::new_v4()),
        uploaded_by: "alice".to_string(),
        created_at,
    }
}

fn base_time() -> DateTime<Utc> {
    // Whole seconds keep the comparison identical across backends.
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// Create, fetch, re-key, and delete a single record.
pub async fn test_attachment_crud(db: &dyn Database) {
    let parent = AttachmentParent::request("req-1");
    let created = db
        .create_attachment(&make_attachment(&parent, "report.pdf", base_time()))
        .await
        .unwrap();
    assert!(!created.id.is_empty());
    assert_eq!(created.parent, parent);
    assert_eq!(created.state, AttachmentState::Pending);
    assert_eq!(created.file_size, 1024);
    assert_eq!(created.created_at, base_time());
    assert_eq!(created.updated_at, base_time());

    let fetched = db.get_attachment(&created.id).await.unwrap();
    assert_eq!(fetched, created);

    let later = base_time() + Duration::seconds(5);
    let final_key = format!("requests/req-1/attachments/{}/report.pdf", created.id);
    let rekeyed = db.set_object_key(&created.id, &final_key, later).await.unwrap();
    assert_eq!(rekeyed.object_key, final_key);
    assert_eq!(rekeyed.updated_at, later);
    assert_eq!(rekeyed.created_at, base_time());

    let deleted = db.delete_attachment(&created.id).await.unwrap();
    assert_eq!(deleted.id, created.id);
    assert!(matches!(
        db.get_attachment(&created.id).await,
        Err(DbError::NotFound(_))
    ));
    assert!(matches!(
        db.delete_attachment(&created.id).await,
        Err(DbError::NotFound(_))
    ));
}

/// Updating a missing record reports NotFound.
pub async fn test_set_object_key_missing(db: &dyn Database) {
    let err = db
        .set_object_key("does-not-exist", "k", base_time())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

/// Object keys are unique across all records.
pub async fn test_object_key_unique(db: &dyn Database) {
    let parent = AttachmentParent::request("req-uniq");
    let mut first = make_attachment(&parent, "a.txt", base_time());
    first.object_key = "requests/req-uniq/attachments/x/a.txt".into();
    db.create_attachment(&first).await.unwrap();

    let mut second = make_attachment(&parent, "b.txt", base_time());
    second.object_key = first.object_key.clone();
    assert!(db.create_attachment(&second).await.is_err());
}

// ---------------------------------------------------------------------------
// Parent scoping
// ---------------------------------------------------------------------------

/// Request listings exclude comment-owned rows; the request-wide listing includes them.
pub async fn test_parent_scoping(db: &dyn Database) {
    let request = AttachmentParent::request("req-2");
    let comment = AttachmentParent::comment("req-2", "com-7");
    let other = AttachmentParent::request("req-3");

    let t = base_time();
    let r1 = db
        .create_attachment(&make_attachment(&request, "one.png", t))
        .await
        .unwrap();
    let c1 = db
        .create_attachment(&make_attachment(&comment, "two.png", t + Duration::seconds(1)))
        .await
        .unwrap();
    let r2 = db
        .create_attachment(&make_attachment(&request, "three.png", t + Duration::seconds(2)))
        .await
        .unwrap();
    db.create_attachment(&make_attachment(&other, "four.png", t))
        .await
        .unwrap();

    let on_request = db.list_attachments(&request).await.unwrap();
    let ids: Vec<_> = on_request.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![r1.id.as_str(), r2.id.as_str()]);

    let on_comment = db.list_attachments(&comment).await.unwrap();
    assert_eq!(on_comment.len(), 1);
    assert_eq!(on_comment[0].id, c1.id);
    assert_eq!(on_comment[0].parent, comment);

    let whole_request = db.list_attachments_for_request("req-2").await.unwrap();
    let ids: Vec<_> = whole_request.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![r1.id.as_str(), c1.id.as_str(), r2.id.as_str()]);

    assert!(db
        .list_attachments(&AttachmentParent::request("nobody"))
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Pending moves to a terminal state exactly once.
pub async fn test_state_transitions(db: &dyn Database) {
    let parent = AttachmentParent::request("req-4");
    let a = db
        .create_attachment(&make_attachment(&parent, "a.pdf", base_time()))
        .await
        .unwrap();

    let later = base_time() + Duration::minutes(1);
    let active = db
        .transition_attachment_state(&a.id, AttachmentState::Pending, AttachmentState::Active, later)
        .await
        .unwrap();
    assert_eq!(active.state, AttachmentState::Active);
    assert_eq!(active.updated_at, later);

    // Stale expectation: the row is no longer pending.
    let err = db
        .transition_attachment_state(&a.id, AttachmentState::Pending, AttachmentState::Failed, later)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));
    assert_eq!(
        db.get_attachment(&a.id).await.unwrap().state,
        AttachmentState::Active
    );

    // Illegal transitions are rejected before touching the row.
    let err = db
        .transition_attachment_state(&a.id, AttachmentState::Active, AttachmentState::Pending, later)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    let err = db
        .transition_attachment_state("missing", AttachmentState::Pending, AttachmentState::Active, later)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

/// Counting by state honours the parent scope and the state filter.
pub async fn test_count_in_states(db: &dyn Database) {
    let request = AttachmentParent::request("req-5");
    let comment = AttachmentParent::comment("req-5", "com-1");
    let t = base_time();

    let pending = db
        .create_attachment(&make_attachment(&request, "p.txt", t))
        .await
        .unwrap();
    let active = db
        .create_attachment(&make_attachment(&request, "a.txt", t))
        .await
        .unwrap();
    let failed = db
        .create_attachment(&make_attachment(&request, "f.txt", t))
        .await
        .unwrap();
    db.create_attachment(&make_attachment(&comment, "c.txt", t))
        .await
        .unwrap();

    db.transition_attachment_state(&active.id, AttachmentState::Pending, AttachmentState::Active, t)
        .await
        .unwrap();
    db.transition_attachment_state(&failed.id, AttachmentState::Pending, AttachmentState::Failed, t)
        .await
        .unwrap();

    let counted = db
        .count_attachments_in_states(&request, AttachmentState::QUOTA_STATES)
        .await
        .unwrap();
    assert_eq!(counted, 2);

    let only_failed = db
        .count_attachments_in_states(&request, &[AttachmentState::Failed])
        .await
        .unwrap();
    assert_eq!(only_failed, 1);

    let on_comment = db
        .count_attachments_in_states(&comment, AttachmentState::QUOTA_STATES)
        .await
        .unwrap();
    assert_eq!(on_comment, 1);

    assert_eq!(db.get_attachment(&pending.id).await.unwrap().state, AttachmentState::Pending);
}

/// Stale lookup is strict on the cutoff and filters by state.
pub async fn test_find_stale(db: &dyn Database) {
    let parent = AttachmentParent::request("req-6");
    let cutoff = base_time();

    let old = db
        .create_attachment(&make_attachment(&parent, "old.txt", cutoff - Duration::seconds(1)))
        .await
        .unwrap();
    db.create_attachment(&make_attachment(&parent, "edge.txt", cutoff))
        .await
        .unwrap();
    db.create_attachment(&make_attachment(&parent, "young.txt", cutoff + Duration::seconds(1)))
        .await
        .unwrap();
    let old_active = db
        .create_attachment(&make_attachment(&parent, "kept.txt", cutoff - Duration::hours(1)))
        .await
        .unwrap();
    db.transition_attachment_state(
        &old_active.id,
        AttachmentState::Pending,
        AttachmentState::Active,
        cutoff,
    )
    .await
    .unwrap();

    let stale = db
        .find_attachments_in_state_before(AttachmentState::Pending, cutoff)
        .await
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, old.id);
}

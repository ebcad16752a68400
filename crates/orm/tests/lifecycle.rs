mod common;

use anyhow::Result;
use oxygen_orm::{FieldSet, Model, ModelError, Session, SessionConfig};
use serde_json::{json, Value};

use common::{create_posts, create_users, session, Post, User};

struct Ghost;

struct Event;

impl Model for Event {
    const NAME: &'static str = "Event";

    fn fields(fields: &mut FieldSet) {
        fields.datetime("at");
        fields.boolean("public");
    }
}

impl Model for Ghost {
    const NAME: &'static str = "Ghost";
}

#[test]
fn test_create_find_and_update() -> Result<()> {
    let session = session()?;
    let user = User::create(&session, [("username", "t1")])?;
    assert!(!user.is_new());
    assert_eq!(user.primary_key(), Some(json!(1)));

    let found = User::find_or_fail(&session, 1)?;
    assert_eq!(found.get("username"), Some(json!("t1")));

    found.set("username", "renamed")?;
    assert!(found.is_dirty());
    assert_eq!(found.changes().len(), 1);
    found.save()?;
    assert!(!found.is_dirty());
    assert_eq!(
        User::find_or_fail(&session, 1)?.get("username"),
        Some(json!("renamed"))
    );
    Ok(())
}

#[test]
fn test_refresh_discards_local_changes() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    let user = User::find_or_fail(&session, 1)?;
    user.set("username", "local")?;
    user.refresh()?;
    assert_eq!(user.get("username"), Some(json!("t1")));
    assert!(!user.is_dirty());
    Ok(())
}

#[test]
fn test_field_validation() -> Result<()> {
    let session = session()?;
    let post = Post::new(&session)?;
    assert!(matches!(post.set("author_id", "abc"), Err(ModelError::Validation(_))));
    assert!(matches!(post.set("title", "x"), Err(ModelError::Validation(_))));
    post.set("author_id", Value::Null)?;
    post.set("text", "ok")?;
    post.save()?;
    assert_eq!(post.get("author_id"), Some(Value::Null));
    Ok(())
}

#[test]
fn test_delete_destroy_and_truncate() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2", "t3", "t4"])?;

    let user = User::find_or_fail(&session, 1)?;
    user.delete()?;
    assert!(user.is_deleted());
    assert!(User::find(&session, 1)?.is_none());
    assert!(matches!(user.save(), Err(ModelError::Query(_))));

    assert_eq!(User::destroy(&session, [2, 3])?, 2);
    assert_eq!(User::query(&session).count()?, 1);

    assert_eq!(User::truncate(&session)?, 1);
    assert_eq!(User::query(&session).count()?, 0);

    let unsaved = User::new(&session)?;
    assert!(matches!(unsaved.delete(), Err(ModelError::UnsavedModel(_))));
    Ok(())
}

#[test]
fn test_failed_save_keeps_queue_and_rolls_back() -> Result<()> {
    let session = session()?;
    create_posts(&session, &[("a", None)])?;

    let user = User::new(&session)?;
    user.set("username", "t1")?;
    let post = Post::find_or_fail(&session, 1)?;
    user.rel("posts")?.add(&post)?;

    session.execute("ALTER TABLE posts RENAME TO archived_posts", &[])?;
    let err = user.save().unwrap_err();
    assert!(matches!(err, ModelError::Database(_)));
    assert!(user.is_new());
    assert_eq!(user.pending_commands().len(), 1);
    assert_eq!(User::query(&session).count()?, 0);

    session.execute("ALTER TABLE archived_posts RENAME TO posts", &[])?;
    user.save()?;
    assert!(!user.is_new());
    assert!(user.pending_commands().is_empty());
    assert_eq!(Post::find_or_fail(&session, 1)?.get("author_id"), user.primary_key());
    Ok(())
}

#[test]
fn test_transaction_rolls_back_on_error() -> Result<()> {
    let session = session()?;
    let result: Result<(), ModelError> = session.transaction(|| {
        User::create(&session, [("username", "t1")])?;
        assert!(session.in_transaction());
        Err(ModelError::Validation("abort".to_string()))
    });
    assert!(result.is_err());
    assert!(!session.in_transaction());
    assert_eq!(User::query(&session).count()?, 0);

    session.transaction(|| User::create(&session, [("username", "t2")]).map(|_| ()))?;
    assert_eq!(User::query(&session).count()?, 1);
    Ok(())
}

#[test]
fn test_missing_table_is_a_schema_error() -> Result<()> {
    let session = session()?;
    assert!(matches!(Ghost::query(&session).get_sql(), Err(ModelError::Schema(_))));
    assert!(matches!(Ghost::all(&session), Err(ModelError::Schema(_))));
    assert!(matches!(Ghost::new(&session), Err(ModelError::Schema(_))));
    Ok(())
}

#[test]
fn test_file_backed_session_persists() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = SessionConfig::file(dir.path().join("blog.db"));

    {
        let session = Session::open(&config)?;
        session.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT)", &[])?;
        User::create(&session, [("username", "stored")])?;
    }

    let session = Session::open(&config)?;
    let user = User::find_or_fail(&session, 1)?;
    assert_eq!(user.get("username"), Some(json!("stored")));
    Ok(())
}

fn event_session() -> Result<Session> {
    let session = session()?;
    session.execute(
        "CREATE TABLE events (id INTEGER PRIMARY KEY, at DATETIME, public BOOLEAN)",
        &[],
    )?;
    Ok(session)
}

#[test]
fn test_filters_compare_against_stored_form() -> Result<()> {
    let session = event_session()?;
    let event = Event::create(&session, [("at", json!("2024-03-01T10:20:30")), ("public", json!(true))])?;
    Event::create(&session, [("at", json!("2024-02-01T08:00:00")), ("public", json!(false))])?;

    let at = event.get("at").expect("a timestamp");
    assert_eq!(at, json!("2024-03-01T10:20:30"));
    assert_eq!(Event::query(&session).where_eq("at", at.clone()).count()?, 1);
    assert_eq!(Event::query(&session).where_gt("at", "2024-03-01T00:00:00").count()?, 1);
    assert_eq!(
        Event::query(&session)
            .where_in("at", [at.clone(), json!("2024-02-01T08:00:00")])
            .count()?,
        2
    );
    assert_eq!(Event::query(&session).where_eq("public", true).count()?, 1);

    let updated = Event::query(&session)
        .where_eq("at", at)
        .update([("public", json!(false))])?;
    assert_eq!(updated, 1);
    assert_eq!(Event::query(&session).where_eq("public", false).count()?, 2);
    Ok(())
}

#[test]
fn test_invalid_filter_value_is_reported() -> Result<()> {
    let session = event_session()?;
    let err = Event::query(&session).where_eq("at", "yesterday").count().unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    Ok(())
}

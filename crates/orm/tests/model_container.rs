mod common;

use std::rc::Rc;

use anyhow::Result;
use oxygen_orm::{Model, ModelError};
use serde_json::{json, Value};

use common::{create_users, recorded_session, session, User};

#[test]
fn test_pretty_listing() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2"])?;

    let users = User::all(&session)?;
    let expected = "User:\n\t1:\n\t\tid: 1\n\t\tusername: t1\n\t2:\n\t\tid: 2\n\t\tusername: t2\n";
    assert_eq!(users.pretty()?, expected);
    assert_eq!(users.to_string(), expected);
    Ok(())
}

#[test]
fn test_json_rendering() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2"])?;

    let users = User::query(&session).get()?;
    assert_eq!(
        users.to_json()?,
        r#"[{"id":1,"username":"t1"},{"id":2,"username":"t2"}]"#
    );
    let parsed: Value = serde_json::from_str(&users.to_json()?)?;
    assert_eq!(parsed[1]["username"], json!("t2"));
    Ok(())
}

#[test]
fn test_query_runs_on_first_access() -> Result<()> {
    let (session, log) = recorded_session()?;
    create_users(&session, &["t1", "t2", "t3"])?;
    log.clear();

    let users = User::query(&session).get()?;
    assert!(log.reads().is_empty());
    assert_eq!(users.materialized_len(), 0);

    let first = users.get(0)?;
    assert_eq!(log.reads().len(), 1);
    assert_eq!(users.materialized_len(), 1);
    assert!(!users.is_exhausted());

    assert!(Rc::ptr_eq(&first, &users.get(0)?));
    assert_eq!(users.len()?, 3);
    assert!(users.is_exhausted());
    assert_eq!(log.reads().len(), 1);
    Ok(())
}

#[test]
fn test_repeated_iteration_yields_same_records() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2"])?;

    let users = User::query(&session).get()?;
    let first_pass = users.iter().collect::<Result<Vec<_>, ModelError>>()?;
    let second_pass = users.iter().collect::<Result<Vec<_>, ModelError>>()?;
    assert_eq!(first_pass.len(), 2);
    for (a, b) in first_pass.iter().zip(&second_pass) {
        assert!(Rc::ptr_eq(a, b));
    }
    Ok(())
}

#[test]
fn test_indexing_slicing_and_removal() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2", "t3", "t4"])?;

    let users = User::query(&session).order_by("id").get()?;
    assert_eq!(users.at(-1)?.get("username"), Some(json!("t4")));
    assert_eq!(
        users.get(10).unwrap_err(),
        ModelError::IndexOutOfRange { index: 10, len: 4 }
    );
    assert!(matches!(users.at(-5), Err(ModelError::IndexOutOfRange { .. })));

    let middle = users.slice(1..3)?;
    let names: Vec<Value> = middle.pluck("username").collect::<Result<_, _>>()?;
    assert_eq!(names, vec![json!("t2"), json!("t3")]);
    assert!(Rc::ptr_eq(&middle.get(0)?, &users.get(1)?));
    assert_eq!(users.slice(3..)?.len()?, 1);
    assert!(users.slice(8..)?.is_empty()?);

    let removed = users.remove(0)?;
    assert_eq!(removed.get("username"), Some(json!("t1")));
    assert_eq!(users.len()?, 3);
    assert_eq!(User::query(&session).count()?, 4);
    Ok(())
}

#[test]
fn test_find_filter_and_pluck() -> Result<()> {
    let session = session()?;
    create_users(&session, &["ann", "bob", "amy"])?;

    let users = User::query(&session).get()?;
    let bob = users.find(|user| user.get("username") == Some(json!("bob")))?;
    assert_eq!(bob.and_then(|user| user.get("id")), Some(json!(2)));

    let a_names = users.filter(|user| {
        user.try_get::<String>("username")
            .map(|name| name.starts_with('a'))
            .unwrap_or(false)
    })?;
    assert_eq!(a_names.len()?, 2);
    assert_eq!(a_names.model_name(), "User");

    let missing: Vec<Value> = users.pluck("nickname").collect::<Result<_, _>>()?;
    assert_eq!(missing, vec![Value::Null; 3]);
    Ok(())
}

#[test]
fn test_empty_result() -> Result<()> {
    let session = session()?;
    let users = User::query(&session).get()?;
    assert!(users.is_empty()?);
    assert!(users.first()?.is_none());
    assert_eq!(
        users.first_or_fail().unwrap_err(),
        ModelError::EmptyResult("User".to_string())
    );
    assert_eq!(users.pretty()?, "User:\n");
    assert_eq!(users.to_json()?, "[]");
    Ok(())
}

mod common;

use anyhow::Result;
use oxygen_orm::{LazyRelation, Model, ModelError};
use serde_json::{json, Value};

use common::{create_posts, create_users, recorded_session, session, OnePostUser, Post, Profile, Tag, User};

fn texts(posts: &oxygen_orm::ModelContainer) -> Result<Vec<Value>> {
    Ok(posts.pluck("text").collect::<Result<_, _>>()?)
}

#[test]
fn test_has_many_reads() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2"])?;
    create_posts(&session, &[("a", Some(1)), ("b", Some(2)), ("c", Some(1))])?;

    let user = User::find_or_fail(&session, 1)?;
    let posts = user.many("posts")?;
    assert_eq!(posts.model_name(), "Post");
    assert_eq!(texts(&posts)?, vec![json!("a"), json!("c")]);
    assert!(user.is_loaded("posts"));

    let relation = user.rel("posts")?;
    assert_eq!(relation.count()?, 2);
    let latest = relation
        .filter(|query| query.order_by_desc("id"))?
        .first_or_fail()?;
    assert_eq!(latest.get("text"), Some(json!("c")));

    let empty = User::find_or_fail(&session, 2)?;
    assert_eq!(empty.rel("posts")?.filter(|q| q.where_eq("text", "a"))?.count()?, 0);
    Ok(())
}

#[test]
fn test_belongs_to_and_has_one_reads() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", Some(1)), ("orphan", None)])?;
    session.execute(
        "INSERT INTO profiles (user_id, bio) VALUES (?, ?)",
        &[json!(1), json!("hello")],
    )?;

    let post = Post::find_or_fail(&session, 1)?;
    let author = post.one("author")?.expect("an author");
    assert_eq!(author.get("username"), Some(json!("t1")));

    let orphan = Post::find_or_fail(&session, 2)?;
    assert!(matches!(orphan.lazy("author")?, LazyRelation::Empty));
    assert!(orphan.one("author")?.is_none());

    let user = User::find_or_fail(&session, 1)?;
    let profile = user.one("profile")?.expect("a profile");
    assert_eq!(profile.get("bio"), Some(json!("hello")));

    let single = OnePostUser::find_or_fail(&session, 1)?;
    assert_eq!(single.one("post")?.and_then(|p| p.get("text")), Some(json!("a")));
    Ok(())
}

#[test]
fn test_lazy_handle_defers_query() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", Some(1))])?;

    let post = Post::find_or_fail(&session, 1)?;
    let mut lazy = post.lazy("author")?;
    assert!(!lazy.is_loaded());
    let author = lazy.resolve()?.expect("an author");
    assert!(lazy.is_loaded());
    assert_eq!(author.get("id"), Some(json!(1)));
    Ok(())
}

#[test]
fn test_wrong_accessor_for_relation_kind() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    let user = User::find_or_fail(&session, 1)?;
    assert!(matches!(user.one("posts"), Err(ModelError::Relationship(_))));
    assert!(matches!(user.many("profile"), Err(ModelError::Relationship(_))));
    assert!(matches!(user.rel("followers"), Err(ModelError::Relationship(_))));
    Ok(())
}

#[test]
fn test_has_many_add_and_deassign() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", None), ("b", None), ("c", None)])?;

    let user = User::find_or_fail(&session, 1)?;
    let a = Post::find_or_fail(&session, 1)?;
    let b = Post::find_or_fail(&session, 2)?;
    let c = Post::find_or_fail(&session, 3)?;

    user.rel("posts")?.add(&a)?;
    assert_eq!(user.pending_commands().len(), 1);
    assert_eq!(user.rel("posts")?.count()?, 0);
    user.save()?;
    assert!(user.pending_commands().is_empty());
    assert_eq!(texts(&user.many("posts")?)?, vec![json!("a")]);

    user.rel("posts")?.add_many(&[b.clone(), c.clone()])?.save()?;
    assert_eq!(user.rel("posts")?.count()?, 3);

    user.rel("posts")?.deassign(&b)?.save()?;
    assert_eq!(texts(&user.many("posts")?)?, vec![json!("a"), json!("c")]);
    assert_eq!(Post::find_or_fail(&session, 2)?.get("author_id"), Some(Value::Null));
    Ok(())
}

#[test]
fn test_has_many_assign_replaces() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", Some(1)), ("b", Some(1)), ("c", None)])?;

    let user = User::find_or_fail(&session, 1)?;
    let c = Post::find_or_fail(&session, 3)?;
    user.rel("posts")?.assign(&c)?.save()?;
    assert_eq!(texts(&user.many("posts")?)?, vec![json!("c")]);

    let a = Post::find_or_fail(&session, 1)?;
    let b = Post::find_or_fail(&session, 2)?;
    user.rel("posts")?.assign_many(&[a, b])?.save()?;
    assert_eq!(texts(&user.many("posts")?)?, vec![json!("a"), json!("b")]);

    user.rel("posts")?.deassign_all()?.save()?;
    assert_eq!(user.rel("posts")?.count()?, 0);
    assert_eq!(Post::query(&session).where_null("author_id").count()?, 3);
    Ok(())
}

#[test]
fn test_has_one_assign() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", Some(1)), ("b", None)])?;

    let user = OnePostUser::find_or_fail(&session, 1)?;
    let b = Post::find_or_fail(&session, 2)?;
    user.rel("post")?.assign(&b)?.save()?;
    assert_eq!(user.one("post")?.and_then(|p| p.get("text")), Some(json!("b")));
    assert_eq!(Post::find_or_fail(&session, 1)?.get("author_id"), Some(Value::Null));

    let err = user.rel("post")?.add_many(&[b]).unwrap_err();
    assert!(matches!(err, ModelError::Relationship(_)));
    Ok(())
}

#[test]
fn test_belongs_to_assign_sets_own_key() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1", "t2"])?;
    create_posts(&session, &[("a", Some(1))])?;

    let post = Post::find_or_fail(&session, 1)?;
    let other = User::find_or_fail(&session, 2)?;
    post.rel("author")?.assign(&other)?;
    assert!(post.pending_commands().is_empty());
    assert_eq!(post.get("author_id"), Some(json!(2)));
    assert_eq!(Post::find_or_fail(&session, 1)?.get("author_id"), Some(json!(1)));

    post.save()?;
    assert_eq!(Post::find_or_fail(&session, 1)?.get("author_id"), Some(json!(2)));
    assert_eq!(
        post.one("author")?.and_then(|u| u.get("username")),
        Some(json!("t2"))
    );

    post.rel("author")?.deassign_all()?.save()?;
    assert!(post.one("author")?.is_none());
    Ok(())
}

#[test]
fn test_mutators_reject_wrong_model() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;
    session.table("tags").insert([("name", "rust")])?;

    let user = User::find_or_fail(&session, 1)?;
    let tag = Tag::find_or_fail(&session, 1)?;
    let err = user.rel("posts")?.add(&tag).unwrap_err();
    assert_eq!(
        err,
        ModelError::RelationType {
            expected: "Post".to_string(),
            found: "Tag".to_string(),
        }
    );
    assert!(user.pending_commands().is_empty());
    Ok(())
}

#[test]
fn test_mutators_reject_unsaved_records() -> Result<()> {
    let session = session()?;
    create_users(&session, &["t1"])?;

    let user = User::find_or_fail(&session, 1)?;
    let draft = Post::new(&session)?;
    draft.set("text", "draft")?;
    assert_eq!(
        user.rel("posts")?.add(&draft).unwrap_err(),
        ModelError::UnsavedModel("Post".to_string())
    );
    assert!(matches!(
        user.rel("posts")?.assign_many(&[draft.clone()]),
        Err(ModelError::UnsavedModel(_))
    ));

    draft.save()?;
    user.rel("posts")?.add(&draft)?.save()?;
    assert_eq!(user.rel("posts")?.count()?, 1);
    Ok(())
}

#[test]
fn test_unsaved_owner_reads_nothing() -> Result<()> {
    let session = session()?;
    create_posts(&session, &[("a", None)])?;

    let user = User::new(&session)?;
    assert_eq!(user.rel("posts")?.count()?, 0);
    assert!(user.many("posts")?.is_empty()?);
    Ok(())
}

#[test]
fn test_queued_changes_apply_with_new_owner() -> Result<()> {
    let session = session()?;
    create_posts(&session, &[("a", None)])?;

    let user = User::new(&session)?;
    user.set("username", "fresh")?;
    let post = Post::find_or_fail(&session, 1)?;
    user.rel("posts")?.add(&post)?;
    user.save()?;

    let key = user.primary_key().expect("a key");
    assert_eq!(Post::find_or_fail(&session, 1)?.get("author_id"), Some(key));
    Ok(())
}

#[test]
fn test_profile_model_name() -> Result<()> {
    let session = session()?;
    assert_eq!(session.meta::<Profile>()?.table(), "profiles");
    Ok(())
}

#[test]
fn test_has_many_add_many_is_one_update() -> Result<()> {
    let (session, log) = recorded_session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", None), ("b", None), ("c", None)])?;

    let user = User::find_or_fail(&session, 1)?;
    let posts = Post::query(&session).order_by("id").all()?.to_vec()?;
    user.rel("posts")?.add_many(&posts[..2])?;
    log.clear();
    user.save()?;

    let updates: Vec<String> = log
        .writes()
        .into_iter()
        .filter(|sql| sql.starts_with("UPDATE"))
        .collect();
    assert_eq!(
        updates,
        vec!["UPDATE posts SET author_id = ? WHERE id = ? OR id = ?".to_string()]
    );
    assert_eq!(texts(&user.many("posts")?)?, vec![json!("a"), json!("b")]);
    Ok(())
}

#[test]
fn test_has_one_reads_without_limit() -> Result<()> {
    let (session, log) = recorded_session()?;
    create_users(&session, &["t1"])?;
    create_posts(&session, &[("a", Some(1)), ("b", Some(1))])?;

    let user = OnePostUser::find_or_fail(&session, 1)?;
    log.clear();
    let post = user.one("post")?.expect("a post");
    assert_eq!(post.get("text"), Some(json!("a")));

    let reads = log.reads();
    assert_eq!(reads.len(), 1);
    assert!(!reads[0].contains("LIMIT"));
    Ok(())
}

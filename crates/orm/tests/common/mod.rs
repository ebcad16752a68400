//! Shared models and fixtures for the integration tests

#![allow(dead_code)]

use oxygen_orm::{
    FieldSet, Model, ModelResult, PivotSchema, RecordingStorage, RelationSet, Session, SqliteStorage,
    StatementLog,
};
use serde_json::Value;

pub struct User;
pub struct Post;
pub struct Tag;
pub struct Profile;

/// Same table as `User`, with a singular relation to posts
pub struct OnePostUser;

impl Model for User {
    const NAME: &'static str = "User";

    fn relations(relations: &mut RelationSet) {
        relations.has_many::<Post>("posts").other_key("author_id");
        relations.has_one::<Profile>("profile");
    }
}

impl Model for OnePostUser {
    const NAME: &'static str = "OnePostUser";

    fn table_name() -> String {
        "users".to_string()
    }

    fn relations(relations: &mut RelationSet) {
        relations.has_one::<Post>("post").other_key("author_id");
    }
}

impl Model for Post {
    const NAME: &'static str = "Post";

    fn fields(fields: &mut FieldSet) {
        fields.text("text");
        fields.integer("author_id").nullable(true);
    }

    fn relations(relations: &mut RelationSet) {
        relations.belongs_to::<User>("author").self_key("author_id");
        relations
            .belongs_to_many::<Tag>("tags")
            .pivot(PivotSchema::new(["note"]));
    }
}

impl Model for Tag {
    const NAME: &'static str = "Tag";

    fn relations(relations: &mut RelationSet) {
        relations.belongs_to_many::<Post>("posts");
    }
}

impl Model for Profile {
    const NAME: &'static str = "Profile";
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY, text TEXT, author_id INTEGER)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE post_tag (post_id INTEGER, tag_id INTEGER, note TEXT)",
    "CREATE TABLE profiles (id INTEGER PRIMARY KEY, user_id INTEGER, bio TEXT)",
];

fn create_schema(session: &Session) -> ModelResult<()> {
    for statement in SCHEMA {
        session.execute(statement, &[])?;
    }
    Ok(())
}

/// In-memory session with the blog schema
pub fn session() -> ModelResult<Session> {
    let session = Session::in_memory()?;
    create_schema(&session)?;
    Ok(session)
}

/// In-memory session whose statements are recorded in the returned log
pub fn recorded_session() -> ModelResult<(Session, StatementLog)> {
    let log = StatementLog::new();
    let storage = RecordingStorage::new(SqliteStorage::memory()?, log.clone());
    let session = Session::new(storage);
    create_schema(&session)?;
    log.clear();
    Ok((session, log))
}

pub fn create_users(session: &Session, names: &[&str]) -> ModelResult<()> {
    for name in names {
        session
            .table("users")
            .insert([("username", Value::from(*name))])?;
    }
    Ok(())
}

pub fn create_posts(session: &Session, posts: &[(&str, Option<i64>)]) -> ModelResult<()> {
    for (text, author) in posts {
        session.table("posts").insert([
            ("text", Value::from(*text)),
            ("author_id", author.map(Value::from).unwrap_or(Value::Null)),
        ])?;
    }
    Ok(())
}

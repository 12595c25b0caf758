//! Notes about a relationship. Creating one requires owning the
//! relationship; editing, deleting or reading one requires owning the note.

use concord_engine::{
    ExtendError, Frames, Pattern, QueryContext, SyncBuilder, SyncError, Synchronization, Var,
};

use crate::common::{
    NOTE, RELATIONSHIP, authenticate, authorize, not_owned, optional_field, request, respond,
    respond_done, respond_error, respond_success, unauthorized,
};

const CREATE: &str = "/Notes/createNote";
const UPDATE: &str = "/Notes/updateNote";
const DELETE: &str = "/Notes/deleteNote";
const GET: &str = "/Notes/_getNote";
const LIST: &str = "/Notes/_getNotes";
const BY_RELATIONSHIP: &str = "/Notes/_getNotesByRelationship";
const BY_TITLE: &str = "/Notes/_getNoteByTitle";

pub fn syncs() -> Result<Vec<Synchronization>, SyncError> {
    Ok(vec![
        create_request()?,
        unauthorized("CreateNote", CREATE)?,
        not_owned("CreateNote", CREATE, RELATIONSHIP)?,
        respond_success("CreateNote", CREATE, "Notes", "createNote", "note")?,
        respond_error("CreateNote", CREATE, "Notes", "createNote")?,
        update_request()?,
        unauthorized("UpdateNote", UPDATE)?,
        not_owned("UpdateNote", UPDATE, NOTE)?,
        respond_success("UpdateNote", UPDATE, "Notes", "updateNote", "note")?,
        respond_error("UpdateNote", UPDATE, "Notes", "updateNote")?,
        delete_request()?,
        unauthorized("DeleteNote", DELETE)?,
        not_owned("DeleteNote", DELETE, NOTE)?,
        respond_done("DeleteNote", DELETE, "Notes", "deleteNote")?,
        respond_error("DeleteNote", DELETE, "Notes", "deleteNote")?,
        get_request()?,
        unauthorized("GetNote", GET)?,
        not_owned("GetNote", GET, NOTE)?,
        list_request()?,
        unauthorized("GetNotes", LIST)?,
        by_relationship_request()?,
        unauthorized("GetNotesByRelationship", BY_RELATIONSHIP)?,
        by_title_request()?,
        unauthorized("GetNoteByTitle", BY_TITLE)?,
    ])
}

/// The note's owner is the caller, who must also own the relationship.
fn create_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("CreateNoteRequest");
    let [req, session, relationship, title, content, user, owner] = b.vars([
        "request",
        "session",
        "relationship",
        "title",
        "content",
        "user",
        "relationshipOwner",
    ]);
    b.when(
        request(CREATE, req)
            .input("session", session)
            .input("relationship", relationship)
            .input("title", title)
            .input("content", content),
    )
    .where_(&[user, owner], move |ctx, frames| async move {
        authorize(frames, &ctx, session, user, RELATIONSHIP, relationship, owner).await
    })
    .then(
        Pattern::new("Notes", "createNote")
            .input("owner", user)
            .input("relationship", relationship)
            .input("title", title)
            .input("content", content),
    );
    b.build()
}

#[allow(clippy::too_many_arguments)]
async fn authorize_update(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    note: Var,
    owner: Var,
    title: Var,
    content: Var,
) -> Result<Frames, ExtendError> {
    let frames = authorize(frames, &ctx, session, user, NOTE, note, owner).await?;
    let frames = optional_field(frames, title, "title")?;
    optional_field(frames, content, "content")
}

fn update_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("UpdateNoteRequest");
    let [req, session, note, user, owner, title, content] =
        b.vars(["request", "session", "note", "user", "owner", "title", "content"]);
    b.when(request(UPDATE, req).input("session", session).input("note", note))
        .where_(&[user, owner, title, content], move |ctx, frames| {
            authorize_update(frames, ctx, session, user, note, owner, title, content)
        })
        .then(
            Pattern::new("Notes", "updateNote")
                .input("note", note)
                .input("title", title)
                .input("content", content),
        );
    b.build()
}

fn delete_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("DeleteNoteRequest");
    let [req, session, note, user, owner] = b.vars(["request", "session", "note", "user", "owner"]);
    b.when(request(DELETE, req).input("session", session).input("note", note))
        .where_(&[user, owner], move |ctx, frames| async move {
            authorize(frames, &ctx, session, user, NOTE, note, owner).await
        })
        .then(Pattern::new("Notes", "deleteNote").input("note", note));
    b.build()
}

async fn owned_note(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    note: Var,
    owner: Var,
    data: Var,
) -> Result<Frames, ExtendError> {
    let frames = authorize(frames, &ctx, session, user, NOTE, note, owner).await?;
    frames
        .query(&ctx, "Notes", "_getNote", &[("note", note.into())], data)
        .await
}

fn get_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetNoteRequest");
    let [req, session, note, user, owner, data] =
        b.vars(["request", "session", "note", "user", "owner", "data"]);
    b.when(request(GET, req).input("session", session).input("note", note))
        .where_(&[user, owner, data], move |ctx, frames| {
            owned_note(frames, ctx, session, user, note, owner, data)
        })
        .then(respond(req).input("note", data));
    b.build()
}

async fn notes_of(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    listed: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, &ctx, session, user).await?;
    frames
        .query_value(&ctx, "Notes", "_getNotes", &[("owner", user.into())], listed)
        .await
}

fn list_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetNotesRequest");
    let [req, session, user, listed] = b.vars(["request", "session", "user", "notes"]);
    b.when(request(LIST, req).input("session", session))
        .where_(&[user, listed], move |ctx, frames| {
            notes_of(frames, ctx, session, user, listed)
        })
        .then(respond(req).input("notes", listed));
    b.build()
}

async fn notes_about(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    relationship: Var,
    listed: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, &ctx, session, user).await?;
    frames
        .query_value(
            &ctx,
            "Notes",
            "_getNotesByRelationship",
            &[("owner", user.into()), ("relationship", relationship.into())],
            listed,
        )
        .await
}

fn by_relationship_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetNotesByRelationshipRequest");
    let [req, session, relationship, user, listed] =
        b.vars(["request", "session", "relationship", "user", "notes"]);
    b.when(
        request(BY_RELATIONSHIP, req)
            .input("session", session)
            .input("relationship", relationship),
    )
    .where_(&[user, listed], move |ctx, frames| {
        notes_about(frames, ctx, session, user, relationship, listed)
    })
    .then(respond(req).input("notes", listed));
    b.build()
}

async fn note_titled(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    relationship: Var,
    title: Var,
    found: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, &ctx, session, user).await?;
    frames
        .query_or_null(
            &ctx,
            "Notes",
            "_getNoteByTitle",
            &[
                ("owner", user.into()),
                ("relationship", relationship.into()),
                ("title", title.into()),
            ],
            found,
        )
        .await
}

/// Responds `{ note: null }` when no note has that title.
fn by_title_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetNoteByTitleRequest");
    let [req, session, relationship, title, user, found] =
        b.vars(["request", "session", "relationship", "title", "user", "note"]);
    b.when(
        request(BY_TITLE, req)
            .input("session", session)
            .input("relationship", relationship)
            .input("title", title),
    )
    .where_(&[user, found], move |ctx, frames| {
        note_titled(frames, ctx, session, user, relationship, title, found)
    })
    .then(respond(req).input("note", found));
    b.build()
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body, create_relationship, engine, login, register};
    use concord_engine::{Seed, SyncEngine};
    use serde_json::{Value, json};

    async fn create_note(engine: &SyncEngine, session: &str, relationship: &str, title: &str) -> Value {
        let resolution = engine
            .resolve(Seed::request(
                "/Notes/createNote",
                body(json!({
                    "session": session,
                    "relationship": relationship,
                    "title": title,
                    "content": "likes tea",
                })),
            ))
            .await
            .unwrap();
        Value::Object(resolution.response().unwrap())
    }

    #[tokio::test]
    async fn note_lifecycle() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        let relationship = create_relationship(&engine, &session, "Sam", "friend").await;

        let note = create_note(&engine, &session, &relationship, "Gifts").await["note"].clone();
        assert!(note.is_string());

        let updated = engine
            .resolve(Seed::request(
                "/Notes/updateNote",
                body(json!({"session": session, "note": note, "content": "prefers coffee"})),
            ))
            .await
            .unwrap();
        assert_eq!(updated.response().unwrap()["note"], note);

        let fetched = engine
            .resolve(Seed::request(
                "/Notes/_getNote",
                body(json!({"session": session, "note": note})),
            ))
            .await
            .unwrap();
        let fetched = fetched.response().unwrap();
        assert_eq!(fetched["note"]["content"], "prefers coffee");
        assert_eq!(fetched["note"]["title"], "Gifts");

        let by_rel = engine
            .resolve(Seed::request(
                "/Notes/_getNotesByRelationship",
                body(json!({"session": session, "relationship": relationship})),
            ))
            .await
            .unwrap();
        assert_eq!(by_rel.response().unwrap()["notes"].as_array().unwrap().len(), 1);

        let deleted = engine
            .resolve(Seed::request(
                "/Notes/deleteNote",
                body(json!({"session": session, "note": note})),
            ))
            .await
            .unwrap();
        assert!(deleted.response().unwrap().is_empty());

        let listed = engine
            .resolve(Seed::request("/Notes/_getNotes", body(json!({"session": session}))))
            .await
            .unwrap();
        assert_eq!(listed.response().unwrap()["notes"], json!([]));
    }

    #[tokio::test]
    async fn cannot_note_someone_elses_relationship() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        register(&engine, "bob", "pw").await;
        let ada = login(&engine, "ada", "pw").await;
        let bob = login(&engine, "bob", "pw").await;
        let relationship = create_relationship(&engine, &ada, "Sam", "friend").await;

        let refused = create_note(&engine, &bob, &relationship, "Spy").await;
        assert_eq!(refused, json!({"error": "Not found or not owned."}));

        let missing = create_note(&engine, &ada, "no-such-relationship", "Gifts").await;
        assert_eq!(missing, json!({"error": "Not found or not owned."}));
    }

    #[tokio::test]
    async fn duplicate_titles_and_lookup_by_title() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        let relationship = create_relationship(&engine, &session, "Sam", "friend").await;
        create_note(&engine, &session, &relationship, "Gifts").await;

        let duplicate = create_note(&engine, &session, &relationship, "Gifts").await;
        assert!(duplicate["error"].as_str().unwrap().starts_with("Note with title \"Gifts\""));

        let found = engine
            .resolve(Seed::request(
                "/Notes/_getNoteByTitle",
                body(json!({"session": session, "relationship": relationship, "title": "Gifts"})),
            ))
            .await
            .unwrap();
        assert_eq!(found.response().unwrap()["note"]["content"], "likes tea");

        let missing = engine
            .resolve(Seed::request(
                "/Notes/_getNoteByTitle",
                body(json!({"session": session, "relationship": relationship, "title": "Nope"})),
            ))
            .await
            .unwrap();
        assert!(missing.response().unwrap()["note"].is_null());
    }

    #[tokio::test]
    async fn invalid_session_on_every_note_route() {
        let engine = engine();
        for path in [
            "/Notes/createNote",
            "/Notes/updateNote",
            "/Notes/deleteNote",
            "/Notes/_getNote",
            "/Notes/_getNotes",
            "/Notes/_getNotesByRelationship",
            "/Notes/_getNoteByTitle",
        ] {
            let resolution = engine
                .resolve(Seed::request(path, body(json!({"session": "stale"}))))
                .await
                .unwrap();
            assert_eq!(
                Value::Object(resolution.response().unwrap()),
                json!({"error": "Invalid session."}),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn owner_delete_gets_a_single_response() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        let relationship = create_relationship(&engine, &session, "Sam", "friend").await;
        let note = create_note(&engine, &session, &relationship, "Gifts").await["note"].clone();

        let deleted = engine
            .resolve(Seed::request(
                "/Notes/deleteNote",
                body(json!({"session": session, "note": note})),
            ))
            .await
            .unwrap();
        assert_eq!(deleted.responses().len(), 1);
        assert!(deleted.response().unwrap().is_empty());
        assert_eq!(deleted.invocations("Notes", "deleteNote").len(), 1);
    }
}

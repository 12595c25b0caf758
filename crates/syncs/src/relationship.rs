//! Relationships. Every route needs a session; routes that address one
//! relationship also need the caller to own it.

use concord_engine::{
    ExtendError, Frames, Pattern, QueryContext, SyncBuilder, SyncError, Synchronization, Var,
};

use crate::common::{
    RELATIONSHIP, authenticate, authorize, not_owned, optional_field, request, respond,
    respond_done, respond_error, respond_success, unauthorized,
};

const CREATE: &str = "/Relationship/createRelationship";
const UPDATE: &str = "/Relationship/updateRelationship";
const DELETE: &str = "/Relationship/deleteRelationship";
const GET: &str = "/Relationship/_getRelationship";
const LIST: &str = "/Relationship/_getRelationships";
const BY_NAME: &str = "/Relationship/_getRelationshipByName";

pub fn syncs() -> Result<Vec<Synchronization>, SyncError> {
    Ok(vec![
        create_request()?,
        unauthorized("CreateRelationship", CREATE)?,
        respond_success("CreateRelationship", CREATE, "Relationship", "createRelationship", "relationship")?,
        respond_error("CreateRelationship", CREATE, "Relationship", "createRelationship")?,
        update_request()?,
        unauthorized("UpdateRelationship", UPDATE)?,
        not_owned("UpdateRelationship", UPDATE, RELATIONSHIP)?,
        respond_success("UpdateRelationship", UPDATE, "Relationship", "updateRelationship", "relationship")?,
        respond_error("UpdateRelationship", UPDATE, "Relationship", "updateRelationship")?,
        delete_request()?,
        unauthorized("DeleteRelationship", DELETE)?,
        not_owned("DeleteRelationship", DELETE, RELATIONSHIP)?,
        respond_done("DeleteRelationship", DELETE, "Relationship", "deleteRelationship")?,
        respond_error("DeleteRelationship", DELETE, "Relationship", "deleteRelationship")?,
        get_request()?,
        unauthorized("GetRelationship", GET)?,
        not_owned("GetRelationship", GET, RELATIONSHIP)?,
        list_request()?,
        unauthorized("GetRelationships", LIST)?,
        by_name_request()?,
        unauthorized("GetRelationshipByName", BY_NAME)?,
    ])
}

fn create_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("CreateRelationshipRequest");
    let [req, session, name, kind, user] =
        b.vars(["request", "session", "name", "relationshipType", "user"]);
    b.when(
        request(CREATE, req)
            .input("session", session)
            .input("name", name)
            .input("relationshipType", kind),
    )
    .where_(&[user], move |ctx, frames| async move {
        authenticate(frames, &ctx, session, user).await
    })
    .then(
        Pattern::new("Relationship", "createRelationship")
            .input("owner", user)
            .input("name", name)
            .input("relationshipType", kind),
    );
    b.build()
}

#[allow(clippy::too_many_arguments)]
async fn authorize_update(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    relationship: Var,
    owner: Var,
    name: Var,
    kind: Var,
) -> Result<Frames, ExtendError> {
    let frames = authorize(frames, &ctx, session, user, RELATIONSHIP, relationship, owner).await?;
    let frames = optional_field(frames, name, "name")?;
    optional_field(frames, kind, "relationshipType")
}

/// `name` and `relationshipType` are both optional here, so they are read
/// from the request body rather than matched.
fn update_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("UpdateRelationshipRequest");
    let [req, session, relationship, user, owner, name, kind] = b.vars([
        "request",
        "session",
        "relationship",
        "user",
        "owner",
        "name",
        "relationshipType",
    ]);
    b.when(
        request(UPDATE, req)
            .input("session", session)
            .input("relationship", relationship),
    )
    .where_(&[user, owner, name, kind], move |ctx, frames| {
        authorize_update(frames, ctx, session, user, relationship, owner, name, kind)
    })
    .then(
        Pattern::new("Relationship", "updateRelationship")
            .input("relationship", relationship)
            .input("name", name)
            .input("relationshipType", kind),
    );
    b.build()
}

fn delete_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("DeleteRelationshipRequest");
    let [req, session, relationship, user, owner] =
        b.vars(["request", "session", "relationship", "user", "owner"]);
    b.when(
        request(DELETE, req)
            .input("session", session)
            .input("relationship", relationship),
    )
    .where_(&[user, owner], move |ctx, frames| async move {
        authorize(frames, &ctx, session, user, RELATIONSHIP, relationship, owner).await
    })
    .then(Pattern::new("Relationship", "deleteRelationship").input("relationship", relationship));
    b.build()
}

async fn owned_relationship(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    relationship: Var,
    owner: Var,
    data: Var,
) -> Result<Frames, ExtendError> {
    let frames = authorize(frames, &ctx, session, user, RELATIONSHIP, relationship, owner).await?;
    frames
        .query(
            &ctx,
            "Relationship",
            "_getRelationship",
            &[("relationship", relationship.into())],
            data,
        )
        .await
}

fn get_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetRelationshipRequest");
    let [req, session, relationship, user, owner, data] =
        b.vars(["request", "session", "relationship", "user", "owner", "data"]);
    b.when(
        request(GET, req)
            .input("session", session)
            .input("relationship", relationship),
    )
    .where_(&[user, owner, data], move |ctx, frames| {
        owned_relationship(frames, ctx, session, user, relationship, owner, data)
    })
    .then(respond(req).input("relationship", data));
    b.build()
}

async fn relationships_of(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    listed: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, &ctx, session, user).await?;
    frames
        .query_value(&ctx, "Relationship", "_getRelationships", &[("owner", user.into())], listed)
        .await
}

fn list_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetRelationshipsRequest");
    let [req, session, user, listed] = b.vars(["request", "session", "user", "relationships"]);
    b.when(request(LIST, req).input("session", session))
        .where_(&[user, listed], move |ctx, frames| {
            relationships_of(frames, ctx, session, user, listed)
        })
        .then(respond(req).input("relationships", listed));
    b.build()
}

async fn relationship_named(
    frames: Frames,
    ctx: QueryContext,
    session: Var,
    user: Var,
    name: Var,
    found: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, &ctx, session, user).await?;
    frames
        .query_or_null(
            &ctx,
            "Relationship",
            "_getRelationshipByName",
            &[("owner", user.into()), ("name", name.into())],
            found,
        )
        .await
}

/// Responds `{ relationship: null }` when the caller has no relationship
/// by that name.
fn by_name_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetRelationshipByNameRequest");
    let [req, session, name, user, found] =
        b.vars(["request", "session", "name", "user", "relationship"]);
    b.when(request(BY_NAME, req).input("session", session).input("name", name))
        .where_(&[user, found], move |ctx, frames| {
            relationship_named(frames, ctx, session, user, name, found)
        })
        .then(respond(req).input("relationship", found));
    b.build()
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body, create_relationship, engine, login, register};
    use concord_engine::Seed;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_list_own_relationships() {
        let engine = engine();
        let user = register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        let relationship = create_relationship(&engine, &session, "Sam", "friend").await;

        let listed = engine
            .resolve(Seed::request(
                "/Relationship/_getRelationships",
                body(json!({"session": session})),
            ))
            .await
            .unwrap();
        let listed = listed.response().unwrap();
        assert_eq!(listed["relationships"][0]["relationship"], json!(relationship));

        let single = engine
            .resolve(Seed::request(
                "/Relationship/_getRelationship",
                body(json!({"session": session, "relationship": relationship})),
            ))
            .await
            .unwrap();
        assert_eq!(single.response().unwrap()["relationship"]["owner"], json!(user));
    }

    #[tokio::test]
    async fn empty_list_still_responds() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        let listed = engine
            .resolve(Seed::request(
                "/Relationship/_getRelationships",
                body(json!({"session": session})),
            ))
            .await
            .unwrap();
        assert_eq!(listed.response().unwrap()["relationships"], json!([]));
    }

    #[tokio::test]
    async fn others_cannot_touch_a_relationship() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        register(&engine, "bob", "pw").await;
        let ada = login(&engine, "ada", "pw").await;
        let bob = login(&engine, "bob", "pw").await;
        let relationship = create_relationship(&engine, &ada, "Sam", "friend").await;

        for path in [
            "/Relationship/deleteRelationship",
            "/Relationship/_getRelationship",
        ] {
            let resolution = engine
                .resolve(Seed::request(
                    path,
                    body(json!({"session": bob, "relationship": relationship})),
                ))
                .await
                .unwrap();
            assert_eq!(
                resolution.response().unwrap()["error"],
                "Not found or not owned.",
                "{path}"
            );
        }
        let resolution = engine
            .resolve(Seed::request(
                "/Relationship/updateRelationship",
                body(json!({"session": bob, "relationship": relationship, "name": "Mine"})),
            ))
            .await
            .unwrap();
        assert_eq!(resolution.response().unwrap()["error"], "Not found or not owned.");
        assert!(resolution.invocations("Relationship", "updateRelationship").is_empty());
    }

    #[tokio::test]
    async fn partial_update_and_delete() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        let relationship = create_relationship(&engine, &session, "Sam", "friend").await;

        let updated = engine
            .resolve(Seed::request(
                "/Relationship/updateRelationship",
                body(json!({"session": session, "relationship": relationship, "relationshipType": "cousin"})),
            ))
            .await
            .unwrap();
        assert_eq!(updated.response().unwrap()["relationship"], json!(relationship));

        let by_name = engine
            .resolve(Seed::request(
                "/Relationship/_getRelationshipByName",
                body(json!({"session": session, "name": "Sam"})),
            ))
            .await
            .unwrap();
        assert_eq!(
            by_name.response().unwrap()["relationship"]["relationshipType"],
            "cousin"
        );

        let deleted = engine
            .resolve(Seed::request(
                "/Relationship/deleteRelationship",
                body(json!({"session": session, "relationship": relationship})),
            ))
            .await
            .unwrap();
        assert!(deleted.response().unwrap().is_empty());

        let gone = engine
            .resolve(Seed::request(
                "/Relationship/deleteRelationship",
                body(json!({"session": session, "relationship": relationship})),
            ))
            .await
            .unwrap();
        assert_eq!(gone.response().unwrap()["error"], "Not found or not owned.");
    }

    #[tokio::test]
    async fn duplicate_name_is_an_error_response() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;
        create_relationship(&engine, &session, "Sam", "friend").await;

        let resolution = engine
            .resolve(Seed::request(
                "/Relationship/createRelationship",
                body(json!({"session": session, "name": "Sam", "relationshipType": "cousin"})),
            ))
            .await
            .unwrap();
        let error = resolution.response().unwrap()["error"].clone();
        assert!(error.as_str().unwrap().starts_with("Relationship with name \"Sam\""));
    }
}

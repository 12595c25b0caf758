//! Building blocks shared by every route: request/respond patterns, the
//! session and ownership guards, and the stock response syncs.

use concord_core::Value;
use concord_engine::{
    ExtendError, Frames, Pattern, QueryContext, SyncBuilder, SyncError, Synchronization, Var,
};

pub const INVALID_SESSION: &str = "Invalid session.";
pub const NOT_OWNED: &str = "Not found or not owned.";

/// A concept query that returns a document with an `owner` field.
#[derive(Debug, Clone, Copy)]
pub struct Owned {
    pub concept: &'static str,
    pub query: &'static str,
    /// Argument name of the query, also the request body field carrying the id.
    pub key: &'static str,
}

pub const RELATIONSHIP: Owned = Owned {
    concept: "Relationship",
    query: "_getRelationship",
    key: "relationship",
};

pub const NOTE: Owned = Owned {
    concept: "Notes",
    query: "_getNote",
    key: "note",
};

/// `Requesting.request { path } => { request }`.
pub fn request(path: &str, req: Var) -> Pattern {
    Pattern::new("Requesting", "request")
        .input("path", path)
        .output("request", req)
}

/// `Requesting.respond { request }`, to be extended with the body fields.
pub fn respond(req: Var) -> Pattern {
    Pattern::new("Requesting", "respond").input("request", req)
}

/// Resolve `session` to `user`, dropping frames whose session is unknown.
pub async fn authenticate(
    frames: Frames,
    ctx: &QueryContext,
    session: Var,
    user: Var,
) -> Result<Frames, ExtendError> {
    frames
        .query(ctx, "Sessioning", "_getUser", &[("session", session.into())], user)
        .await
}

/// Keep only frames whose session is unknown. `user` ends up bound to `Null`.
pub async fn unauthenticated(
    frames: Frames,
    ctx: &QueryContext,
    session: Var,
    user: Var,
) -> Result<Frames, ExtendError> {
    let frames = frames
        .query_or_null(ctx, "Sessioning", "_getUser", &[("session", session.into())], user)
        .await?;
    Ok(frames.filter(|f| f.value(user).is_null()))
}

/// Authenticate, then keep frames where `user` owns the document `target`
/// names. Binds `owner`.
pub async fn authorize(
    frames: Frames,
    ctx: &QueryContext,
    session: Var,
    user: Var,
    resource: Owned,
    target: Var,
    owner: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, ctx, session, user).await?;
    let frames = frames
        .query_field(
            ctx,
            resource.concept,
            resource.query,
            &[(resource.key, target.into())],
            "owner",
            owner,
        )
        .await?;
    Ok(frames.filter(|f| f.value(owner) == f.value(user)))
}

/// Authenticate, then keep frames where the document `target` names is
/// missing or owned by someone else. Binds `found` to the document or `Null`.
pub async fn forbidden(
    frames: Frames,
    ctx: &QueryContext,
    session: Var,
    user: Var,
    resource: Owned,
    target: Var,
    found: Var,
) -> Result<Frames, ExtendError> {
    let frames = authenticate(frames, ctx, session, user).await?;
    let frames = frames
        .query_or_null(
            ctx,
            resource.concept,
            resource.query,
            &[(resource.key, target.into())],
            found,
        )
        .await?;
    Ok(frames.filter(|f| f.value(found).get("owner") != Some(f.value(user))))
}

/// Bind `var` to the request's `key` field, or `Null` when the caller left
/// it out.
pub fn optional_field(frames: Frames, var: Var, key: &str) -> Result<Frames, ExtendError> {
    frames
        .map_bind(var, |f| f.original_input().get(key).cloned().unwrap_or(Value::Null))
        .map_err(ExtendError::from)
}

/// Respond `{ error: "Invalid session." }` to `path` when its session is unknown.
pub fn unauthorized(name: &str, path: &str) -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new(format!("{name}Unauthorized"));
    let [req, session, user] = b.vars(["request", "session", "user"]);
    b.when(request(path, req).input("session", session))
        .where_(&[user], move |ctx, frames| async move {
            unauthenticated(frames, &ctx, session, user).await
        })
        .then(respond(req).input("error", INVALID_SESSION));
    b.build()
}

/// Respond `{ error: "Not found or not owned." }` to `path` when the session
/// is valid but the addressed document is missing or someone else's.
pub fn not_owned(name: &str, path: &str, resource: Owned) -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new(format!("{name}Forbidden"));
    let [req, session, user, target, found] =
        b.vars(["request", "session", "user", "target", "found"]);
    b.when(
        request(path, req)
            .input("session", session)
            .input(resource.key, target),
    )
    .where_(&[user, found], move |ctx, frames| async move {
        forbidden(frames, &ctx, session, user, resource, target, found).await
    })
    .then(respond(req).input("error", NOT_OWNED));
    b.build()
}

/// Respond with `field` from a successful `concept.action` run for `path`.
pub fn respond_success(
    name: &str,
    path: &str,
    concept: &str,
    action: &str,
    field: &str,
) -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new(format!("{name}ResponseSuccess"));
    let [req, value] = b.vars(["request", field]);
    b.when(request(path, req))
        .when(Pattern::new(concept, action).output(field, value))
        .then(respond(req).input(field, value));
    b.build()
}

/// Respond `{}` once `concept.action` succeeds for `path`. For actions whose
/// success carries no fields.
pub fn respond_done(
    name: &str,
    path: &str,
    concept: &str,
    action: &str,
) -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new(format!("{name}ResponseSuccess"));
    let req = b.var("request");
    b.when(request(path, req))
        .when(Pattern::new(concept, action).without("error"))
        .then(respond(req));
    b.build()
}

/// Respond with the refusal of `concept.action` for `path`.
pub fn respond_error(
    name: &str,
    path: &str,
    concept: &str,
    action: &str,
) -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new(format!("{name}ResponseError"));
    let [req, error] = b.vars(["request", "error"]);
    b.when(request(path, req))
        .when(Pattern::new(concept, action).output("error", error))
        .then(respond(req).input("error", error));
    b.build()
}

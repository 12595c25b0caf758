//! Registration, login and sessions.

use concord_core::Value;
use concord_engine::{
    ExtendError, Frames, Pattern, QueryContext, SyncBuilder, SyncError, Synchronization, Var,
};

use crate::common::{request, respond, respond_error, respond_success};

const REGISTER: &str = "/UserAuth/register";
const LOGIN: &str = "/UserAuth/login";
const GET_USER_BY_USERNAME: &str = "/UserAuth/_getUserByUsername";
const LOGOUT: &str = "/Sessioning/delete";
const GET_USER: &str = "/Sessioning/_getUser";

pub fn syncs() -> Result<Vec<Synchronization>, SyncError> {
    Ok(vec![
        register_request()?,
        respond_success("Register", REGISTER, "UserAuth", "register", "user")?,
        respond_error("Register", REGISTER, "UserAuth", "register")?,
        login_request()?,
        create_session_on_login()?,
        login_response()?,
        respond_error("Login", LOGIN, "UserAuth", "login")?,
        get_user_by_username()?,
        logout_request()?,
        logout_response()?,
        respond_error("Logout", LOGOUT, "Sessioning", "delete")?,
        get_user_from_session()?,
    ])
}

fn register_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("RegisterRequest");
    let [req, username, password] = b.vars(["request", "username", "password"]);
    b.when(
        request(REGISTER, req)
            .input("username", username)
            .input("password", password),
    )
    .then(
        Pattern::new("UserAuth", "register")
            .input("username", username)
            .input("password", password),
    );
    b.build()
}

fn login_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("LoginRequest");
    let [req, username, password] = b.vars(["request", "username", "password"]);
    b.when(
        request(LOGIN, req)
            .input("username", username)
            .input("password", password),
    )
    .then(
        Pattern::new("UserAuth", "login")
            .input("username", username)
            .input("password", password),
    );
    b.build()
}

/// Every successful login opens a session, whichever route it came from.
fn create_session_on_login() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("CreateSessionOnLogin");
    let user = b.var("user");
    b.when(Pattern::new("UserAuth", "login").output("user", user))
        .then(Pattern::new("Sessioning", "create").input("user", user));
    b.build()
}

/// Login answers once the session exists, with both ids.
fn login_response() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("LoginResponseSuccess");
    let [req, user, session] = b.vars(["request", "user", "session"]);
    b.when(request(LOGIN, req))
        .when(Pattern::new("UserAuth", "login").output("user", user))
        .when(
            Pattern::new("Sessioning", "create")
                .input("user", user)
                .output("session", session),
        )
        .then(respond(req).input("user", user).input("session", session));
    b.build()
}

async fn lookup_username(
    frames: Frames,
    ctx: QueryContext,
    username: Var,
    found: Var,
    user: Var,
) -> Result<Frames, ExtendError> {
    let frames = frames
        .query_or_null(
            &ctx,
            "UserAuth",
            "_getUserByUsername",
            &[("username", username.into())],
            found,
        )
        .await?;
    frames
        .map_bind(user, |f| f.value(found).get("user").cloned().unwrap_or(Value::Null))
        .map_err(ExtendError::from)
}

/// Public lookup. Responds `{ user: null }` for unknown usernames.
fn get_user_by_username() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetUserByUsername");
    let [req, username, found, user] = b.vars(["request", "username", "found", "user"]);
    b.when(request(GET_USER_BY_USERNAME, req).input("username", username))
        .where_(&[found, user], move |ctx, frames| {
            lookup_username(frames, ctx, username, found, user)
        })
        .then(respond(req).input("user", user));
    b.build()
}

fn logout_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("LogoutRequest");
    let [req, session] = b.vars(["request", "session"]);
    b.when(request(LOGOUT, req).input("session", session))
        .then(Pattern::new("Sessioning", "delete").input("session", session));
    b.build()
}

fn logout_response() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("LogoutResponseSuccess");
    let req = b.var("request");
    b.when(request(LOGOUT, req))
        .when(Pattern::new("Sessioning", "delete").without("error"))
        .then(respond(req).input("status", "logged_out"));
    b.build()
}

/// Responds `{ user: null }` for unknown sessions.
fn get_user_from_session() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("GetUserFromSession");
    let [req, session, user] = b.vars(["request", "session", "user"]);
    b.when(request(GET_USER, req).input("session", session))
        .where_(&[user], move |ctx, frames| async move {
            frames
                .query_or_null(&ctx, "Sessioning", "_getUser", &[("session", session.into())], user)
                .await
        })
        .then(respond(req).input("user", user));
    b.build()
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body, engine, register, login};
    use concord_engine::Seed;
    use serde_json::json;

    #[tokio::test]
    async fn register_creates_profile_and_responds_once() {
        let engine = engine();
        let resolution = engine
            .resolve(Seed::request(
                "/UserAuth/register",
                body(json!({"username": "ada", "password": "pw"})),
            ))
            .await
            .unwrap();

        let response = resolution.response().unwrap();
        let user = response["user"].clone();
        assert!(user.is_string());

        let profiles = resolution.invocations("Profile", "createProfile");
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].input.get("user"), Some(&user));
        assert_eq!(profiles[0].input.get("name"), Some(&json!("")));
    }

    #[tokio::test]
    async fn duplicate_register_is_an_error_response() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let resolution = engine
            .resolve(Seed::request(
                "/UserAuth/register",
                body(json!({"username": "ada", "password": "x"})),
            ))
            .await
            .unwrap();
        assert_eq!(
            resolution.response().unwrap()["error"],
            "User with username ada already exists."
        );
        assert!(resolution.invocations("Profile", "createProfile").is_empty());
    }

    #[tokio::test]
    async fn login_responds_with_user_and_session() {
        let engine = engine();
        let user = register(&engine, "ada", "pw").await;
        let resolution = engine
            .resolve(Seed::request(
                "/UserAuth/login",
                body(json!({"username": "ada", "password": "pw"})),
            ))
            .await
            .unwrap();

        let response = resolution.response().unwrap();
        assert_eq!(response["user"], json!(user));
        assert!(response["session"].is_string());
        assert_eq!(resolution.responses().len(), 1);
    }

    #[tokio::test]
    async fn bad_password_opens_no_session() {
        let engine = engine();
        register(&engine, "ada", "pw").await;
        let resolution = engine
            .resolve(Seed::request(
                "/UserAuth/login",
                body(json!({"username": "ada", "password": "nope"})),
            ))
            .await
            .unwrap();
        assert_eq!(resolution.response().unwrap()["error"], "Invalid password.");
        assert!(resolution.invocations("Sessioning", "create").is_empty());
    }

    #[tokio::test]
    async fn session_lookup_and_logout() {
        let engine = engine();
        let user = register(&engine, "ada", "pw").await;
        let session = login(&engine, "ada", "pw").await;

        let lookup = |session: String| {
            Seed::request("/Sessioning/_getUser", body(json!({"session": session})))
        };
        let found = engine.resolve(lookup(session.clone())).await.unwrap();
        assert_eq!(found.response().unwrap()["user"], json!(user));

        let out = engine
            .resolve(Seed::request("/Sessioning/delete", body(json!({"session": session}))))
            .await
            .unwrap();
        assert_eq!(out.response().unwrap()["status"], "logged_out");

        let again = engine
            .resolve(Seed::request("/Sessioning/delete", body(json!({"session": session}))))
            .await
            .unwrap();
        assert!(again.response().unwrap()["error"].is_string());

        let gone = engine.resolve(lookup(session)).await.unwrap();
        assert!(gone.response().unwrap()["user"].is_null());
    }

    #[tokio::test]
    async fn username_lookup_never_leaks_hash() {
        let engine = engine();
        let user = register(&engine, "ada", "pw").await;
        let found = engine
            .resolve(Seed::request(
                "/UserAuth/_getUserByUsername",
                body(json!({"username": "ada"})),
            ))
            .await
            .unwrap();
        assert_eq!(serde_json::Value::Object(found.response().unwrap()), json!({"user": user}));

        let missing = engine
            .resolve(Seed::request(
                "/UserAuth/_getUserByUsername",
                body(json!({"username": "bob"})),
            ))
            .await
            .unwrap();
        assert!(missing.response().unwrap()["user"].is_null());
    }
}

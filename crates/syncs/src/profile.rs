//! Profiles: created on registration, edited by their owner, readable by anyone.

use concord_engine::{Pattern, SyncBuilder, SyncError, Synchronization};

use crate::common::{
    authenticate, request, respond, respond_done, respond_error, respond_success, unauthorized,
};

const CREATE: &str = "/Profile/createProfile";
const UPDATE_NAME: &str = "/Profile/updateName";
const DELETE: &str = "/Profile/deleteProfile";
const GET_PROFILE: &str = "/Profile/_getProfile";
const GET_NAME: &str = "/Profile/_getName";

pub fn syncs() -> Result<Vec<Synchronization>, SyncError> {
    Ok(vec![
        create_profile_on_register()?,
        create_profile_request()?,
        unauthorized("CreateProfile", CREATE)?,
        respond_success("CreateProfile", CREATE, "Profile", "createProfile", "profile")?,
        respond_error("CreateProfile", CREATE, "Profile", "createProfile")?,
        update_name_request()?,
        unauthorized("UpdateName", UPDATE_NAME)?,
        respond_success("UpdateName", UPDATE_NAME, "Profile", "updateName", "profile")?,
        respond_error("UpdateName", UPDATE_NAME, "Profile", "updateName")?,
        delete_profile_request()?,
        unauthorized("DeleteProfile", DELETE)?,
        respond_done("DeleteProfile", DELETE, "Profile", "deleteProfile")?,
        respond_error("DeleteProfile", DELETE, "Profile", "deleteProfile")?,
        public_lookup("GetProfile", GET_PROFILE, "_getProfile", "profile")?,
        public_lookup("GetName", GET_NAME, "_getName", "name")?,
    ])
}

fn create_profile_on_register() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("CreateProfileOnRegister");
    let user = b.var("user");
    b.when(Pattern::new("UserAuth", "register").output("user", user))
        .then(Pattern::new("Profile", "createProfile").input("user", user).input("name", ""));
    b.build()
}

fn create_profile_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("CreateProfileRequest");
    let [req, session, name, user] = b.vars(["request", "session", "name", "user"]);
    b.when(request(CREATE, req).input("session", session).input("name", name))
        .where_(&[user], move |ctx, frames| async move {
            authenticate(frames, &ctx, session, user).await
        })
        .then(Pattern::new("Profile", "createProfile").input("user", user).input("name", name));
    b.build()
}

fn update_name_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("UpdateNameRequest");
    let [req, session, name, user] = b.vars(["request", "session", "name", "user"]);
    b.when(request(UPDATE_NAME, req).input("session", session).input("name", name))
        .where_(&[user], move |ctx, frames| async move {
            authenticate(frames, &ctx, session, user).await
        })
        .then(Pattern::new("Profile", "updateName").input("user", user).input("name", name));
    b.build()
}

fn delete_profile_request() -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new("DeleteProfileRequest");
    let [req, session, user] = b.vars(["request", "session", "user"]);
    b.when(request(DELETE, req).input("session", session))
        .where_(&[user], move |ctx, frames| async move {
            authenticate(frames, &ctx, session, user).await
        })
        .then(Pattern::new("Profile", "deleteProfile").input("user", user));
    b.build()
}

/// Answer `query` for the `user` in the body, responding `{ field: null }`
/// when there is no profile.
fn public_lookup(
    name: &str,
    path: &str,
    query: &'static str,
    field: &str,
) -> Result<Synchronization, SyncError> {
    let mut b = SyncBuilder::new(format!("{name}Request"));
    let [req, user, found] = b.vars(["request", "user", field]);
    b.when(request(path, req).input("user", user))
        .where_(&[found], move |ctx, frames| async move {
            frames
                .query_or_null(&ctx, "Profile", query, &[("user", user.into())], found)
                .await
        })
        .then(respond(req).input(field, found));
    b.build()
}

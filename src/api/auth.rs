use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::{Error as JsonError, Json},
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::api::{
        auth::{AuthToken, Caller, AUTH_TOKEN_COOKIE},
        user::{LoginCredentials, UserDescription},
    },
    poll::{policy::authenticated, users},
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![login, logout, session]
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    cookies: &CookieJar<'_>,
    credentials: std::result::Result<Json<LoginCredentials>, JsonError<'_>>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let credentials = credentials.map_err(Error::bad_body)?;
    let user = users::authenticate(store, &credentials).await?;

    let token = AuthToken::new(&user);
    cookies.add(token.into_cookie(config));

    Ok(Json(user.into()))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[get("/auth/session")]
pub async fn session(
    caller: Result<Caller>,
    store: &State<Store>,
) -> Result<Json<UserDescription>> {
    let caller = Caller::optional(caller)?;
    let caller = authenticated(caller.as_ref())?;
    let user = store
        .user(caller.id)
        .await?
        .ok_or(Error::NotAuthenticated)?;
    Ok(Json(user.into()))
}

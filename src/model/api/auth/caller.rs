use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::{Role, UserId},
    db::user::User,
};
use crate::store::Store;

use super::token::{AuthToken, AUTH_TOKEN_COOKIE};

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

impl Caller {
    /// Turn the guard's outcome into an optional identity. A request without
    /// a valid login has no caller; any other failure is an error.
    /// Routes take `Result<Caller, Error>` and pass the result through this.
    pub fn optional(guard: Result<Self, Error>) -> Result<Option<Self>, Error> {
        match guard {
            Ok(caller) => Ok(Some(caller)),
            Err(Error::NotAuthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    /// Get the caller from the auth cookie, checking that the user still
    /// exists. The role comes from the store, not the token.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (config, store) = match (req.rocket().state::<Config>(), req.rocket().state::<Store>()) {
            (Some(config), Some(store)) => (config, store),
            _ => {
                let err = Error::Status(
                    Status::InternalServerError,
                    "Configuration or store not managed".to_string(),
                );
                return Outcome::Failure((Status::InternalServerError, err));
            }
        };

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => return Outcome::Failure((Status::Unauthorized, Error::NotAuthenticated)),
        };

        let token = match AuthToken::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected auth cookie: {e}");
                return Outcome::Failure((Status::Unauthorized, Error::NotAuthenticated));
            }
        };

        match store.user(token.id).await {
            Ok(Some(user)) => Outcome::Success(Caller::from(&user)),
            Ok(None) => Outcome::Failure((Status::Unauthorized, Error::NotAuthenticated)),
            Err(e) => {
                error!("Failed to look up user {} from auth cookie: {e}", token.id);
                Outcome::Failure((Status::InternalServerError, e))
            }
        }
    }
}

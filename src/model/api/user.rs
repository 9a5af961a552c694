use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{Grade, Role, UserId},
    db::user::{NewUser, User},
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A user as presented to clients. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDescription {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub has_voted: bool,
    pub grade: Option<Grade>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.user.username,
            role: user.user.role,
            display_name: user.user.display_name,
            has_voted: user.user.has_voted,
            grade: user.user.grade,
        }
    }
}

/// Raw account details, received from a judge. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub grade: Option<Grade>,
}

impl TryFrom<UserSpec> for NewUser {
    type Error = Error;

    /// Convert a [`UserSpec`] to a [`NewUser`] by hashing the password.
    /// This enforces that the username is non-empty, and the password meets minimum length.
    fn try_from(spec: UserSpec) -> Result<Self> {
        let username = spec.username.trim().to_string();
        if username.is_empty() {
            return Err(Error::validation("username is required"));
        }
        if spec.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes is the recommended salt length for argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(spec.password.as_bytes(), &salt, &Config::default())?;

        Ok(Self {
            username,
            password_hash,
            role: spec.role,
            has_voted: false,
            display_name: spec.display_name.filter(|name| !name.trim().is_empty()),
            grade: spec.grade,
        })
    }
}

/// Login details.
#[derive(Clone, Deserialize, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

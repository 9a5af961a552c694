use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::common::{Grade, Role, UserId};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Flipped from false to true exactly once, when the user's vote commits.
    pub has_voted: bool,
    pub display_name: Option<String>,
    /// The grade the user belongs to, if known. Used for participation stats.
    pub grade: Option<Grade>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

use std::fmt::Display;

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The role a user holds in the poll.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// An eligible voter.
    #[default]
    Student,
    /// Manages candidates and the election.
    Judge,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Student => "student",
                Self::Judge => "judge",
            }
        )
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialises_lowercase() {
        assert_eq!(Bson::from(Role::Judge), Bson::String("judge".to_string()));
        assert_eq!(Role::Student.to_string(), "student");
        assert_eq!(Role::default(), Role::Student);
    }
}

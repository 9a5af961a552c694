mod caller;
mod token;

pub use caller::Caller;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};

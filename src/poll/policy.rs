use crate::error::{Error, Result};
use crate::model::{api::auth::Caller, common::Role};

/// Whether the caller may manage candidates and the election.
pub fn is_judge(caller: &Caller) -> bool {
    caller.role == Role::Judge
}

/// Require some caller identity.
pub fn authenticated(caller: Option<&Caller>) -> Result<&Caller> {
    caller.ok_or(Error::NotAuthenticated)
}

/// Require a judge. Must be called before anything is written.
pub fn require_judge<'c>(caller: Option<&'c Caller>, action: &str) -> Result<&'c Caller> {
    let caller = authenticated(caller)?;
    if !is_judge(caller) {
        warn!("User {} ({}) tried to {action}", caller.id, caller.role);
        return Err(Error::Forbidden(format!("only judges may {action}")));
    }
    Ok(caller)
}

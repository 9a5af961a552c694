use rocket::http::Status;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::Caller,
        user::{LoginCredentials, UserSpec},
    },
    common::Role,
    db::{
        user::{NewUser, User},
        vote::{Vote, VoteFilter},
    },
};
use crate::store::Store;

use super::policy::require_judge;

/// Provision a new account (judges only).
pub async fn create_user(store: &Store, caller: Option<&Caller>, spec: UserSpec) -> Result<User> {
    let judge = require_judge(caller, "create users")?;
    let user = store.insert_user(NewUser::try_from(spec)?).await?;
    info!(
        "Judge {} created {} account {} ({})",
        judge.id, user.role, user.id, user.username
    );
    Ok(user)
}

/// Every account (judges only).
pub async fn list_users(store: &Store, caller: Option<&Caller>) -> Result<Vec<User>> {
    require_judge(caller, "list users")?;
    store.users().await
}

/// Votes, optionally filtered by candidate and/or voter (judges only).
pub async fn list_votes(
    store: &Store,
    caller: Option<&Caller>,
    filter: VoteFilter,
) -> Result<Vec<Vote>> {
    require_judge(caller, "inspect votes")?;
    store.votes(filter).await
}

/// Check a username/password pair, returning the matching user.
pub async fn authenticate(store: &Store, credentials: &LoginCredentials) -> Result<User> {
    let user = store
        .user_by_username(&credentials.username)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No user found with the provided username and password combination.".to_string(),
            )
        })?;
    info!("User {} ({}) logged in", user.id, user.role);
    Ok(user)
}

/// Ensure the configured bootstrap judge exists, creating it if not.
///
/// This operation is idempotent.
pub async fn ensure_judge_exists(store: &Store, config: &Config) -> Result<()> {
    debug!("Ensuring judge {} exists", config.judge_username());
    match store.user_by_username(config.judge_username()).await? {
        Some(user) if user.role == Role::Judge => Ok(()),
        Some(user) => {
            warn!(
                "Bootstrap judge username {} belongs to a {}",
                user.username, user.role
            );
            Ok(())
        }
        None => {
            let spec = UserSpec {
                username: config.judge_username().to_string(),
                password: config.judge_password().to_string(),
                role: Role::Judge,
                display_name: Some("Judge".to_string()),
                grade: None,
            };
            let judge = store.insert_user(NewUser::try_from(spec)?).await?;
            info!("Created bootstrap judge {} ({})", judge.id, judge.username);
            Ok(())
        }
    }
}

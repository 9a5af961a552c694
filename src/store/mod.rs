//! The entity store: keyed storage for users, candidates and votes.
//!
//! One implementation exists per backend; which one runs is decided once at
//! ignite (see [`crate::config::StoreFairing`]). The store carries no business
//! rules beyond identity assignment and the atomic vote commit.

pub mod memory;
pub mod mongo;

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    common::{CandidateId, UserId},
    db::{
        candidate::{Candidate, CandidateFilter, CandidateUpdate, NewCandidate},
        user::{NewUser, User},
        vote::{NewVote, Vote, VoteFilter},
    },
};

/// The store handle placed in Rocket's managed state.
pub type Store = Arc<dyn EntityStore>;

/// Outcome of the atomic vote-commit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteCommit {
    /// The vote was inserted and the voter's `has_voted` flag set.
    Committed(Vote),
    /// The voter had already voted; nothing was written.
    AlreadyVoted,
    /// The voter does not exist; nothing was written.
    UserNotFound,
    /// The candidate does not exist; nothing was written.
    CandidateNotFound,
}

/// Storage for the three entity types.
///
/// Every insert assigns the next unused integer ID for its entity type; IDs
/// are never reused, even after deletion. Lookups of missing IDs return
/// `Ok(None)`. Lists are ordered by ID.
#[rocket::async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a user. Fails with a validation error if the username is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn user(&self, id: UserId) -> Result<Option<User>>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn users(&self) -> Result<Vec<User>>;

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>>;

    async fn candidates(&self, filter: CandidateFilter) -> Result<Vec<Candidate>>;

    /// Apply a partial update, returning the updated candidate.
    async fn update_candidate(
        &self,
        id: CandidateId,
        update: &CandidateUpdate,
    ) -> Result<Option<Candidate>>;

    /// Returns whether a candidate was deleted. Votes for it are left alone.
    async fn delete_candidate(&self, id: CandidateId) -> Result<bool>;

    /// Delete every candidate, returning how many there were.
    async fn delete_all_candidates(&self) -> Result<u64>;

    /// Atomically re-check the voter and candidate, insert the vote and set
    /// the voter's `has_voted` flag. No other caller can observe the vote
    /// without the flag or the flag without the vote, and at most one commit
    /// per voter succeeds.
    async fn commit_vote(&self, vote: NewVote) -> Result<VoteCommit>;

    async fn votes(&self, filter: VoteFilter) -> Result<Vec<Vote>>;

    /// Atomically delete every vote and clear every user's `has_voted` flag,
    /// returning how many votes were deleted.
    async fn reset_votes(&self) -> Result<u64>;
}

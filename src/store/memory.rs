use std::collections::BTreeMap;

use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{
    common::{CandidateId, UserId},
    db::{
        candidate::{Candidate, CandidateFilter, CandidateUpdate, NewCandidate},
        user::{NewUser, User},
        vote::{NewVote, Vote, VoteFilter},
    },
};

use super::{EntityStore, VoteCommit};

/// An entity store held entirely in process memory.
///
/// All tables sit behind one lock, so the vote commit and the reset are
/// trivially atomic with respect to every other operation.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    candidates: BTreeMap<CandidateId, Candidate>,
    votes: BTreeMap<u32, Vote>,
    user_ids: IdCounter,
    candidate_ids: IdCounter,
    vote_ids: IdCounter,
}

/// Hands out 1, 2, 3, ... and never goes back.
#[derive(Default)]
struct IdCounter(u32);

impl IdCounter {
    fn next(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

#[rocket::async_trait]
impl EntityStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(Error::validation(format!(
                "username already in use: {}",
                user.username
            )));
        }
        let id = tables.user_ids.next();
        let user = User { id, user };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut tables = self.tables.write().await;
        let id = tables.candidate_ids.next();
        let candidate = Candidate { id, candidate };
        tables.candidates.insert(id, candidate.clone());
        Ok(candidate)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.tables.read().await.candidates.get(&id).cloned())
    }

    async fn candidates(&self, filter: CandidateFilter) -> Result<Vec<Candidate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .candidates
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn update_candidate(
        &self,
        id: CandidateId,
        update: &CandidateUpdate,
    ) -> Result<Option<Candidate>> {
        let mut tables = self.tables.write().await;
        Ok(tables.candidates.get_mut(&id).map(|candidate| {
            update.apply_to(candidate);
            candidate.clone()
        }))
    }

    async fn delete_candidate(&self, id: CandidateId) -> Result<bool> {
        Ok(self.tables.write().await.candidates.remove(&id).is_some())
    }

    async fn delete_all_candidates(&self) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let count = tables.candidates.len() as u64;
        tables.candidates.clear();
        Ok(count)
    }

    async fn commit_vote(&self, vote: NewVote) -> Result<VoteCommit> {
        let mut tables = self.tables.write().await;
        let tables = &mut *tables;

        if !tables.candidates.contains_key(&vote.candidate_id) {
            return Ok(VoteCommit::CandidateNotFound);
        }
        let voter = match tables.users.get_mut(&vote.voter_id) {
            Some(voter) => voter,
            None => return Ok(VoteCommit::UserNotFound),
        };
        if voter.has_voted {
            return Ok(VoteCommit::AlreadyVoted);
        }

        voter.has_voted = true;
        let id = tables.vote_ids.next();
        let vote = Vote { id, vote };
        tables.votes.insert(id, vote.clone());
        Ok(VoteCommit::Committed(vote))
    }

    async fn votes(&self, filter: VoteFilter) -> Result<Vec<Vote>> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect())
    }

    async fn reset_votes(&self) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let count = tables.votes.len() as u64;
        tables.votes.clear();
        for user in tables.users.values_mut() {
            user.has_voted = false;
        }
        Ok(count)
    }
}

use mongodb::{
    bson::doc,
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use std::time::Duration;

use rocket::{futures::TryStreamExt, tokio::time::sleep};

use crate::error::{Error, Result};
use crate::model::{
    common::{CandidateId, UserId},
    db::{
        candidate::{Candidate, CandidateFilter, CandidateUpdate, NewCandidate},
        user::{NewUser, User},
        vote::{NewVote, Vote, VoteFilter},
    },
    mongodb::{
        ensure_counters_exist, ensure_indexes_exist, is_duplicate_key_error, u32_id_filter, Coll,
        Counter, CANDIDATE_ID_COUNTER_ID, USER_ID_COUNTER_ID, VOTE_ID_COUNTER_ID,
    },
};

use super::{EntityStore, VoteCommit};

/// How many times a transaction is attempted when MongoDB reports a
/// transient conflict.
const MAX_TRANSACTION_ATTEMPTS: usize = 5;

/// An entity store backed by MongoDB. Requires a replica set, since the vote
/// commit and the reset run as multi-document transactions.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect, then make sure indexes and ID counters exist.
    pub async fn connect(db_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        ensure_counters_exist(&db).await?;
        Ok(Self { client, db })
    }

    fn user_coll(&self) -> Coll<User> {
        Coll::from_db(&self.db)
    }

    fn candidate_coll(&self) -> Coll<Candidate> {
        Coll::from_db(&self.db)
    }

    fn vote_coll(&self) -> Coll<Vote> {
        Coll::from_db(&self.db)
    }

    fn counter_coll(&self) -> Coll<Counter> {
        Coll::from_db(&self.db)
    }

    fn by_id() -> FindOptions {
        FindOptions::builder().sort(doc! { "_id": 1 }).build()
    }

    /// One attempt at the vote transaction. The vote ID is allocated by the
    /// caller, outside the transaction, so that concurrent voters do not
    /// conflict on the counter.
    async fn try_commit_vote(
        &self,
        session: &mut ClientSession,
        vote: &Vote,
    ) -> std::result::Result<VoteCommit, DbError> {
        session.start_transaction(None).await?;

        let candidate = self
            .candidate_coll()
            .find_one_with_session(u32_id_filter(vote.candidate_id), None, session)
            .await?;
        if candidate.is_none() {
            session.abort_transaction().await?;
            return Ok(VoteCommit::CandidateNotFound);
        }

        // Flip the flag only if it is still clear; this is the commit-time
        // re-check that closes the race between concurrent requests.
        let filter = doc! {
            "_id": vote.voter_id,
            "has_voted": false,
        };
        let update = doc! {
            "$set": { "has_voted": true }
        };
        let flipped = self
            .user_coll()
            .update_one_with_session(filter, update, None, session)
            .await?;
        if flipped.matched_count == 0 {
            let voter = self
                .user_coll()
                .find_one_with_session(u32_id_filter(vote.voter_id), None, session)
                .await?;
            session.abort_transaction().await?;
            return Ok(match voter {
                Some(_) => VoteCommit::AlreadyVoted,
                None => VoteCommit::UserNotFound,
            });
        }

        if let Err(e) = self
            .vote_coll()
            .insert_one_with_session(vote, None, session)
            .await
        {
            session.abort_transaction().await?;
            return if is_duplicate_key_error(&e) {
                Ok(VoteCommit::AlreadyVoted)
            } else {
                Err(e)
            };
        }

        commit_with_retry(session).await?;
        Ok(VoteCommit::Committed(vote.clone()))
    }

    async fn try_reset_votes(
        &self,
        session: &mut ClientSession,
    ) -> std::result::Result<u64, DbError> {
        session.start_transaction(None).await?;
        let deleted = self
            .vote_coll()
            .delete_many_with_session(doc! {}, None, session)
            .await?;
        let update = doc! {
            "$set": { "has_voted": false }
        };
        self.user_coll()
            .update_many_with_session(doc! {}, update, None, session)
            .await?;
        commit_with_retry(session).await?;
        Ok(deleted.deleted_count)
    }
}

/// Commit, retrying while the outcome of the commit is unknown.
async fn commit_with_retry(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempts < MAX_TRANSACTION_ATTEMPTS =>
            {
                warn!("Transaction commit result unknown, retrying: {e}");
            }
            result => return result,
        }
    }
}

/// Whether a failed transaction should be run again from the start.
fn is_transient(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

/// Linear backoff between transaction attempts.
fn backoff(attempts: usize) -> Duration {
    Duration::from_millis(10 * attempts as u64)
}

#[rocket::async_trait]
impl EntityStore for MongoStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let id = Counter::next(&self.counter_coll(), USER_ID_COUNTER_ID).await?;
        let user = User { id, user };
        match self.user_coll().insert_one(&user, None).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::validation(format!(
                "username already in use: {}",
                user.username
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.user_coll().find_one(u32_id_filter(id), None).await?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let filter = doc! {
            "username": username,
        };
        Ok(self.user_coll().find_one(filter, None).await?)
    }

    async fn users(&self) -> Result<Vec<User>> {
        let users = self
            .user_coll()
            .find(None, Self::by_id())
            .await?
            .try_collect()
            .await?;
        Ok(users)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let id = Counter::next(&self.counter_coll(), CANDIDATE_ID_COUNTER_ID).await?;
        let candidate = Candidate { id, candidate };
        self.candidate_coll().insert_one(&candidate, None).await?;
        Ok(candidate)
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.candidate_coll().find_one(u32_id_filter(id), None).await?)
    }

    async fn candidates(&self, filter: CandidateFilter) -> Result<Vec<Candidate>> {
        let candidates = self
            .candidate_coll()
            .find(filter.as_doc(), Self::by_id())
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn update_candidate(
        &self,
        id: CandidateId,
        update: &CandidateUpdate,
    ) -> Result<Option<Candidate>> {
        if update.is_empty() {
            return self.candidate(id).await;
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let update = doc! {
            "$set": update.as_set_doc(),
        };
        Ok(self
            .candidate_coll()
            .find_one_and_update(u32_id_filter(id), update, options)
            .await?)
    }

    async fn delete_candidate(&self, id: CandidateId) -> Result<bool> {
        let result = self.candidate_coll().delete_one(u32_id_filter(id), None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_all_candidates(&self) -> Result<u64> {
        let result = self.candidate_coll().delete_many(doc! {}, None).await?;
        Ok(result.deleted_count)
    }

    async fn commit_vote(&self, vote: NewVote) -> Result<VoteCommit> {
        let id = Counter::next(&self.counter_coll(), VOTE_ID_COUNTER_ID).await?;
        let vote = Vote { id, vote };
        let mut session = self.client.start_session(None).await?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_commit_vote(&mut session, &vote).await {
                Err(e) if is_transient(&e) && attempts < MAX_TRANSACTION_ATTEMPTS => {
                    debug!("Vote transaction for voter {} conflicted, retrying", vote.voter_id);
                    let _ = session.abort_transaction().await;
                    sleep(backoff(attempts)).await;
                }
                result => return Ok(result?),
            }
        }
    }

    async fn votes(&self, filter: VoteFilter) -> Result<Vec<Vote>> {
        let votes = self
            .vote_coll()
            .find(filter.as_doc(), Self::by_id())
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn reset_votes(&self) -> Result<u64> {
        let mut session = self.client.start_session(None).await?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_reset_votes(&mut session).await {
                Err(e) if is_transient(&e) && attempts < MAX_TRANSACTION_ATTEMPTS => {
                    debug!("Vote reset transaction conflicted, retrying");
                    let _ = session.abort_transaction().await;
                    sleep(backoff(attempts)).await;
                }
                result => return Ok(result?),
            }
        }
    }
}

/// These run against a real server and are ignored by default. Point
/// `ROCKET_DB_URI` at a replica set and run with `--ignored`; each test gets
/// its own database, dropped afterwards.
#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        panic::{self, AssertUnwindSafe},
        sync::Arc,
    };

    use rocket::futures::future::join_all;
    use rocket::tokio::runtime::{Builder, Runtime};

    use crate::model::db::{candidate::CandidateCore, user::UserCore, vote::VoteCore};

    use super::*;

    fn runtime(name: &str) -> Runtime {
        Builder::new_multi_thread()
            .thread_name(name)
            .enable_all()
            .build()
            .unwrap()
    }

    /// Run a test on a fresh database, dropping it however the test ends.
    fn with_scratch_db<F, Fut>(test: F)
    where
        F: FnOnce(Arc<MongoStore>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let db_uri = std::env::var("ROCKET_DB_URI").expect("`ROCKET_DB_URI` not set");
        let db_name = format!("queen_poll_test_{}", rand::random::<u32>());

        // Setup and cleanup get their own runtime, since the test's may be
        // poisoned by a panic.
        let outer = runtime("test-setup-cleanup");
        let store = outer
            .block_on(MongoStore::connect(&db_uri, &db_name))
            .unwrap();
        let db = store.db.clone();
        let store = Arc::new(store);

        let inner = runtime("mongo-store-test");
        let result = panic::catch_unwind(AssertUnwindSafe(|| inner.block_on(test(store))));
        drop(inner);

        outer.block_on(db.drop(None)).unwrap();
        if let Err(cause) = result {
            panic::resume_unwind(cause);
        }
    }

    async fn student(store: &MongoStore, username: &str) -> User {
        store
            .insert_user(UserCore::example_student(username, 10))
            .await
            .unwrap()
    }

    async fn candidate(store: &MongoStore) -> Candidate {
        store
            .insert_candidate(CandidateCore::example("Ana", 11))
            .await
            .unwrap()
    }

    #[test]
    #[ignore = "needs a MongoDB replica set at ROCKET_DB_URI"]
    fn concurrent_commits_for_one_voter() {
        with_scratch_db(|store| async move {
            let voter = student(&store, "maria").await;
            let ana = candidate(&store).await;

            let (voter_id, candidate_id) = (voter.id, ana.id);
            let tasks = (0..8).map(|_| {
                let store = store.clone();
                rocket::tokio::spawn(async move {
                    store.commit_vote(VoteCore::new(voter_id, candidate_id)).await
                })
            });
            let outcomes: Vec<VoteCommit> = join_all(tasks)
                .await
                .into_iter()
                .map(|joined| joined.unwrap().unwrap())
                .collect();

            let committed = outcomes
                .iter()
                .filter(|outcome| matches!(outcome, VoteCommit::Committed(_)))
                .count();
            assert_eq!(committed, 1);
            assert!(outcomes
                .iter()
                .all(|outcome| matches!(outcome, VoteCommit::Committed(_) | VoteCommit::AlreadyVoted)));

            let votes = store.votes(VoteFilter::default()).await.unwrap();
            assert_eq!(votes.len(), 1);
            assert!(store.user(voter.id).await.unwrap().unwrap().has_voted);
        });
    }

    #[test]
    #[ignore = "needs a MongoDB replica set at ROCKET_DB_URI"]
    fn unique_voter_index_backs_up_the_flag() {
        with_scratch_db(|store| async move {
            let voter = student(&store, "maria").await;
            let ana = candidate(&store).await;

            // A stray vote that the flag does not know about.
            let stray = Vote {
                id: 1000,
                vote: VoteCore::new(voter.id, ana.id),
            };
            store.vote_coll().insert_one(&stray, None).await.unwrap();

            let outcome = store
                .commit_vote(VoteCore::new(voter.id, ana.id))
                .await
                .unwrap();
            assert_eq!(outcome, VoteCommit::AlreadyVoted);

            // The flag flip was rolled back with the failed insert.
            assert!(!store.user(voter.id).await.unwrap().unwrap().has_voted);
            let votes = store.votes(VoteFilter::default()).await.unwrap();
            assert_eq!(votes.len(), 1);
            assert_eq!(votes[0].id, stray.id);
        });
    }

    #[test]
    #[ignore = "needs a MongoDB replica set at ROCKET_DB_URI"]
    fn reset_clears_votes_and_flags() {
        with_scratch_db(|store| async move {
            let ana = candidate(&store).await;
            let mut voters = vec![];
            for username in ["maria", "lucia", "sofia"] {
                let voter = student(&store, username).await;
                let outcome = store
                    .commit_vote(VoteCore::new(voter.id, ana.id))
                    .await
                    .unwrap();
                assert!(matches!(outcome, VoteCommit::Committed(_)));
                voters.push(voter);
            }

            assert_eq!(store.reset_votes().await.unwrap(), 3);
            assert!(store.votes(VoteFilter::default()).await.unwrap().is_empty());
            assert!(store
                .users()
                .await
                .unwrap()
                .iter()
                .all(|user| !user.has_voted));

            // Vote IDs keep counting after a reset.
            let outcome = store
                .commit_vote(VoteCore::new(voters[0].id, ana.id))
                .await
                .unwrap();
            match outcome {
                VoteCommit::Committed(vote) => assert!(vote.id > 3),
                other => panic!("expected a committed vote, got {other:?}"),
            }
        });
    }
}

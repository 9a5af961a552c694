use crate::error::{Error, Result};
use crate::model::{
    api::auth::Caller,
    common::CandidateId,
    db::vote::{NewVote, Vote},
};
use crate::store::{Store, VoteCommit};

use super::policy::{authenticated, require_judge};

/// Cast the caller's single vote for a candidate.
///
/// The early checks give precise errors cheaply; the store's commit step
/// re-checks everything atomically, so two concurrent requests from the
/// same voter can never both succeed.
pub async fn cast_vote(
    store: &Store,
    caller: Option<&Caller>,
    candidate_id: CandidateId,
) -> Result<Vote> {
    let caller = authenticated(caller)?;
    let voter = store
        .user(caller.id)
        .await?
        .ok_or(Error::UserNotFound(caller.id))?;
    if !voter.is_student() {
        warn!("User {} ({}) tried to vote", voter.id, voter.role);
        return Err(Error::Forbidden("only students may vote".to_string()));
    }
    if voter.has_voted {
        warn!("User {} tried to vote twice", voter.id);
        return Err(Error::AlreadyVoted(voter.id));
    }
    if store.candidate(candidate_id).await?.is_none() {
        return Err(Error::CandidateNotFound(candidate_id));
    }

    match store.commit_vote(NewVote::new(voter.id, candidate_id)).await? {
        VoteCommit::Committed(vote) => {
            info!(
                "User {} voted for candidate {candidate_id} (vote {})",
                voter.id, vote.id
            );
            Ok(vote)
        }
        VoteCommit::AlreadyVoted => {
            warn!("User {} lost a race to vote twice", voter.id);
            Err(Error::AlreadyVoted(voter.id))
        }
        VoteCommit::UserNotFound => Err(Error::UserNotFound(voter.id)),
        VoteCommit::CandidateNotFound => Err(Error::CandidateNotFound(candidate_id)),
    }
}

/// Clear every vote and every `has_voted` flag, keeping candidates
/// (judges only). Returns how many votes were cleared.
pub async fn reset_election(store: &Store, caller: Option<&Caller>) -> Result<u64> {
    let judge = require_judge(caller, "reset the election")?;
    let cleared = store.reset_votes().await?;
    info!("Judge {} reset the election, clearing {cleared} votes", judge.id);
    Ok(cleared)
}

/// Delete every candidate (judges only). Existing votes are left pointing at
/// the deleted candidates until the election is reset too.
pub async fn reset_candidates(store: &Store, caller: Option<&Caller>) -> Result<u64> {
    let judge = require_judge(caller, "reset the candidates")?;
    let deleted = store.delete_all_candidates().await?;
    info!("Judge {} deleted all {deleted} candidates", judge.id);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::futures::future::join_all;

    use super::*;

    use crate::model::{
        common::Role,
        db::{
            candidate::{CandidateCore, CandidateFilter},
            user::{User, UserCore},
            vote::VoteFilter,
        },
    };
    use crate::poll::tally::voting_stats;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: Store,
        judge: Caller,
        students: Vec<Caller>,
        candidates: Vec<CandidateId>,
    }

    async fn fixture(students: usize) -> Fixture {
        let store: Store = Arc::new(MemoryStore::new());
        let judge = store.insert_user(UserCore::example_judge()).await.unwrap();
        let mut callers = Vec::new();
        for i in 0..students {
            let user = store
                .insert_user(UserCore::example_student(&format!("student{i}"), 9))
                .await
                .unwrap();
            callers.push(Caller::from(&user));
        }
        let mut candidates = Vec::new();
        for (name, grade) in [("Ana", 9), ("Bea", 10)] {
            let candidate = store
                .insert_candidate(CandidateCore::example(name, grade))
                .await
                .unwrap();
            candidates.push(candidate.id);
        }
        Fixture {
            store,
            judge: Caller::from(&judge),
            students: callers,
            candidates,
        }
    }

    async fn user(store: &Store, caller: &Caller) -> User {
        store.user(caller.id).await.unwrap().unwrap()
    }

    #[rocket::async_test]
    async fn vote_once() {
        let f = fixture(1).await;
        let student = &f.students[0];

        let vote = cast_vote(&f.store, Some(student), f.candidates[0])
            .await
            .unwrap();
        assert_eq!(vote.voter_id, student.id);
        assert_eq!(vote.candidate_id, f.candidates[0]);
        assert!(user(&f.store, student).await.has_voted);

        let again = cast_vote(&f.store, Some(student), f.candidates[1]).await;
        assert!(matches!(again, Err(Error::AlreadyVoted(id)) if id == student.id));
        assert_eq!(f.store.votes(VoteFilter::all()).await.unwrap(), vec![vote]);
    }

    #[rocket::async_test]
    async fn failures_have_no_side_effects() {
        let f = fixture(1).await;
        let student = &f.students[0];

        let anonymous = cast_vote(&f.store, None, f.candidates[0]).await;
        assert!(matches!(anonymous, Err(Error::NotAuthenticated)));

        let missing = cast_vote(&f.store, Some(student), 999).await;
        assert!(matches!(missing, Err(Error::CandidateNotFound(999))));

        let ghost = Caller {
            id: 999,
            role: Role::Student,
        };
        let ghost_vote = cast_vote(&f.store, Some(&ghost), f.candidates[0]).await;
        assert!(matches!(ghost_vote, Err(Error::UserNotFound(999))));

        let judge_vote = cast_vote(&f.store, Some(&f.judge), f.candidates[0]).await;
        assert!(matches!(judge_vote, Err(Error::Forbidden(_))));

        assert!(f.store.votes(VoteFilter::all()).await.unwrap().is_empty());
        assert!(!user(&f.store, student).await.has_voted);
    }

    #[rocket::async_test]
    async fn concurrent_votes_by_one_voter() {
        // The losing attempts are logged, so show them.
        log4rs_test_utils::test_logging::init_logging_once_for(["queen_poll_backend"], None, None);

        let f = fixture(1).await;
        let student = f.students[0];

        let attempts = (0..16).map(|i| {
            let store = f.store.clone();
            let candidate = f.candidates[i % 2];
            rocket::tokio::spawn(async move { cast_vote(&store, Some(&student), candidate).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(Error::AlreadyVoted(_)))));
        assert_eq!(
            f.store.votes(VoteFilter::voter(student.id)).await.unwrap().len(),
            1
        );
    }

    #[rocket::async_test]
    async fn distinct_voters_are_counted_once_each() {
        let f = fixture(5).await;
        for (i, student) in f.students.iter().enumerate() {
            cast_vote(&f.store, Some(student), f.candidates[i % 2])
                .await
                .unwrap();
        }
        let stats = voting_stats(&f.store, None).await.unwrap();
        assert_eq!(stats.total_votes, 5);
        assert_eq!(stats.total_voters, stats.total_votes);
    }

    #[rocket::async_test]
    async fn reset_election_keeps_candidates() {
        let f = fixture(3).await;
        for student in &f.students {
            cast_vote(&f.store, Some(student), f.candidates[0])
                .await
                .unwrap();
        }

        let rejected = reset_election(&f.store, Some(&f.students[0])).await;
        assert!(matches!(rejected, Err(Error::Forbidden(_))));
        assert_eq!(f.store.votes(VoteFilter::all()).await.unwrap().len(), 3);

        let before = f.store.candidates(CandidateFilter::all()).await.unwrap();
        assert_eq!(reset_election(&f.store, Some(&f.judge)).await.unwrap(), 3);

        let stats = voting_stats(&f.store, None).await.unwrap();
        assert_eq!(stats.total_votes, 0);
        for student in &f.students {
            assert!(!user(&f.store, student).await.has_voted);
        }
        assert_eq!(f.store.candidates(CandidateFilter::all()).await.unwrap(), before);

        // Everyone may vote again.
        cast_vote(&f.store, Some(&f.students[0]), f.candidates[1])
            .await
            .unwrap();
    }

    #[rocket::async_test]
    async fn reset_candidates_orphans_votes() {
        let f = fixture(2).await;
        cast_vote(&f.store, Some(&f.students[0]), f.candidates[0])
            .await
            .unwrap();

        let rejected = reset_candidates(&f.store, Some(&f.students[1])).await;
        assert!(matches!(rejected, Err(Error::Forbidden(_))));
        assert_eq!(reset_candidates(&f.store, Some(&f.judge)).await.unwrap(), 2);

        assert!(f.store.candidates(CandidateFilter::all()).await.unwrap().is_empty());
        assert_eq!(f.store.votes(VoteFilter::all()).await.unwrap().len(), 1);
        let missing = cast_vote(&f.store, Some(&f.students[1]), f.candidates[0]).await;
        assert!(matches!(missing, Err(Error::CandidateNotFound(_))));
    }
}

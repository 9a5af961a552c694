//! Read-only aggregation over the store's current contents.
//!
//! Votes whose candidate no longer exists are skipped, never an error.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    api::results::{CandidateWithVotes, GradeParticipation, TimeRemaining, VotingStats},
    common::{CandidateId, Grade},
    db::{
        candidate::{Candidate, CandidateFilter},
        user::User,
        vote::{Vote, VoteFilter},
    },
};
use crate::store::Store;

/// Every candidate with their vote count, most votes first, ties by ID.
pub fn tally(candidates: Vec<Candidate>, votes: &[Vote]) -> Vec<CandidateWithVotes> {
    let mut counts: HashMap<CandidateId, u64> = HashMap::new();
    for vote in votes {
        *counts.entry(vote.candidate_id).or_default() += 1;
    }

    let mut counted: Vec<(Candidate, u64)> = candidates
        .into_iter()
        .map(|candidate| {
            let votes = counts.get(&candidate.id).copied().unwrap_or(0);
            (candidate, votes)
        })
        .collect();
    counted.sort_by(|(a, a_votes), (b, b_votes)| b_votes.cmp(a_votes).then(a.id.cmp(&b.id)));

    let total: u64 = counted.iter().map(|(_, votes)| votes).sum();
    counted
        .into_iter()
        .map(|(candidate, votes)| CandidateWithVotes {
            candidate: candidate.into(),
            votes,
            percentage: percentage(votes, total),
        })
        .collect()
}

/// `round(candidate_votes / total_votes * 100)`, rounding halves up; 0 when
/// there are no votes.
pub fn percentage(candidate_votes: u64, total_votes: u64) -> u32 {
    if total_votes == 0 {
        return 0;
    }
    let candidate_votes = candidate_votes.min(total_votes);
    // floor(100c/t + 1/2) == floor((200c + t) / 2t)
    ((200 * candidate_votes + total_votes) / (2 * total_votes)) as u32
}

/// Participation statistics as of `now`.
pub fn stats(
    users: &[User],
    candidates: &[Candidate],
    votes: &[Vote],
    closing_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> VotingStats {
    let voters: HashSet<_> = votes.iter().map(|vote| vote.voter_id).collect();
    let students: Vec<&User> = users.iter().filter(|user| user.is_student()).collect();

    VotingStats {
        total_votes: votes.len() as u64,
        total_voters: voters.len() as u64,
        eligible_voters: students.len() as u64,
        most_active_grade: most_active_grade(&students, candidates, votes),
        time_remaining: closing_date.map(|closing_date| TimeRemaining {
            days: (closing_date - now).num_days().max(0),
            closing_date,
        }),
    }
}

/// The grade with the most votes for its candidates per eligible student,
/// ties broken by the lower grade. Grades without students are ignored.
fn most_active_grade(
    students: &[&User],
    candidates: &[Candidate],
    votes: &[Vote],
) -> Option<GradeParticipation> {
    let mut students_per_grade: BTreeMap<Grade, u64> = BTreeMap::new();
    for grade in students.iter().filter_map(|student| student.grade) {
        *students_per_grade.entry(grade).or_default() += 1;
    }

    let grade_of: HashMap<CandidateId, Grade> = candidates
        .iter()
        .map(|candidate| (candidate.id, candidate.grade))
        .collect();
    let mut votes_per_grade: HashMap<Grade, u64> = HashMap::new();
    for grade in votes
        .iter()
        .filter_map(|vote| grade_of.get(&vote.candidate_id))
    {
        *votes_per_grade.entry(*grade).or_default() += 1;
    }

    // Ascending grade order plus a strict comparison keeps the lowest grade
    // on ties. Ratios are compared by cross-multiplication to stay exact.
    let mut best: Option<(Grade, u64, u64)> = None;
    for (&grade, &eligible) in &students_per_grade {
        let cast = votes_per_grade.get(&grade).copied().unwrap_or(0);
        let better = match best {
            None => true,
            Some((_, best_cast, best_eligible)) => cast * best_eligible > best_cast * eligible,
        };
        if better {
            best = Some((grade, cast, eligible));
        }
    }

    best.map(|(grade, cast, eligible)| GradeParticipation {
        grade,
        participation_rate: cast as f64 / eligible as f64,
    })
}

/// Current results, read from the store.
pub async fn results(store: &Store) -> Result<Vec<CandidateWithVotes>> {
    let candidates = store.candidates(CandidateFilter::all()).await?;
    let votes = store.votes(VoteFilter::all()).await?;
    Ok(tally(candidates, &votes))
}

/// Current stats, read from the store.
pub async fn voting_stats(
    store: &Store,
    closing_date: Option<DateTime<Utc>>,
) -> Result<VotingStats> {
    let users = store.users().await?;
    let candidates = store.candidates(CandidateFilter::all()).await?;
    let votes = store.votes(VoteFilter::all()).await?;
    Ok(stats(&users, &candidates, &votes, closing_date, Utc::now()))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, UserId, VoteId},
    db::vote::Vote,
};

/// A vote request from a logged-in student. The voter is the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: CandidateId,
}

/// A committed vote as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDescription {
    pub id: VoteId,
    pub voter_id: UserId,
    pub candidate_id: CandidateId,
    pub timestamp: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            voter_id: vote.vote.voter_id,
            candidate_id: vote.vote.candidate_id,
            timestamp: vote.vote.timestamp,
        }
    }
}

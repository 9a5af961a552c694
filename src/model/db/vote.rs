use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Document};
use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, UserId, VoteId};

/// Core vote data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: UserId,
    pub candidate_id: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl VoteCore {
    /// A vote cast now.
    pub fn new(voter_id: UserId, candidate_id: CandidateId) -> Self {
        Self {
            voter_id,
            candidate_id,
            timestamp: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: VoteId,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}

/// Which votes to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteFilter {
    pub candidate_id: Option<CandidateId>,
    pub voter_id: Option<UserId>,
}

impl VoteFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn candidate(candidate_id: CandidateId) -> Self {
        Self {
            candidate_id: Some(candidate_id),
            voter_id: None,
        }
    }

    pub fn voter(voter_id: UserId) -> Self {
        Self {
            candidate_id: None,
            voter_id: Some(voter_id),
        }
    }

    pub fn matches(&self, vote: &Vote) -> bool {
        self.candidate_id.map_or(true, |id| vote.candidate_id == id)
            && self.voter_id.map_or(true, |id| vote.voter_id == id)
    }

    pub fn as_doc(&self) -> Document {
        let mut filter = Document::new();
        if let Some(candidate_id) = self.candidate_id {
            filter.insert("candidate_id", candidate_id);
        }
        if let Some(voter_id) = self.voter_id {
            filter.insert("voter_id", voter_id);
        }
        filter
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::candidate::CandidateDescription, common::Grade};

/// A candidate annotated with the votes they have received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateWithVotes {
    #[serde(flatten)]
    pub candidate: CandidateDescription,
    pub votes: u64,
    /// Rounded share of all counted votes, 0-100.
    pub percentage: u32,
}

/// Participation summary for the whole poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStats {
    pub total_votes: u64,
    pub total_voters: u64,
    pub eligible_voters: u64,
    pub most_active_grade: Option<GradeParticipation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<TimeRemaining>,
}

/// The grade whose students took part most, relative to its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeParticipation {
    pub grade: Grade,
    /// Votes for this grade's candidates per eligible student in the grade.
    pub participation_rate: f64,
}

/// Countdown to the configured closing date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRemaining {
    pub days: i64,
    pub closing_date: DateTime<Utc>,
}

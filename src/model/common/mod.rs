//! Types shared between the database and API representations.

mod role;

pub use role::Role;

/// Our user IDs are integers.
pub type UserId = u32;
/// Our candidate IDs are integers.
pub type CandidateId = u32;
/// Our vote IDs are integers.
pub type VoteId = u32;
/// A grade (class/section) number. Which grades exist is presentation config.
pub type Grade = u32;

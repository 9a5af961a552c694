//! The poll's business rules, independent of HTTP.
//!
//! - [`policy`]: who may mutate candidates and reset the election.
//! - [`voting`]: the one-vote-per-voter cast, and the resets.
//! - [`tally`]: vote counts, percentages and participation stats.
//! - [`candidates`] and [`users`]: judge-gated management of the entities.

pub mod candidates;
pub mod policy;
pub mod tally;
pub mod users;
pub mod voting;

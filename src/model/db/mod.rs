//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs are stored under `_id`.
//! - Datetimes are serialised in MongoDB's own format.
//!
//! They are also the in-memory representation used by every store backend.

pub mod candidate;
pub mod user;
pub mod vote;

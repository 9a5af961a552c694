//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - Field names are camelCase.
//! - IDs are plain integers under `id`.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod auth;
pub mod candidate;
pub mod reset;
pub mod results;
pub mod user;
pub mod vote;

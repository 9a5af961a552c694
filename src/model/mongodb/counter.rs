use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    Database,
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::collection::Coll;

pub const USER_ID_COUNTER_ID: &str = "users";
pub const CANDIDATE_ID_COUNTER_ID: &str = "candidates";
pub const VOTE_ID_COUNTER_ID: &str = "votes";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    ///
    /// Values handed out are never handed out again, even if the caller
    /// never uses them.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to find counter with ID {id}"),
                )
            })?;
        Ok(counter.next)
    }
}

/// Ensure the ID counters for every entity type exist, starting at 1.
///
/// This operation is idempotent and never resets an existing counter.
pub async fn ensure_counters_exist(db: &Database) -> std::result::Result<(), DbError> {
    let counters = Coll::<Counter>::from_db(db);
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in [USER_ID_COUNTER_ID, CANDIDATE_ID_COUNTER_ID, VOTE_ID_COUNTER_ID] {
        let update = doc! {
            "$setOnInsert": { "next": 1 }
        };
        counters
            .update_one(doc! { "_id": id }, update, upsert.clone())
            .await?;
    }
    Ok(())
}

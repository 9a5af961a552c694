use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{candidate::Candidate, user::User, vote::Vote};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection.
    let user_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Vote collection: one vote per voter, enforced by the database too.
    let vote_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Candidate collection: listing by grade.
    let grade_index = IndexModel::builder().keys(doc! {"grade": 1}).build();
    Coll::<Candidate>::from_db(db)
        .create_index(grade_index, None)
        .await?;

    Ok(())
}

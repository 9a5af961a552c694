mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::u32_id_filter;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, CANDIDATE_ID_COUNTER_ID, USER_ID_COUNTER_ID,
    VOTE_ID_COUNTER_ID,
};
pub use errors::is_duplicate_key_error;

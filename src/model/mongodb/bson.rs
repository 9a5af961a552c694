use mongodb::bson::{doc, Document};

/// Create a filter matching an integer `_id`.
pub fn u32_id_filter(id: u32) -> Document {
    doc! {
        "_id": id,
    }
}

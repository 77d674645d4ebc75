use mongodb::bson::{doc, Document};

/// A filter matching the document with the given integer `_id`.
pub fn id_filter(id: u32) -> Document {
    doc! {
        "_id": id,
    }
}

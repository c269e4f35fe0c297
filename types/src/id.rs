//! Document id conventions
//!
//! Ids take the form `<prefix>/<number>` where the prefix is the lower-cased
//! collection name, so a `User` stored in `Users` becomes `users/1`.
//! Collections split over several shards embed the allocating shard as a
//! leading tag: `<shard>/<prefix>/<number>`.

/// Separator between id segments
pub const ID_SEPARATOR: char = '/';

/// Id prefix for a collection
pub fn collection_prefix(collection: &str) -> String {
    collection.to_lowercase()
}

/// Id for a collection owned by a single shard
pub fn document_id(collection: &str, number: u64) -> String {
    format!("{}{}{}", collection_prefix(collection), ID_SEPARATOR, number)
}

/// Id carrying the owning shard as its leading segment
pub fn tagged_document_id(shard: &str, collection: &str, number: u64) -> String {
    format!(
        "{}{}{}{}{}",
        shard,
        ID_SEPARATOR,
        collection_prefix(collection),
        ID_SEPARATOR,
        number
    )
}

/// Split off a candidate shard tag.
///
/// Returns `(tag, remainder)` when the id has at least three segments. Whether
/// the tag names a real shard is up to the caller.
pub fn split_shard_tag(id: &str) -> Option<(&str, &str)> {
    let (head, rest) = id.split_once(ID_SEPARATOR)?;
    if head.is_empty() || !rest.contains(ID_SEPARATOR) {
        return None;
    }
    Some((head, rest))
}

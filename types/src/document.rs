//! Document and entity key types
//!
//! A document is a JSON body plus a small metadata map. It belongs to a
//! collection and carries an id once one has been assigned, either by the
//! caller or by the HiLo allocator of the shard it was placed on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Metadata entry recording the collection a stored document belongs to
pub const COLLECTION_METADATA_KEY: &str = "@collection";

/// Identity of an entity across the whole sharded store
///
/// The pair (collection, id) resolves to exactly one shard for the
/// lifetime of a registry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    collection: String,
    id: String,
}

impl EntityKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection, self.id)
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}:{})", self.collection, self.id)
    }
}

/// A JSON document routed through the sharded store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, `None` until assigned
    id: Option<String>,
    /// Owning collection (e.g. "Users")
    collection: String,
    /// Document body
    body: Value,
    /// Free-form metadata (collection tag, client annotations)
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl Document {
    /// Create a document without an id
    pub fn new(collection: impl Into<String>, body: Value) -> Self {
        Self {
            id: None,
            collection: collection.into(),
            body,
            metadata: Map::new(),
        }
    }

    /// Create a document with an explicitly supplied id
    pub fn with_id(collection: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(collection, body)
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }

    /// Entity key, available once the document has an id
    pub fn key(&self) -> Option<EntityKey> {
        self.id
            .as_ref()
            .map(|id| EntityKey::new(self.collection.clone(), id.clone()))
    }

    /// Assign the id. Existing ids are overwritten.
    pub fn assign_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Look up a top-level body field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Record the owning collection in the metadata map
    pub fn stamp_collection(&mut self) {
        self.metadata.insert(
            COLLECTION_METADATA_KEY.to_string(),
            Value::String(self.collection.clone()),
        );
    }

    /// Collection recorded in metadata, if stamped
    pub fn stamped_collection(&self) -> Option<&str> {
        self.metadata
            .get(COLLECTION_METADATA_KEY)
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_requires_id() {
        let mut doc = Document::new("Users", json!({ "Name": "Ayende" }));
        assert!(doc.key().is_none());

        doc.assign_id("users/1");
        assert_eq!(doc.key(), Some(EntityKey::new("Users", "users/1")));
    }

    #[test]
    fn test_stamp_collection() {
        let mut doc = Document::with_id("Orders", "orders/3", json!({}));
        assert_eq!(doc.stamped_collection(), None);

        doc.stamp_collection();
        assert_eq!(doc.stamped_collection(), Some("Orders"));
    }

    #[test]
    fn test_entity_key_display() {
        let key = EntityKey::new("Users", "users/7");
        assert_eq!(key.to_string(), "Users:users/7");
        assert_eq!(key.collection(), "Users");
        assert_eq!(key.id(), "users/7");
    }
}

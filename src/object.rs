//! Stored objects and their decoding.
//!
//! The search core treats objects as opaque records owned by the store. An
//! [`ObjectDecoder`] turns a raw record into a [`StoredObject`], keeping only
//! the properties a [`Projection`] asks for.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// A materialized object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// External identifier (primary key in the objects bucket).
    pub id: String,

    /// Internal document id referenced by the inverted index.
    pub doc_id: u64,

    /// Object properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl StoredObject {
    /// Create a new object without properties.
    pub fn new<S: Into<String>>(id: S, doc_id: u64) -> Self {
        StoredObject {
            id: id.into(),
            doc_id,
            properties: Map::new(),
        }
    }

    /// Set a property value.
    pub fn with_property<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Get a property as text, if it is a string.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// Which properties of an object to materialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// Property names to keep; `None` keeps all.
    pub properties: Option<Vec<String>>,
}

impl Projection {
    /// Keep every property.
    pub fn all() -> Self {
        Projection { properties: None }
    }

    /// Keep only the named properties.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection {
            properties: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether property `name` is kept.
    pub fn includes(&self, name: &str) -> bool {
        match &self.properties {
            None => true,
            Some(names) => names.iter().any(|n| n == name),
        }
    }

    /// Drop the properties this projection excludes.
    pub fn apply(&self, object: &mut StoredObject) {
        if self.properties.is_some() {
            object.properties.retain(|name, _| self.includes(name));
        }
    }
}

/// Decodes raw object records.
pub trait ObjectDecoder: Send + Sync + fmt::Debug {
    /// Decode `raw`, materializing only what `projection` asks for.
    fn decode(&self, raw: &[u8], projection: &Projection) -> Result<StoredObject>;
}

/// Decoder for objects stored as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectDecoder;

impl JsonObjectDecoder {
    /// Create a new JSON object decoder.
    pub fn new() -> Self {
        JsonObjectDecoder
    }

    /// Encode an object in the format [`JsonObjectDecoder::decode`] reads.
    pub fn encode(object: &StoredObject) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(object)?)
    }
}

impl ObjectDecoder for JsonObjectDecoder {
    fn decode(&self, raw: &[u8], projection: &Projection) -> Result<StoredObject> {
        let mut object: StoredObject = serde_json::from_slice(raw)?;
        projection.apply(&mut object);
        Ok(object)
    }
}

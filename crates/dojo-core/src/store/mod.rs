//! Persistence collaborator interface.
//!
//! Entities live in a remote document store reachable through simple
//! create/read/update/delete/filter calls. The core never owns that store;
//! it talks to it through the `Store` trait. Two adapters are provided:
//!
//! - `MemoryStore`: in-process documents, used by tests and offline runs
//! - `RestStore`: HTTP client for the hosted entity API

pub mod error;
pub mod memory;
pub mod rest;

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

pub use error::{EntityKind, StoreError, StoreFault, StoreOp};
pub use memory::MemoryStore;
pub use rest::RestStore;

/// Field map sent on create/update.
pub type Fields = Map<String, Value>;

/// A type stored in one of the store's entity collections.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;
}

/// Serialize a value into a field map for `Store::create`.
pub fn into_fields<T: Serialize>(value: &T, kind: EntityKind) -> Result<Fields, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::new(
            kind,
            StoreOp::Create,
            None,
            StoreFault::InvalidResponse(format!("expected an object, got {}", other)),
        )),
        Err(e) => Err(StoreError::new(kind, StoreOp::Create, None, e.into())),
    }
}

/// Equality filter on top-level fields, matching the hosted API's
/// `filter({field: value})` form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    criteria: Fields,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.criteria.insert(field.to_string(), value.into());
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.criteria
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.criteria.clone())
    }
}

/// Generic per-entity CRUD against the remote store.
///
/// `update` takes the revision the caller last read; when given, the store
/// rejects the write with `StoreFault::Conflict` if the record changed since.
pub trait Store: Send + Sync {
    fn list<E: Entity>(&self) -> impl Future<Output = Result<Vec<E>, StoreError>> + Send;

    /// List sorted by a field; a leading `-` sorts descending.
    fn list_sorted<E: Entity>(
        &self,
        sort_key: &str,
    ) -> impl Future<Output = Result<Vec<E>, StoreError>> + Send;

    fn get<E: Entity>(&self, id: &str) -> impl Future<Output = Result<E, StoreError>> + Send;

    fn filter<E: Entity>(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<E>, StoreError>> + Send;

    fn create<E: Entity>(&self, fields: Fields)
        -> impl Future<Output = Result<E, StoreError>> + Send;

    fn update<E: Entity>(
        &self,
        id: &str,
        fields: Fields,
        expected_revision: Option<&str>,
    ) -> impl Future<Output = Result<E, StoreError>> + Send;

    fn delete<E: Entity>(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

//! In-process document store.
//!
//! Documents are kept as JSON, keyed by id, per entity collection. Every
//! write stamps a fresh revision token into `updated_date`, so conditional
//! updates behave like the hosted store's.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::{into_fields, Entity, EntityKind, Fields, Query, Store, StoreError, StoreFault, StoreOp};

const REVISION_FIELD: &str = "updated_date";
const CREATED_FIELD: &str = "created_date";

#[derive(Default)]
struct MemoryState {
    collections: HashMap<EntityKind, BTreeMap<String, Value>>,
    next_id: u64,
    next_revision: u64,
}

impl MemoryState {
    fn revision(&mut self) -> String {
        self.next_revision += 1;
        format!("rev-{:08}", self.next_revision)
    }

    fn generated_id(&mut self, kind: EntityKind) -> String {
        self.next_id += 1;
        format!("{}-{:06}", kind.as_str().to_ascii_lowercase(), self.next_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave a document half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a typed entity as-is. Handy for seeding.
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<(), StoreError> {
        let fields = into_fields(entity, E::KIND)?;
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::new(
                    E::KIND,
                    StoreOp::Create,
                    None,
                    StoreFault::InvalidResponse("entity has no id".to_string()),
                )
            })?;
        let mut state = self.state();
        let mut doc = fields;
        let revision = state.revision();
        doc.insert(REVISION_FIELD.to_string(), Value::String(revision));
        state
            .collections
            .entry(E::KIND)
            .or_default()
            .insert(id, Value::Object(doc));
        Ok(())
    }

    /// Number of documents in a collection.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.state()
            .collections
            .get(&kind)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn decode<E: Entity>(op: StoreOp, id: Option<&str>, doc: &Value) -> Result<E, StoreError> {
        serde_json::from_value(doc.clone())
            .map_err(|e| StoreError::new(E::KIND, op, id, e.into()))
    }

    fn decode_all<E: Entity>(op: StoreOp, docs: Vec<Value>) -> Result<Vec<E>, StoreError> {
        docs.iter().map(|doc| Self::decode(op, None, doc)).collect()
    }

    fn snapshot(&self, kind: EntityKind) -> Vec<Value> {
        self.state()
            .collections
            .get(&kind)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// Order JSON values the way a document store sorts a column: nulls first,
/// then numbers, then strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

impl Store for MemoryStore {
    async fn list<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        Self::decode_all(StoreOp::List, self.snapshot(E::KIND))
    }

    async fn list_sorted<E: Entity>(&self, sort_key: &str) -> Result<Vec<E>, StoreError> {
        let (field, descending) = match sort_key.strip_prefix('-') {
            Some(field) => (field, true),
            None => (sort_key, false),
        };
        let mut docs = self.snapshot(E::KIND);
        // Stable, so documents with equal keys keep id order.
        docs.sort_by(|a, b| {
            let ord = compare_values(a.get(field), b.get(field));
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        Self::decode_all(StoreOp::List, docs)
    }

    async fn get<E: Entity>(&self, id: &str) -> Result<E, StoreError> {
        let doc = self
            .state()
            .collections
            .get(&E::KIND)
            .and_then(|docs| docs.get(id))
            .cloned()
            .ok_or_else(|| StoreError::new(E::KIND, StoreOp::Get, Some(id), StoreFault::NotFound))?;
        Self::decode(StoreOp::Get, Some(id), &doc)
    }

    async fn filter<E: Entity>(&self, query: &Query) -> Result<Vec<E>, StoreError> {
        let docs = self
            .snapshot(E::KIND)
            .into_iter()
            .filter(|doc| query.matches(doc))
            .collect();
        Self::decode_all(StoreOp::Filter, docs)
    }

    async fn create<E: Entity>(&self, fields: Fields) -> Result<E, StoreError> {
        let doc = {
            let mut state = self.state();
            let id = match fields.get("id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => state.generated_id(E::KIND),
            };
            let exists = state
                .collections
                .get(&E::KIND)
                .is_some_and(|docs| docs.contains_key(&id));
            if exists {
                return Err(StoreError::new(
                    E::KIND,
                    StoreOp::Create,
                    Some(&id),
                    StoreFault::Conflict,
                ));
            }

            let mut doc = fields;
            doc.insert("id".to_string(), Value::String(id.clone()));
            doc.entry(CREATED_FIELD.to_string())
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            let revision = state.revision();
            doc.insert(REVISION_FIELD.to_string(), Value::String(revision));

            let doc = Value::Object(doc);
            state
                .collections
                .entry(E::KIND)
                .or_default()
                .insert(id.clone(), doc.clone());
            debug!(kind = %E::KIND, id = %id, "Created document");
            doc
        };
        Self::decode(StoreOp::Create, None, &doc)
    }

    async fn update<E: Entity>(
        &self,
        id: &str,
        fields: Fields,
        expected_revision: Option<&str>,
    ) -> Result<E, StoreError> {
        let doc = {
            let mut state = self.state();
            let revision = state.revision();
            let doc = state
                .collections
                .get_mut(&E::KIND)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| {
                    StoreError::new(E::KIND, StoreOp::Update, Some(id), StoreFault::NotFound)
                })?;

            if let Some(expected) = expected_revision {
                let current = doc.get(REVISION_FIELD).and_then(Value::as_str);
                if current != Some(expected) {
                    return Err(StoreError::new(
                        E::KIND,
                        StoreOp::Update,
                        Some(id),
                        StoreFault::Conflict,
                    ));
                }
            }

            if let Value::Object(map) = doc {
                for (field, value) in fields {
                    if field != "id" {
                        map.insert(field, value);
                    }
                }
                map.insert(REVISION_FIELD.to_string(), Value::String(revision));
            }
            doc.clone()
        };
        Self::decode(StoreOp::Update, Some(id), &doc)
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<(), StoreError> {
        let removed = self
            .state()
            .collections
            .get_mut(&E::KIND)
            .and_then(|docs| docs.remove(id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::new(
                E::KIND,
                StoreOp::Delete,
                Some(id),
                StoreFault::NotFound,
            )),
        }
    }
}

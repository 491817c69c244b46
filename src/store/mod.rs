//! Document store port used by the ministering engine.
//!
//! The engine only talks to collections of JSON documents through
//! [`DocumentStore`], and to a small key-value area through [`MarkerStore`].
//! [`sqlite::SqliteStore`] is the shipped adapter.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub mod sqlite;
#[cfg(test)]
pub mod testing;

pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Sentinel replaced by the store's own clock when the write lands.
pub fn server_timestamp() -> Value {
    json!({ SERVER_TIMESTAMP_KEY: true })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true))
        }
        _ => false,
    }
}

pub(crate) fn resolve_server_timestamps(value: &mut Value, resolved: &str) {
    if is_server_timestamp(value) {
        *value = Value::String(resolved.to_string());
        return;
    }
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                resolve_server_timestamps(child, resolved);
            }
        }
        Value::Array(items) => {
            for child in items {
                resolve_server_timestamps(child, resolved);
            }
        }
        _ => {}
    }
}

pub fn new_document_id() -> String {
    Uuid::now_v7().simple().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|source| StoreError::Decode {
            collection: collection.to_string(),
            id: self.id.clone(),
            source,
        })
    }

    pub fn field(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.data, |current, segment| current.get(segment))
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    let data = serde_json::to_value(value)?;
    if !data.is_object() {
        return Err(StoreError::InvalidDocument(
            "documents must serialize to a JSON object".to_string(),
        ));
    }
    Ok(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        let actual = document.field(&self.field);
        match self.op {
            FilterOp::Eq => actual == Some(&self.value),
            FilterOp::ArrayContains => actual
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(&self.value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies filters, ordering, and limit to an unordered collection scan.
    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut matched = documents
            .into_iter()
            .filter(|document| self.filters.iter().all(|filter| filter.matches(document)))
            .collect::<Vec<_>>();

        if let Some(order) = &self.order_by {
            matched.sort_by(|left, right| {
                let ordering = compare_values(left.field(&order.field), right.field(&order.field))
                    .then_with(|| left.id.cmp(&right.id));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (left, right) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub merge: bool,
}

impl SetOptions {
    pub fn overwrite() -> Self {
        Self { merge: false }
    }

    pub fn merge() -> Self {
        Self { merge: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Value,
        options: SetOptions,
    },
    Update {
        collection: String,
        id: String,
        patch: Map<String, Value>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn set(collection: &str, id: &str, data: Value, options: SetOptions) -> Self {
        WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
            options,
        }
    }

    pub fn update(collection: &str, id: &str, patch: Map<String, Value>) -> Self {
        WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Merges top-level fields of `patch` into `target`.
pub(crate) fn merge_fields(target: &mut Value, patch: &Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
    }
}

pub trait DocumentStore {
    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    fn set(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        options: SetOptions,
    ) -> Result<(), StoreError>;

    /// Partial update; fails with [`StoreError::NotFound`] when the document is missing.
    fn update(&self, collection: &str, id: &str, patch: &Map<String, Value>)
        -> Result<(), StoreError>;

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Applies every op or none of them.
    fn commit_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError>;

    /// Runs `body` inside the store's native transaction when it has one.
    /// Adapters without transactions call `body(self)` directly.
    fn run_atomic(
        &self,
        body: &mut dyn FnMut(&dyn DocumentStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}

pub trait MarkerStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Db(rusqlite::Error),
    Json(serde_json::Error),
    NotFound {
        collection: String,
        id: String,
    },
    Decode {
        collection: String,
        id: String,
        source: serde_json::Error,
    },
    InvalidDocument(String),
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Db(err) => write!(f, "database error: {}", err),
            StoreError::Json(err) => write!(f, "document encoding error: {}", err),
            StoreError::NotFound { collection, id } => {
                write!(f, "document '{}/{}' not found", collection, id)
            }
            StoreError::Decode {
                collection,
                id,
                source,
            } => write!(f, "document '{}/{}' is malformed: {}", collection, id, source),
            StoreError::InvalidDocument(message) => write!(f, "invalid document: {}", message),
            StoreError::Unavailable(message) => write!(f, "store unavailable: {}", message),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Db(err) => Some(err),
            StoreError::Json(err) => Some(err),
            StoreError::Decode { source, .. } => Some(source),
            StoreError::NotFound { .. } => None,
            StoreError::InvalidDocument(_) => None,
            StoreError::Unavailable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Db(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Json(value)
    }
}

/// Document store abstraction
///
/// The blog keeps all durable state in a document database addressed by
/// collection name and document id. This module defines:
/// - `DocumentStore`: the trait every backend implements
/// - `Query`: single-field equality filter + single-field ordering
/// - `ServerClock`: the server-assigned `createdAt` stamp used by `add`
///
/// Backends:
/// - `memory`: process-local store for development and tests
/// - `postgres`: JSONB documents in PostgreSQL via sqlx
pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use thiserror::Error;

/// Field stamped by the store on every `add`.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Raw document body.
pub type Document = Map<String, Value>;

/// Mutation applied atomically by `DocumentStore::modify`.
///
/// Receives the current document (if any) and returns its replacement.
/// Returning an error aborts the write and leaves the document untouched.
pub type Mutation = Box<dyn FnOnce(Option<Document>) -> StoreResult<Document> + Send>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// A document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Document,
}

impl DocumentSnapshot {
    /// Deserialize the document body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

/// Serialize a record into a document body.
pub fn encode<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Query over one collection: optional `field == value` filter and optional
/// ordering by one field. Ties are broken by insertion order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = Some((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    /// Whether a document passes the equality filter.
    pub fn matches(&self, data: &Document) -> bool {
        match &self.filter {
            Some((field, value)) => data.get(field) == Some(value),
            None => true,
        }
    }
}

/// Total order over JSON values used for `order_by`.
///
/// Missing fields sort first; numbers compare numerically, strings
/// lexicographically. Values of different kinds compare by kind.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => rank(a).cmp(&rank(b)),
        },
    }
}

/// Monotonic microsecond clock for server-assigned timestamps.
///
/// Two stamps from the same clock are never equal, so ordering by
/// `createdAt` is total even for writes landing in the same microsecond.
#[derive(Debug, Default)]
pub struct ServerClock {
    last: AtomicI64,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_micros(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        let mut prev = self.last.load(AtomicOrdering::Relaxed);
        loop {
            let next = if now > prev { now } else { prev + 1 };
            match self.last.compare_exchange_weak(
                prev,
                next,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Remote document database contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id and `createdAt` stamp.
    async fn add(&self, collection: &str, data: Document) -> StoreResult<DocumentSnapshot>;

    /// Create or overwrite a document under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>>;

    /// Shallow-merge `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()>;

    /// Atomic read-modify-write of a single document.
    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> StoreResult<DocumentSnapshot>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    async fn query(&self, collection: &str, query: Query) -> StoreResult<Vec<DocumentSnapshot>>;

    async fn ping(&self) -> StoreResult<()>;
}

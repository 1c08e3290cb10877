use super::{
    compare_values, Direction, Document, DocumentSnapshot, DocumentStore, Mutation, Query,
    ServerClock, StoreError, StoreResult, CREATED_AT_FIELD,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    data: Document,
}

#[derive(Debug, Default)]
struct Collections {
    next_seq: u64,
    collections: HashMap<String, HashMap<String, StoredDocument>>,
}

impl Collections {
    fn write(&mut self, collection: &str, id: &str, data: Document) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(existing) => existing.data = data,
            None => {
                self.next_seq += 1;
                docs.insert(
                    id.to_string(),
                    StoredDocument {
                        seq: self.next_seq,
                        data,
                    },
                );
            }
        }
    }

    fn read(&self, collection: &str, id: &str) -> Option<&StoredDocument> {
        self.collections.get(collection).and_then(|docs| docs.get(id))
    }
}

/// In-process document store.
///
/// All collections live behind one lock, so `modify` is trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Collections>,
    clock: ServerClock,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .collections
            .get(collection)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(&self, collection: &str, mut data: Document) -> StoreResult<DocumentSnapshot> {
        let id = Uuid::new_v4().to_string();
        data.insert(
            CREATED_AT_FIELD.to_string(),
            Value::from(self.clock.now_micros()),
        );

        self.inner.write().await.write(collection, &id, data.clone());
        Ok(DocumentSnapshot { id, data })
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()> {
        self.inner.write().await.write(collection, id, data);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        let guard = self.inner.read().await;
        Ok(guard.read(collection, id).map(|doc| DocumentSnapshot {
            id: id.to_string(),
            data: doc.data.clone(),
        }))
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        let doc = guard
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        for (key, value) in fields {
            doc.data.insert(key, value);
        }
        Ok(())
    }

    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> StoreResult<DocumentSnapshot> {
        let mut guard = self.inner.write().await;
        let current = guard.read(collection, id).map(|doc| doc.data.clone());
        let next = mutation(current)?;
        guard.write(collection, id, next.clone());

        Ok(DocumentSnapshot {
            id: id.to_string(),
            data: next,
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        Ok(guard
            .collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn query(&self, collection: &str, query: Query) -> StoreResult<Vec<DocumentSnapshot>> {
        let guard = self.inner.read().await;
        let Some(docs) = guard.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(&String, &StoredDocument)> = docs
            .iter()
            .filter(|(_, doc)| query.matches(&doc.data))
            .collect();

        matched.sort_by(|(_, a), (_, b)| {
            let by_field = match &query.order_by {
                Some((field, direction)) => {
                    let ord = compare_values(a.data.get(field), b.data.get(field));
                    match direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                }
                None => std::cmp::Ordering::Equal,
            };
            by_field.then(a.seq.cmp(&b.seq))
        });

        Ok(matched
            .into_iter()
            .map(|(id, doc)| DocumentSnapshot {
                id: id.clone(),
                data: doc.data.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

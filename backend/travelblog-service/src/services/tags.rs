/// Region tag index - maps a region to the ids of posts tagged with it
use crate::error::Result;
use crate::models::{Region, TagIndexEntry, TagRecord};
use crate::store::{encode, Document, DocumentStore, StoreResult};
use std::sync::Arc;

const TAGS: &str = "tags";

pub struct TagIndexer {
    store: Arc<dyn DocumentStore>,
}

impl TagIndexer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Add `post_id` to the entry for `region`, creating the entry on first use.
    ///
    /// Runs as a single atomic read-modify-write; an id already present is
    /// left as is.
    pub async fn record_tag(&self, region: Region, post_id: &str) -> Result<TagIndexEntry> {
        let id = post_id.to_string();
        let snapshot = self
            .store
            .modify(
                TAGS,
                region.as_str(),
                Box::new(move |current: Option<Document>| -> StoreResult<Document> {
                    let mut record = match current {
                        Some(data) => {
                            serde_json::from_value::<TagRecord>(serde_json::Value::Object(data))?
                        }
                        None => TagRecord::default(),
                    };
                    if !record.post_ids.contains(&id) {
                        record.post_ids.push(id);
                    }
                    encode(&record)
                }),
            )
            .await?;

        let record: TagRecord = snapshot.decode()?;
        tracing::debug!(%region, post_id, size = record.post_ids.len(), "tag index updated");

        Ok(TagIndexEntry {
            region,
            post_ids: record.post_ids,
        })
    }

    /// Post ids tagged with `region`; empty when the region was never used.
    pub async fn posts_for(&self, region: Region) -> Result<Vec<String>> {
        match self.store.get(TAGS, region.as_str()).await? {
            Some(snapshot) => Ok(snapshot.decode::<TagRecord>()?.post_ids),
            None => Ok(Vec::new()),
        }
    }
}

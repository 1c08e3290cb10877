//! Shared helpers for integration tests.
//!
//! `FlakyStore` wraps the in-memory document store and can be told to fail
//! selected operations with a backend error, so tests can check that a
//! `TransportError` leaves local state untouched. It can also park the next
//! matching call until `resume`, to interleave concurrent operations.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use travelblog_service::config::{
    AppConfig, AuthConfig, Config, CorsConfig, DocumentBackend, DocumentStoreConfig, FeedConfig,
    StorageBackend, StorageConfig,
};
use travelblog_service::models::UserIdentity;
use travelblog_service::services::{FeedController, ImageUpload, PostDraft};
use travelblog_service::storage::MemoryObjectStorage;
use travelblog_service::store::{
    Document, DocumentSnapshot, DocumentStore, MemoryDocumentStore, Mutation, Query, StoreError,
    StoreResult,
};

pub const MEDIA_BASE_URL: &str = "http://localhost:8080/api/v1/media";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Set,
    Get,
    Update,
    Modify,
    Delete,
    Query,
}

/// Document store double with injectable failures and a call counter.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryDocumentStore,
    failures: Mutex<HashSet<(Op, String)>>,
    calls: AtomicUsize,
    pause: Mutex<Option<(Op, String)>>,
    paused: Notify,
    released: Notify,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` on `collection` fail until `heal` is called.
    pub fn fail_on(&self, op: Op, collection: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert((op, collection.to_string()));
    }

    /// Fail every operation on `collection`.
    pub fn fail_all(&self, collection: &str) {
        for op in [
            Op::Add,
            Op::Set,
            Op::Get,
            Op::Update,
            Op::Modify,
            Op::Delete,
            Op::Query,
        ] {
            self.fail_on(op, collection);
        }
    }

    /// Park the next `op` on `collection` until `resume` is called.
    pub fn pause_next(&self, op: Op, collection: &str) {
        *self.pause.lock().unwrap() = Some((op, collection.to_string()));
    }

    /// Wait until a call is parked by `pause_next`.
    pub async fn wait_paused(&self) {
        self.paused.notified().await;
    }

    pub fn resume(&self) {
        self.released.notify_one();
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.inner.len(collection).await
    }

    async fn enter(&self, op: Op, collection: &str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let parked = {
            let mut pause = self.pause.lock().unwrap();
            match pause.as_ref() {
                Some((o, c)) if *o == op && c == collection => pause.take().is_some(),
                _ => false,
            }
        };
        if parked {
            self.paused.notify_one();
            self.released.notified().await;
        }

        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(op, collection.to_string()))
        {
            return Err(StoreError::Backend(format!(
                "injected {:?} failure on {}",
                op, collection
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn add(&self, collection: &str, data: Document) -> StoreResult<DocumentSnapshot> {
        self.enter(Op::Add, collection).await?;
        self.inner.add(collection, data).await
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> StoreResult<()> {
        self.enter(Op::Set, collection).await?;
        self.inner.set(collection, id, data).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<DocumentSnapshot>> {
        self.enter(Op::Get, collection).await?;
        self.inner.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        self.enter(Op::Update, collection).await?;
        self.inner.update(collection, id, fields).await
    }

    async fn modify(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> StoreResult<DocumentSnapshot> {
        self.enter(Op::Modify, collection).await?;
        self.inner.modify(collection, id, mutation).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.enter(Op::Delete, collection).await?;
        self.inner.delete(collection, id).await
    }

    async fn query(&self, collection: &str, query: Query) -> StoreResult<Vec<DocumentSnapshot>> {
        self.enter(Op::Query, collection).await?;
        self.inner.query(collection, query).await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct Harness {
    pub feed: FeedController,
    pub store: Arc<FlakyStore>,
    pub storage: Arc<MemoryObjectStorage>,
}

pub fn harness() -> Harness {
    let store = Arc::new(FlakyStore::new());
    let storage = Arc::new(MemoryObjectStorage::new(MEDIA_BASE_URL));
    let feed = FeedController::new(store.clone(), storage.clone(), 64 * 1024);
    Harness {
        feed,
        store,
        storage,
    }
}

pub fn user(uid: &str, name: &str) -> UserIdentity {
    UserIdentity {
        uid: uid.to_string(),
        display_name: name.to_string(),
        email: format!("{}@travelblog.dev", uid),
        photo_url: None,
    }
}

pub fn png() -> ImageUpload {
    ImageUpload {
        file_name: "photo.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
    }
}

pub fn draft(text: &str, region: &str) -> PostDraft {
    PostDraft {
        text: text.to_string(),
        region: Some(region.to_string()),
        image: Some(png()),
    }
}

pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            env: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        cors: CorsConfig {
            allowed_origins: "http://localhost:3000".to_string(),
        },
        documents: DocumentStoreConfig {
            backend: DocumentBackend::Memory,
            url: String::new(),
            max_connections: 1,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            project_id: "travelblog-test".to_string(),
            bucket: "travelblog-test-images".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            public_base_url: MEDIA_BASE_URL.to_string(),
        },
        auth: AuthConfig {
            jwt_secret: "integration-test-secret".to_string(),
            session_ttl_secs: 3_600,
        },
        feed: FeedConfig {
            max_image_bytes: 64 * 1024,
        },
    }
}

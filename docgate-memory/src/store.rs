//! In-memory storage implementation for the gateway.
//!
//! Documents are kept as BSON maps per collection, ordered by ID, behind one async-aware
//! read-write lock. Batches run under a single write guard and are therefore atomic.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::debug;
use uuid::Uuid;

use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::DocumentId,
    error::{GatewayError, GatewayResult},
    query::{Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup};

type CollectionMap = BTreeMap<DocumentId, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// Clones share the same underlying data. Queries scan the whole collection; natural
/// order is ascending document ID.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.create_document("incomes", doc! { "amount": 100 }).await?;
/// assert!(store.get_document("incomes", &id).await?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document ID -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`, optionally pre-seeded.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Writes a document under a caller-chosen ID, replacing any existing one.
    pub async fn put_document(&self, collection: &str, id: impl Into<DocumentId>, data: Document) {
        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), data);
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, CollectionMap::len)
    }
}

/// Sets `value` at a dotted path, creating intermediate maps and replacing non-map values
/// standing in the way.
fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> GatewayResult<Option<Document>> {
        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|documents| documents.get(id))
                .cloned()
        )
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> GatewayResult<Vec<(DocumentId, Document)>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = Vec::new();
        for (id, document) in collection_map {
            if DocumentEvaluator::new(document).evaluate(&query.predicates)? {
                matched.push((id, document));
            }
        }

        if let Some(order_by) = &query.order_by {
            matched.retain(|(_, document)| lookup(document, &order_by.field).is_some());
            matched.sort_by(|(_, a), (_, b)| {
                let left = lookup(a, &order_by.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup(b, &order_by.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match order_by.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                }
            });
        }

        Ok(
            matched
                .into_iter()
                .take(query.limit.unwrap_or(usize::MAX))
                .map(|(id, document)| (id.clone(), document.clone()))
                .collect()
        )
    }

    async fn create_document(&self, collection: &str, data: Document) -> GatewayResult<DocumentId> {
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);

        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> GatewayResult<()> {
        let mut store = self.store.write().await;
        let Some(document) = store
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
        else {
            return Err(GatewayError::NotFound(id.to_string(), collection.to_string()));
        };

        for (path, value) in patch {
            set_path(document, &path, value);
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &DocumentId) -> GatewayResult<()> {
        if let Some(documents) = self.store.write().await.get_mut(collection) {
            documents.remove(id);
        }

        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: Vec<DocumentId>) -> GatewayResult<()> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(());
        };

        let before = documents.len();
        for id in &ids {
            documents.remove(id);
        }
        debug!(collection, removed = before - documents.len(), "batch applied");

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// let store = InMemoryStore::builder()
///     .with_document("categories", "salary", doc! { "name": "Salary" })
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, DocumentId, Document)>,
}

impl InMemoryStoreBuilder {
    /// Adds a document the store will contain from the start.
    pub fn with_document(
        mut self,
        collection: impl Into<String>,
        id: impl Into<DocumentId>,
        data: Document,
    ) -> Self {
        self.seed.push((collection.into(), id.into(), data));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> GatewayResult<Self::Backend> {
        let mut map = StoreMap::new();

        for (collection, id, data) in self.seed {
            map.entry(collection)
                .or_default()
                .insert(id, data);
        }

        Ok(InMemoryStore { store: Arc::new(RwLock::new(map)) })
    }
}

//! Per-collection gateways.
//!
//! This module provides the accessors that carry out CRUD calls against one collection and
//! hydrate document references on the way out:
//!
//! - [`Collection`] - untyped gateway over raw BSON documents; hydrates every top-level
//!   reference it finds
//! - [`TypedCollection`] - gateway for one [`Entity`] type; hydrates only the fields the
//!   entity declares as references
//!
//! Every document returned by a read carries its store-assigned ID under `id`.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let incomes = store.typed_collection::<Income>();
//!
//! let created = incomes.create(Income { id: None, amount: 100.0, category: Link::to("salary") }).await?;
//! let fetched = incomes.get_by_id(created.id().unwrap()).await?;
//! ```

use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, instrument, warn};

use crate::{
    backend::StoreBackend,
    config::{GatewayConfig, MissingReference},
    document::{DocumentId, DocumentRef, Entity, EntityExt, ID_FIELD, to_document},
    error::{GatewayError, GatewayResult},
    query::{OrderBy, Query, Where},
};

/// Which top-level fields of a record hydration looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationScope {
    /// Every top-level field holding a reference.
    AllFields,
    /// Only the named fields.
    Fields(&'static [&'static str]),
}

impl HydrationScope {
    pub fn includes(&self, field: &str) -> bool {
        match self {
            HydrationScope::AllFields => true,
            HydrationScope::Fields(fields) => fields.contains(&field),
        }
    }
}

/// Result of a `get` call: one document looked up by ID, or the documents a query matched.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Lookup by ID; `None` when the document does not exist.
    One(Option<T>),
    /// Query results, in store order.
    Many(Vec<T>),
}

impl<T> Fetched<T> {
    /// Returns the single result, or the first query result.
    pub fn into_one(self) -> Option<T> {
        match self {
            Fetched::One(item) => item,
            Fetched::Many(items) => items.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Fetched::One(item) => item.into_iter().collect(),
            Fetched::Many(items) => items,
        }
    }

    pub fn try_map<U, F>(self, mut f: F) -> GatewayResult<Fetched<U>>
    where
        F: FnMut(T) -> GatewayResult<U>,
    {
        Ok(match self {
            Fetched::One(item) => Fetched::One(item.map(&mut f).transpose()?),
            Fetched::Many(items) => Fetched::Many(
                items
                    .into_iter()
                    .map(f)
                    .collect::<GatewayResult<Vec<U>>>()?,
            ),
        })
    }
}

/// Builds `{ id, ...data }`. A stray `id` key inside `data` never overrides the store's.
fn with_id(id: &DocumentId, data: Document) -> Document {
    let mut document = Document::new();
    document.insert(ID_FIELD, id.as_str());

    for (key, value) in data {
        if key != ID_FIELD {
            document.insert(key, value);
        }
    }

    document
}

/// Untyped gateway for one collection.
///
/// Holds nothing but the collection name, a shared handle to the backend and the store's
/// configuration; cloning is cheap.
#[derive(Debug)]
pub struct Collection<B: StoreBackend> {
    name: String,
    backend: Arc<B>,
    config: Arc<GatewayConfig>,
}

impl<B: StoreBackend> Clone for Collection<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: StoreBackend> Collection<B> {
    pub(crate) fn new(name: String, backend: Arc<B>, config: Arc<GatewayConfig>) -> Self {
        Self { name, backend, config }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the locator of a document in this collection, without fetching it.
    pub fn doc_ref(&self, id: impl Into<DocumentId>) -> DocumentRef {
        DocumentRef::new(self.name.clone(), id)
    }

    /// Fetches one document by ID, or the documents matching a filter.
    ///
    /// With an `id`, the filter and order are ignored and a missing document yields
    /// `Fetched::One(None)`. Without one, the filter's predicates are AND-combined and the
    /// results come back in store order (or `order_by`). Every returned document is hydrated.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidQuery`] for a malformed filter, and propagates backend
    /// and hydration errors.
    pub async fn get(
        &self,
        id: Option<&DocumentId>,
        filter: Option<Where>,
        order_by: Option<OrderBy>,
    ) -> GatewayResult<Fetched<Document>> {
        self.fetch(id, filter, order_by, HydrationScope::AllFields)
            .await
    }

    /// Fetches one hydrated document by ID.
    pub async fn get_by_id(&self, id: &DocumentId) -> GatewayResult<Option<Document>> {
        self.fetch_one(id, HydrationScope::AllFields)
            .await
    }

    /// Fetches the hydrated documents matching a filter.
    pub async fn find(
        &self,
        filter: Option<Where>,
        order_by: Option<OrderBy>,
    ) -> GatewayResult<Vec<Document>> {
        self.fetch_many(Query::from_parts(filter, order_by), HydrationScope::AllFields)
            .await
    }

    /// Runs a structured query and hydrates the results.
    pub async fn query(&self, query: Query) -> GatewayResult<Vec<Document>> {
        self.fetch_many(query, HydrationScope::AllFields)
            .await
    }

    /// Persists a new document and returns it merged with the assigned ID.
    ///
    /// An `id` key in `data` is dropped before it reaches the store.
    #[instrument(level = "debug", skip_all, fields(collection = %self.name))]
    pub async fn create(&self, mut data: Document) -> GatewayResult<Document> {
        if data.remove(ID_FIELD).is_some() {
            debug!("dropped caller-supplied id");
        }

        let id = self
            .backend
            .create_document(&self.name, data.clone())
            .await?;
        debug!(%id, "document created");

        Ok(with_id(&id, data))
    }

    /// Merges `patch` into the document with the given ID.
    ///
    /// Fields absent from `patch` are left untouched. An `id` key in `patch` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the document does not exist.
    #[instrument(level = "debug", skip_all, fields(collection = %self.name, id = %id))]
    pub async fn update(&self, mut patch: Document, id: &DocumentId) -> GatewayResult<()> {
        patch.remove(ID_FIELD);

        self.backend
            .update_document(&self.name, id, patch)
            .await
    }

    /// Deletes one document by ID, or every document matching a filter as one atomic batch.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AmbiguousDelete`] unless exactly one of `id` and `filter` is
    /// given.
    pub async fn delete(&self, id: Option<&DocumentId>, filter: Option<Where>) -> GatewayResult<()> {
        match (id, filter) {
            (Some(id), None) => self.delete_by_id(id).await,
            (None, Some(filter)) => self.delete_where(filter).await.map(|_| ()),
            _ => Err(GatewayError::AmbiguousDelete),
        }
    }

    /// Deletes one document. Deleting a missing document succeeds.
    #[instrument(level = "debug", skip_all, fields(collection = %self.name, id = %id))]
    pub async fn delete_by_id(&self, id: &DocumentId) -> GatewayResult<()> {
        self.backend
            .delete_document(&self.name, id)
            .await
    }

    /// Deletes every document matching `filter` in one all-or-nothing batch.
    ///
    /// Returns the number of deleted documents.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BatchTooLarge`] without deleting anything when the filter
    /// matches more documents than `max_batch_size`, and
    /// [`GatewayError::PartialBatchFailure`] when a backend without native batches stopped
    /// midway.
    #[instrument(level = "debug", skip_all, fields(collection = %self.name))]
    pub async fn delete_where(&self, filter: impl Into<Where>) -> GatewayResult<usize> {
        let query = Query::from_parts(Some(filter.into()), None);
        query.validate()?;

        let ids = self
            .backend
            .query_documents(&self.name, &query)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        if ids.is_empty() {
            return Ok(0);
        }

        if ids.len() > self.config.max_batch_size {
            return Err(GatewayError::BatchTooLarge {
                collection: self.name.clone(),
                size: ids.len(),
                limit: self.config.max_batch_size,
            });
        }

        let count = ids.len();
        self.backend
            .batch_delete(&self.name, ids)
            .await?;
        debug!(count, "batch delete committed");

        Ok(count)
    }

    /// Replaces top-level reference fields of `record` with the referenced documents.
    ///
    /// Each field in `scope` whose value is a [`DocumentRef`] becomes `{ id, ...fields }` of
    /// the document it points at. Only direct fields are considered; references nested in
    /// maps or arrays, including those inside the inlined document, are left as they are.
    /// References whose document is missing follow the configured [`MissingReference`]
    /// policy.
    pub async fn hydrate_references(
        &self,
        record: &mut Document,
        scope: HydrationScope,
    ) -> GatewayResult<()> {
        let targets = self.reference_targets(record, scope);

        if targets.is_empty() {
            return Ok(());
        }

        for (field, value) in self.resolve_all(targets).await? {
            if let Some(value) = value {
                record.insert(field, value);
            }
        }

        Ok(())
    }

    /// Lists the in-scope top-level fields of `record` holding a reference.
    fn reference_targets(
        &self,
        record: &Document,
        scope: HydrationScope,
    ) -> Vec<(String, DocumentRef)> {
        if !self.config.hydration.enabled {
            return Vec::new();
        }

        record
            .iter()
            .filter(|(field, _)| scope.includes(field))
            .filter_map(|(field, value)| {
                DocumentRef::from_bson(value).map(|reference| (field.clone(), reference))
            })
            .collect()
    }

    /// Resolves every reference with at most `hydration.concurrency` reads in flight,
    /// keeping the input order.
    async fn resolve_all<K: Send>(
        &self,
        targets: Vec<(K, DocumentRef)>,
    ) -> GatewayResult<Vec<(K, Option<Bson>)>> {
        stream::iter(targets)
            .map(|(key, reference)| async move {
                let value = self.resolve(&reference).await?;
                Ok::<_, GatewayError>((key, value))
            })
            .buffered(self.config.hydration.effective_concurrency())
            .try_collect()
            .await
    }

    /// Reads the document behind a reference. `None` keeps the reference in place.
    async fn resolve(&self, reference: &DocumentRef) -> GatewayResult<Option<Bson>> {
        let found = self
            .backend
            .get_document(reference.collection(), reference.id())
            .await?;

        match (found, self.config.hydration.missing) {
            (Some(data), _) => Ok(Some(Bson::Document(with_id(reference.id(), data)))),
            (None, MissingReference::Keep) => {
                warn!(reference = %reference, "referenced document missing, left unresolved");
                Ok(None)
            }
            (None, MissingReference::Null) => {
                warn!(reference = %reference, "referenced document missing, replaced with null");
                Ok(Some(Bson::Null))
            }
            (None, MissingReference::Fail) => Err(GatewayError::DanglingReference(reference.path())),
        }
    }

    pub(crate) async fn fetch(
        &self,
        id: Option<&DocumentId>,
        filter: Option<Where>,
        order_by: Option<OrderBy>,
        scope: HydrationScope,
    ) -> GatewayResult<Fetched<Document>> {
        match id {
            Some(id) => Ok(Fetched::One(self.fetch_one(id, scope).await?)),
            None => Ok(Fetched::Many(
                self.fetch_many(Query::from_parts(filter, order_by), scope)
                    .await?,
            )),
        }
    }

    #[instrument(level = "debug", skip_all, fields(collection = %self.name, id = %id))]
    pub(crate) async fn fetch_one(
        &self,
        id: &DocumentId,
        scope: HydrationScope,
    ) -> GatewayResult<Option<Document>> {
        let Some(data) = self
            .backend
            .get_document(&self.name, id)
            .await?
        else {
            debug!("document not found");
            return Ok(None);
        };

        let mut document = with_id(id, data);
        self.hydrate_references(&mut document, scope)
            .await?;

        Ok(Some(document))
    }

    #[instrument(level = "debug", skip_all, fields(collection = %self.name))]
    pub(crate) async fn fetch_many(
        &self,
        query: Query,
        scope: HydrationScope,
    ) -> GatewayResult<Vec<Document>> {
        query.validate()?;

        let rows = self
            .backend
            .query_documents(&self.name, &query)
            .await?;
        debug!(matched = rows.len(), "query executed");

        let mut documents = rows
            .into_iter()
            .map(|(id, data)| with_id(&id, data))
            .collect::<Vec<_>>();

        // One shared limit for the references of every returned document.
        let targets = documents
            .iter()
            .enumerate()
            .flat_map(|(index, document)| {
                self.reference_targets(document, scope)
                    .into_iter()
                    .map(move |(field, reference)| ((index, field), reference))
            })
            .collect::<Vec<_>>();

        if targets.is_empty() {
            return Ok(documents);
        }

        for ((index, field), value) in self.resolve_all(targets).await? {
            if let Some(value) = value {
                documents[index].insert(field, value);
            }
        }

        Ok(documents)
    }
}

/// Gateway for one entity type.
///
/// Wraps a [`Collection`] and converts between entities and documents. Only the fields
/// listed by [`Entity::reference_fields`] are hydrated.
#[derive(Debug)]
pub struct TypedCollection<B: StoreBackend, T: Entity> {
    inner: Collection<B>,
    _marker: PhantomData<T>,
}

impl<B: StoreBackend, T: Entity> Clone for TypedCollection<B, T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), _marker: PhantomData }
    }
}

impl<B: StoreBackend, T: Entity> TypedCollection<B, T> {
    pub(crate) fn new(inner: Collection<B>) -> Self {
        Self { inner, _marker: PhantomData }
    }

    fn scope() -> HydrationScope {
        HydrationScope::Fields(T::reference_fields())
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped gateway for the same collection.
    pub fn untyped(&self) -> &Collection<B> {
        &self.inner
    }

    /// Views the same collection as a different entity type.
    pub fn with_type<U: Entity>(&self) -> TypedCollection<B, U> {
        TypedCollection::new(self.inner.clone())
    }

    /// Returns the locator of an entity in this collection, without fetching it.
    pub fn doc_ref(&self, id: impl Into<DocumentId>) -> DocumentRef {
        self.inner.doc_ref(id)
    }

    /// Fetches one entity by ID, or the entities matching a filter.
    ///
    /// See [`Collection::get`].
    pub async fn get(
        &self,
        id: Option<&DocumentId>,
        filter: Option<Where>,
        order_by: Option<OrderBy>,
    ) -> GatewayResult<Fetched<T>> {
        self.inner
            .fetch(id, filter, order_by, Self::scope())
            .await?
            .try_map(T::from_document)
    }

    pub async fn get_by_id(&self, id: &DocumentId) -> GatewayResult<Option<T>> {
        self.inner
            .fetch_one(id, Self::scope())
            .await?
            .map(T::from_document)
            .transpose()
    }

    pub async fn find(&self, filter: Option<Where>, order_by: Option<OrderBy>) -> GatewayResult<Vec<T>> {
        self.query(Query::from_parts(filter, order_by))
            .await
    }

    pub async fn query(&self, query: Query) -> GatewayResult<Vec<T>> {
        self.inner
            .fetch_many(query, Self::scope())
            .await?
            .into_iter()
            .map(T::from_document)
            .collect()
    }

    /// Persists a new entity and returns it with the assigned ID.
    ///
    /// Any ID already on `data` is not sent to the store; the returned entity carries the
    /// new one.
    pub async fn create(&self, data: T) -> GatewayResult<T> {
        self.create_document(data.to_document()?)
            .await
    }

    pub(crate) async fn create_document(&self, data: Document) -> GatewayResult<T> {
        T::from_document(self.inner.create(data).await?)
    }

    /// Merges a partial entity into the stored one.
    ///
    /// `patch` is anything that serializes to a map, e.g. a `bson::Document` or a struct
    /// whose optional fields skip serialization when unset.
    pub async fn update<P>(&self, patch: &P, id: &DocumentId) -> GatewayResult<()>
    where
        P: Serialize + ?Sized,
    {
        self.inner
            .update(to_document(patch)?, id)
            .await
    }

    pub async fn delete(&self, id: Option<&DocumentId>, filter: Option<Where>) -> GatewayResult<()> {
        self.inner.delete(id, filter).await
    }

    pub async fn delete_by_id(&self, id: &DocumentId) -> GatewayResult<()> {
        self.inner.delete_by_id(id).await
    }

    pub async fn delete_where(&self, filter: impl Into<Where>) -> GatewayResult<usize> {
        self.inner.delete_where(filter).await
    }
}

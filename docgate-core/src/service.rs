//! Per-entity service facade.
//!
//! An [`EntityService`] fixes the collection from the entity type and exposes the four
//! CRUD calls applications use day to day. It adds one rule of its own: an entity passed
//! to [`EntityService::create`] never carries its `id` to the store.

use bson::Document;
use serde::Serialize;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::{Fetched, TypedCollection},
    document::{DocumentId, DocumentRef, Entity, EntityExt, ID_FIELD},
    error::GatewayResult,
    query::{OrderBy, Where},
    store::DocumentStore,
};

#[derive(Debug)]
pub struct EntityService<T: Entity, B: StoreBackend> {
    collection: TypedCollection<B, T>,
}

impl<T: Entity, B: StoreBackend> Clone for EntityService<T, B> {
    fn clone(&self) -> Self {
        Self { collection: self.collection.clone() }
    }
}

impl<T: Entity, B: StoreBackend> EntityService<T, B> {
    pub fn new(store: &DocumentStore<B>) -> Self {
        Self { collection: store.typed_collection::<T>() }
    }

    /// Returns the underlying gateway, for calls the facade does not expose.
    pub fn collection(&self) -> &TypedCollection<B, T> {
        &self.collection
    }

    pub fn doc_ref(&self, id: impl Into<DocumentId>) -> DocumentRef {
        self.collection.doc_ref(id)
    }

    /// Fetches one entity by ID, or the entities matching a filter.
    pub async fn get(
        &self,
        id: Option<&DocumentId>,
        filter: Option<Where>,
        order_by: Option<OrderBy>,
    ) -> GatewayResult<Fetched<T>> {
        self.collection
            .get(id, filter, order_by)
            .await
    }

    /// Persists a new entity, ignoring any ID it already carries.
    pub async fn create(&self, entity: T) -> GatewayResult<T> {
        let mut data: Document = entity.to_document()?;

        if let Some(id) = data.remove(ID_FIELD) {
            debug!(collection = T::collection_name(), %id, "ignoring id on new entity");
        }

        self.collection
            .create_document(data)
            .await
    }

    /// Merges a partial entity into the stored one.
    pub async fn update<P>(&self, patch: &P, id: &DocumentId) -> GatewayResult<()>
    where
        P: Serialize + ?Sized,
    {
        self.collection.update(patch, id).await
    }

    pub async fn delete(&self, id: &DocumentId) -> GatewayResult<()> {
        self.collection.delete_by_id(id).await
    }
}

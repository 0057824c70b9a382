//! Entry point of the gateway.
//!
//! A [`DocumentStore`] owns one backend and the [`GatewayConfig`] and hands out gateways
//! for individual collections:
//!
//! - [`DocumentStore::collection`] - untyped [`Collection`] by name
//! - [`DocumentStore::typed_collection`] - [`TypedCollection`] for an [`Entity`] type
//! - [`DocumentStore::service`] - [`EntityService`] facade for an [`Entity`] type
//!
//! # Example
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let incomes = store.service::<Income>();
//! ```

use std::sync::Arc;

use crate::{
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    config::GatewayConfig,
    document::Entity,
    error::{GatewayError, GatewayResult},
    service::EntityService,
};

/// A document store bound to a specific backend implementation.
///
/// Gateways handed out by the store share its backend, so they can outlive the borrow
/// they were created from and be cloned into tasks freely.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: Arc<B>,
    config: Arc<GatewayConfig>,
}

impl<B: StoreBackend> Clone for DocumentStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, GatewayConfig::default())
    }

    /// Creates a new document store with the given configuration.
    pub fn with_config(backend: B, config: GatewayConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration shared by every collection of this store.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the backend this store talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets an untyped collection with the given name.
    pub fn collection(&self, name: &str) -> Collection<B> {
        Collection::new(
            name.to_string(),
            Arc::clone(&self.backend),
            Arc::clone(&self.config),
        )
    }

    /// Gets a typed collection for the specified entity type.
    ///
    /// The collection name is determined by the entity's `collection_name()`.
    pub fn typed_collection<T: Entity>(&self) -> TypedCollection<B, T> {
        TypedCollection::new(self.collection(T::collection_name()))
    }

    /// Gets the service facade for the specified entity type.
    pub fn service<T: Entity>(&self) -> EntityService<T, B> {
        EntityService::new(self)
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StoreInUse`] if gateways handed out by this store are still
    /// alive, and otherwise propagates the backend's shutdown error.
    pub async fn shutdown(self) -> GatewayResult<()> {
        let handles = Arc::strong_count(&self.backend) - 1;
        let backend = Arc::into_inner(self.backend).ok_or(GatewayError::StoreInUse(handles))?;

        backend.shutdown().await
    }
}

//! Store client abstraction for the gateway.
//!
//! This module defines the capability the gateway needs from a document database client.
//! Implementations own the connection, persistence and query execution; the gateway only
//! composes calls to them.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the six store operations plus shutdown
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docgate::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.create_document("incomes", doc! { "amount": 100 }).await?;
//! let stored = backend.get_document("incomes", &id).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};
use tracing::debug;

use crate::{
    document::DocumentId,
    error::{GatewayError, GatewayResult},
    query::Query,
};

/// Abstract interface for document database clients.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the gateway shares one instance between all of
/// its collections behind an `Arc`.
///
/// # Error Handling
///
/// Connectivity and server failures should be reported as
/// [`GatewayError::Backend`]; the gateway passes them through unchanged.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Fetches one document by ID.
    ///
    /// Returns `Ok(None)` when the document (or its collection) does not exist. The returned
    /// document holds the stored fields only, not the ID.
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> GatewayResult<Option<Document>>;

    /// Runs a query and returns the matching documents with their IDs.
    ///
    /// Results follow the store's natural order, or `query.order_by` when set. Documents
    /// lacking the sort field are excluded when an order is requested.
    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> GatewayResult<Vec<(DocumentId, Document)>>;

    /// Persists a new document and returns the ID the store assigned to it.
    async fn create_document(&self, collection: &str, data: Document) -> GatewayResult<DocumentId>;

    /// Merges `patch` into an existing document.
    ///
    /// Fields absent from the patch are left untouched; dotted keys address nested fields.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the document does not exist.
    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> GatewayResult<()>;

    /// Deletes one document. Deleting a document that does not exist succeeds.
    async fn delete_document(&self, collection: &str, id: &DocumentId) -> GatewayResult<()>;

    /// Deletes a set of documents as one all-or-nothing batch.
    ///
    /// The default implementation cannot roll back: it deletes one document at a time and
    /// reports a failure after the first deletion as
    /// [`GatewayError::PartialBatchFailure`]. Backends with native batches or transactions
    /// should override it.
    async fn batch_delete(&self, collection: &str, ids: Vec<DocumentId>) -> GatewayResult<()> {
        delete_sequentially(self, collection, ids).await
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> GatewayResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Deletes documents one by one, distinguishing partial application from plain failure.
///
/// A failure on the first document leaves the collection untouched and is returned as-is.
/// A failure after at least one deletion is returned as
/// [`GatewayError::PartialBatchFailure`].
pub async fn delete_sequentially<B>(
    backend: &B,
    collection: &str,
    ids: Vec<DocumentId>,
) -> GatewayResult<()>
where
    B: StoreBackend + ?Sized,
{
    let total = ids.len();

    for (deleted, id) in ids.into_iter().enumerate() {
        if let Err(err) = backend.delete_document(collection, &id).await {
            if deleted == 0 {
                return Err(err);
            }

            return Err(GatewayError::PartialBatchFailure {
                collection: collection.to_string(),
                deleted,
                failed: id.into_inner(),
                reason: err.to_string(),
            });
        }
    }

    debug!(collection, total, "sequential batch delete applied");

    Ok(())
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> GatewayResult<Option<Document>> {
        (**self).get_document(collection, id).await
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> GatewayResult<Vec<(DocumentId, Document)>> {
        (**self).query_documents(collection, query).await
    }

    async fn create_document(&self, collection: &str, data: Document) -> GatewayResult<DocumentId> {
        (**self).create_document(collection, data).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> GatewayResult<()> {
        (**self)
            .update_document(collection, id, patch)
            .await
    }

    async fn delete_document(&self, collection: &str, id: &DocumentId) -> GatewayResult<()> {
        (**self).delete_document(collection, id).await
    }

    async fn batch_delete(&self, collection: &str, ids: Vec<DocumentId>) -> GatewayResult<()> {
        (**self).batch_delete(collection, ids).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> GatewayResult<Self::Backend>;
}

//! Error types and result types for gateway operations.
//!
//! Errors raised by a [`StoreBackend`](crate::backend::StoreBackend) are propagated to the
//! caller unmodified. The gateway adds its own variants for caller mistakes (ambiguous
//! deletes, malformed queries) and for batch writes that could not be applied as a whole.
//! Use [`GatewayResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when going through the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Serialization/deserialization error when converting between entities and documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The targeted document does not exist.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} not found in collection {1}")]
    NotFound(String, String),
    /// A delete call carried neither an ID nor a filter, or both.
    #[error("Delete requires exactly one of an id or a filter")]
    AmbiguousDelete,
    /// A non-atomic batch stopped after some of its writes were applied.
    #[error(
        "Batch delete in collection {collection} partially applied: {deleted} deleted before {failed} failed: {reason}"
    )]
    PartialBatchFailure {
        /// Collection the batch targeted.
        collection: String,
        /// Number of documents deleted before the failure.
        deleted: usize,
        /// ID of the document whose deletion failed.
        failed: String,
        /// Error reported for the failed deletion.
        reason: String,
    },
    /// A filter matched more documents than a single atomic batch may hold.
    #[error("Batch of {size} deletes in collection {collection} exceeds the limit of {limit}")]
    BatchTooLarge {
        /// Collection the batch targeted.
        collection: String,
        /// Number of matched documents.
        size: usize,
        /// Configured batch limit.
        limit: usize,
    },
    /// A referenced document no longer exists.
    #[error("Dangling reference: {0}")]
    DanglingReference(String),
    /// A reference path could not be parsed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    /// A filter or sort specification is malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The store was shut down while gateways created from it were still alive.
    #[error("Store is still in use by {0} other handle(s)")]
    StoreInUse(usize),
    /// An error occurred in the underlying store client (unavailable, network, rejected).
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<BsonError> for GatewayError {
    fn from(err: BsonError) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for GatewayError {
    fn from(err: SerdeJsonError) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

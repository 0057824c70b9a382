//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```

pub use bson::{Document, doc};
pub use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::{Collection, Fetched, HydrationScope, TypedCollection},
    config::{GatewayConfig, HydrationOptions, MissingReference},
    document::{DocumentId, DocumentRef, Entity, EntityExt, Link},
    error::{GatewayError, GatewayResult},
    query::{FieldOp, Filter, OrderBy, Predicate, Query, QueryBuilder, SortDirection, Where},
    service::EntityService,
    store::DocumentStore,
};
pub use docgate_macros::Entity;

//! Main docgate crate: a document-store gateway with typed collections and reference
//! hydration.
//!
//! This crate is the primary entry point. It re-exports the core types from the sub-crates,
//! the `Entity` derive macro, and the available storage backends.
//!
//! # Features
//!
//! - **Generic CRUD** - get by ID or by filter, create, merge-update and delete on any collection
//! - **Atomic filtered deletes** - every document matching a filter is deleted in one batch
//! - **Reference hydration** - top-level reference fields are replaced by the documents they
//!   point at, one level deep
//! - **Entity services** - per-entity facades bound to a fixed collection
//! - **Multiple backends** - in-memory and MongoDB, behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "categories")]
//! pub struct Category {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<DocumentId>,
//!     pub name: String,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "incomes")]
//! pub struct Income {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<DocumentId>,
//!     pub amount: f64,
//!     pub category: Link<Category>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> GatewayResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!
//!     let salary = store
//!         .service::<Category>()
//!         .create(Category { id: None, name: "Salary".into() })
//!         .await?;
//!
//!     let incomes = store.service::<Income>();
//!     let income = incomes
//!         .create(Income { id: None, amount: 100.0, category: Link::to(salary.id.unwrap()) })
//!         .await?;
//!
//!     // The category comes back hydrated.
//!     let fetched = incomes.get(income.id(), None, None).await?.into_one();
//!     println!("{fetched:?}");
//!
//!     // Delete every income above 50 in one batch.
//!     incomes
//!         .collection()
//!         .delete_where(Filter::gt("amount", 50))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - in-memory storage for development and testing
//! - `mongodb` - persistent MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docgate;

pub mod prelude;

pub use docgate_core::{backend, collection, config, document, error, query, service, store};
pub use docgate_macros::Entity;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

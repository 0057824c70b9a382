//! In-memory document storage backend for docgate.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It is meant for development, tests and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - concurrent reads and writes behind an async-aware RwLock
//! - **Full filter support** - every filter operator, dotted field paths, ordering and limits
//! - **Atomic batches** - filtered deletes apply under a single write lock
//! - **Seeding** - the builder can pre-load documents under fixed IDs
//!
//! # Quick Start
//!
//! ```ignore
//! use docgate::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     let incomes = store.collection("incomes");
//!
//!     let created = incomes.create(doc! { "amount": 100 }).await?;
//!     println!("{created}");
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

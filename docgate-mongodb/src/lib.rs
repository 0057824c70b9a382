//! MongoDB backend implementation for docgate.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! To use it, enable the `mongodb` feature of the facade crate:
//!
//! ```toml
//! [dependencies]
//! docgate = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - self-hosted MongoDB or MongoDB Atlas
//! - **Native filtering and sorting** - predicates translate to MongoDB filter documents
//! - **Atomic filtered deletes** - batches run in a multi-document transaction
//!
//! Document IDs are stored as strings in `_id`. Keys and string values are escaped so that
//! dots and dollar signs survive the round trip.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{backend::StoreBackendBuilder, mongodb::MongoDbStore, store::DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017", "budget")
//!         .build()
//!         .await?;
//!     let store = DocumentStore::new(backend);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_mongodb;

pub mod query;
pub mod sanitizer;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};

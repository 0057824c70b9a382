//! A gateway over document databases: generic CRUD, filtered queries, atomic filtered
//! deletes and one-level reference hydration, behind a backend-agnostic interface.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Entities and references** ([`document`]) - the [`Entity`](document::Entity) trait,
//!   document IDs, reference locators and typed [`Link`](document::Link) fields
//! - **Store backend abstraction** ([`backend`]) - the capability the gateway needs from a
//!   document database client
//! - **Query and filtering API** ([`query`]) - filter predicates, ordering and the
//!   translation visitor backends implement
//! - **Collection gateways** ([`collection`]) - CRUD and hydration for one collection
//! - **Service facade** ([`service`]) - per-entity CRUD bound to a fixed collection
//! - **Document store** ([`store`]) - hands out gateways sharing one backend
//! - **Configuration** ([`config`]) - hydration and batch settings
//! - **Error handling** ([`error`]) - error taxonomy and result type
//!
//! # Example
//!
//! ```ignore
//! use docgate::{Entity, document::{DocumentId, Link}};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(collection = "incomes")]
//! pub struct Income {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<DocumentId>,
//!     pub amount: f64,
//!     pub category: Link<Category>,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod query;
pub mod service;
pub mod store;

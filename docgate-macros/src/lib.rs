//! Procedural macros for the docgate project.
//!
//! `#[derive(Entity)]` implements `docgate::document::Entity` for a struct with named fields:
//!
//! - `#[entity(collection = "incomes")]` on the struct names the collection (required)
//! - the struct must have an `id: Option<DocumentId>` field
//! - fields of type `Link<_>` (or `Option<Link<_>>`) and fields marked
//!   `#[entity(reference)]` are hydrated on reads, under their serde name. A marked field
//!   must be able to hold the inlined document (a map), so `DocumentRef` is rejected

use proc_macro::TokenStream;

mod entity;

#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input.into()).into()
}

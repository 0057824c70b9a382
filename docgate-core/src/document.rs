//! Entity traits, identities and document references.
//!
//! This module provides the trait every stored entity implements, the opaque
//! [`DocumentId`] assigned by the store, and the two reference types:
//!
//! - [`DocumentRef`] - an untyped `collection/id` locator, stored as `{"@ref": "collection/id"}`
//! - [`Link`] - a typed reference field that is either still a reference or already hydrated

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _, ser::Error as _, ser::SerializeMap};
use serde_json::{Value, from_value, to_value};
use std::fmt;

use crate::error::{GatewayError, GatewayResult};

/// Name of the field holding the store-assigned identity on hydrated and returned documents.
pub const ID_FIELD: &str = "id";

/// Key of the single-entry map a [`DocumentRef`] is stored as.
pub const REFERENCE_TAG: &str = "@ref";

/// Identity of a document, assigned by the store when the document is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&DocumentId> for DocumentId {
    fn from(id: &DocumentId) -> Self {
        id.clone()
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        Bson::String(id.0)
    }
}

/// Opaque locator of a document: the collection it lives in and its ID.
///
/// A reference is not the document's data. Storing one in a field lets the gateway
/// replace it with the referenced document when the owner is read (see
/// [`Collection::hydrate_references`](crate::collection::Collection::hydrate_references)).
///
/// # Example
///
/// ```ignore
/// use docgate::document::DocumentRef;
///
/// let reference = DocumentRef::parse("categories/salary")?;
/// assert_eq!(reference.collection(), "categories");
/// assert_eq!(reference.id().as_str(), "salary");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    collection: String,
    id: DocumentId,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self { collection: collection.into(), id: id.into() }
    }

    /// Parses a `collection/id` path.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidReference`] unless the path has exactly two
    /// non-empty segments.
    pub fn parse(path: &str) -> GatewayResult<Self> {
        match path.split_once('/') {
            Some((collection, id)) if !collection.is_empty() && !id.is_empty() && !id.contains('/') => {
                Ok(Self::new(collection, id))
            }
            _ => Err(GatewayError::InvalidReference(path.to_string())),
        }
    }

    /// Recognizes the stored form of a reference.
    ///
    /// Only a map holding nothing but a well-formed `@ref` path is a reference; anything
    /// else is ordinary data.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        let document = value.as_document()?;

        if document.len() != 1 {
            return None;
        }

        match document.get(REFERENCE_TAG) {
            Some(Bson::String(path)) => Self::parse(path).ok(),
            _ => None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Returns the `collection/id` path.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    /// Returns the stored form, `{"@ref": "collection/id"}`.
    pub fn to_bson(&self) -> Bson {
        let mut document = Document::new();
        document.insert(REFERENCE_TAG, self.path());
        Bson::Document(document)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl From<DocumentRef> for Bson {
    fn from(reference: DocumentRef) -> Self {
        reference.to_bson()
    }
}

impl Serialize for DocumentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(REFERENCE_TAG, &self.path())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for DocumentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Tagged {
            #[serde(rename = "@ref")]
            path: String,
        }

        let tagged = Tagged::deserialize(deserializer)?;
        DocumentRef::parse(&tagged.path).map_err(D::Error::custom)
    }
}

/// Core trait that all entities stored through the gateway must implement.
///
/// The identity is optional because it only exists once the store has assigned it. The
/// gateway never writes it back: creates and updates drop the `id` key before reaching
/// the store.
///
/// Usually derived:
///
/// ```ignore
/// use docgate::{Entity, document::{DocumentId, Link}};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// #[entity(collection = "incomes")]
/// pub struct Income {
///     #[serde(default, skip_serializing_if = "Option::is_none")]
///     pub id: Option<DocumentId>,
///     pub amount: f64,
///     pub category: Link<Category>,
/// }
/// ```
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this entity is stored in.
    fn collection_name() -> &'static str;

    /// Returns the store-assigned identity, if this value has been persisted.
    fn id(&self) -> Option<&DocumentId>;

    /// Returns the top-level fields holding references that reads should hydrate.
    ///
    /// Fields not listed here are never hydrated, even when they hold a reference.
    fn reference_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Extension trait providing document and JSON conversions for entities.
///
/// Automatically implemented for all types that implement [`Entity`].
pub trait EntityExt: Entity {
    /// Converts this entity to a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the entity does not serialize to a map.
    fn to_document(&self) -> GatewayResult<Document>;

    /// Creates an entity from a BSON document.
    fn from_document(document: Document) -> GatewayResult<Self>;

    /// Converts this entity to a JSON value.
    fn to_json(&self) -> GatewayResult<Value>;

    /// Creates an entity from a JSON value.
    fn from_json(value: Value) -> GatewayResult<Self>;
}

impl<T: Entity> EntityExt for T {
    fn to_document(&self) -> GatewayResult<Document> {
        to_document(self)
    }

    fn from_document(document: Document) -> GatewayResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_json(&self) -> GatewayResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> GatewayResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Serializes any value that maps to a document, such as a partial update.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidDocument`] if the value does not serialize to a map.
pub fn to_document<V: Serialize + ?Sized>(value: &V) -> GatewayResult<Document> {
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(GatewayError::InvalidDocument(format!(
            "expected a map, got {:?}",
            other.element_type()
        ))),
    }
}

/// A typed reference field.
///
/// Holds a [`DocumentRef`] until the owning entity is read through a gateway that
/// hydrates it, after which it holds the referenced entity. Either way it is written
/// back to the store as a reference, so hydrated data is never persisted inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Link<T> {
    /// Not hydrated: the stored locator.
    Reference(DocumentRef),
    /// Hydrated: the referenced entity, including its ID.
    Resolved(T),
}

impl<T: Entity> Link<T> {
    /// Creates a reference to the entity of type `T` with the given ID.
    pub fn to(id: impl Into<DocumentId>) -> Self {
        Link::Reference(DocumentRef::new(T::collection_name(), id))
    }

    /// Returns the locator, whether or not the link has been hydrated.
    ///
    /// Returns `None` only for a resolved entity that carries no ID.
    pub fn reference(&self) -> Option<DocumentRef> {
        match self {
            Link::Reference(reference) => Some(reference.clone()),
            Link::Resolved(entity) => entity
                .id()
                .map(|id| DocumentRef::new(T::collection_name(), id.clone())),
        }
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Link::Resolved(entity) => Some(entity),
            Link::Reference(_) => None,
        }
    }

    pub fn into_resolved(self) -> Option<T> {
        match self {
            Link::Resolved(entity) => Some(entity),
            Link::Reference(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Link::Resolved(_))
    }
}

impl<T> From<DocumentRef> for Link<T> {
    fn from(reference: DocumentRef) -> Self {
        Link::Reference(reference)
    }
}

impl<T: Entity> Serialize for Link<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.reference() {
            Some(reference) => reference.serialize(serializer),
            None => Err(S::Error::custom(format!(
                "resolved link into {} has no id",
                T::collection_name()
            ))),
        }
    }
}

impl<'de, T: Entity> Deserialize<'de> for Link<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Bson::deserialize(deserializer)?;

        if let Some(reference) = DocumentRef::from_bson(&value) {
            return Ok(Link::Reference(reference));
        }

        deserialize_from_bson::<T>(value)
            .map(Link::Resolved)
            .map_err(D::Error::custom)
    }
}

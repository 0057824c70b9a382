use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder, delete_sequentially},
    document::DocumentId,
    error::{GatewayError, GatewayResult},
    query::{Query, SortDirection},
};

use crate::{query::MongoQueryTranslator, sanitizer::ValueSanitizer};

const ID_KEY: &str = "_id";

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    transactions: bool,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database, transactions: true }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    fn prepare_document(id: &DocumentId, data: &Document) -> Document {
        let mut document = doc! { ID_KEY: id.as_str() };
        for (key, value) in ValueSanitizer::sanitize_document(data) {
            document.insert(key, value);
        }
        document
    }

    /// Turns an update patch into `$set` fields. Dotted keys address nested fields.
    fn prepare_patch(patch: &Document) -> Document {
        patch
            .iter()
            .map(|(path, value)| (ValueSanitizer::sanitize_path(path), ValueSanitizer::sanitize_value(value)))
            .collect()
    }

    /// Driver limits are signed; anything past `i64::MAX` means no effective limit.
    fn find_limit(limit: usize) -> i64 {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }

    fn restore_document(document: Document) -> GatewayResult<(DocumentId, Document)> {
        let id = match document.get(ID_KEY) {
            Some(Bson::String(id)) => DocumentId::new(id.as_str()),
            Some(other) => DocumentId::new(other.to_string()),
            None => return Err(GatewayError::InvalidDocument("document without _id".to_string())),
        };

        let data = document
            .into_iter()
            .filter(|(k, _)| k.as_str() != ID_KEY)
            .collect::<Document>();

        Ok((id, ValueSanitizer::restore_document(&data)))
    }

    async fn delete_in_transaction(&self, collection: &str, ids: &[DocumentId]) -> GatewayResult<u64> {
        let mut session = self
            .client
            .start_session()
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        session
            .start_transaction()
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        let keys = ids.iter().map(DocumentId::as_str).collect::<Vec<_>>();
        let result = self
            .get_collection(collection)
            .delete_many(doc! { ID_KEY: { "$in": keys } })
            .session(&mut session)
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        session
            .commit_transaction()
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        Ok(result.deleted_count)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> GatewayResult<Option<Document>> {
        debug!(collection, %id, "find_one");

        self.get_collection(collection)
            .find_one(doc! { ID_KEY: id.as_str() })
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?
            .map(Self::restore_document)
            .transpose()
            .map(|found| found.map(|(_, data)| data))
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> GatewayResult<Vec<(DocumentId, Document)>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(Self::find_limit(limit));
        }
        options.sort = Some(match &query.order_by {
            Some(order_by) => {
                let field = ValueSanitizer::sanitize_path(&order_by.field);
                doc! {
                    field: match order_by.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    },
                    ID_KEY: 1,
                }
            }
            None => doc! { ID_KEY: 1 },
        });

        let filter = MongoQueryTranslator::translate(query)?;
        debug!(collection, %filter, "find");

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?
            .into_iter()
            .map(Self::restore_document)
            .collect()
    }

    async fn create_document(&self, collection: &str, data: Document) -> GatewayResult<DocumentId> {
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());

        self.get_collection(collection)
            .insert_one(Self::prepare_document(&id, &data))
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        Ok(id)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &DocumentId,
        patch: Document,
    ) -> GatewayResult<()> {
        let target = self.get_collection(collection);
        let filter = doc! { ID_KEY: id.as_str() };

        let matched = if patch.is_empty() {
            target
                .count_documents(filter)
                .await
                .map_err(|e| GatewayError::Backend(e.to_string()))?
        } else {
            target
                .update_one(filter, doc! { "$set": Self::prepare_patch(&patch) })
                .await
                .map_err(|e| GatewayError::Backend(e.to_string()))?
                .matched_count
        };

        if matched == 0 {
            return Err(GatewayError::NotFound(id.to_string(), collection.to_string()));
        }

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &DocumentId) -> GatewayResult<()> {
        self.get_collection(collection)
            .delete_one(doc! { ID_KEY: id.as_str() })
            .await
            .map_err(|e| GatewayError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn batch_delete(&self, collection: &str, ids: Vec<DocumentId>) -> GatewayResult<()> {
        if !self.transactions {
            return delete_sequentially(self, collection, ids).await;
        }

        let deleted = self.delete_in_transaction(collection, &ids).await?;
        debug!(collection, requested = ids.len(), deleted, "transaction committed");

        Ok(())
    }

    async fn shutdown(self) -> GatewayResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`].
///
/// ```ignore
/// let backend = MongoDbStore::builder("mongodb://localhost:27017", "budget")
///     .app_name("budget-api")
///     .server_selection_timeout(Duration::from_secs(5))
///     .build()
///     .await?;
/// ```
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
    transactions: bool,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
            connect_timeout: None,
            server_selection_timeout: None,
            transactions: true,
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    /// Whether filtered deletes run in a multi-document transaction. Transactions need a
    /// replica set or sharded cluster; without them deletes run one by one and a failure
    /// midway is reported as a partial batch.
    pub fn transactions(mut self, enabled: bool) -> Self {
        self.transactions = enabled;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> GatewayResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;

        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }
        if self.connect_timeout.is_some() {
            options.connect_timeout = self.connect_timeout;
        }
        if self.server_selection_timeout.is_some() {
            options.server_selection_timeout = self.server_selection_timeout;
        }

        let client = Client::with_options(options)
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;

        Ok(MongoDbStore {
            client,
            database: self.database,
            transactions: self.transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_round_trip_moves_id() {
        let id = DocumentId::new("abc");
        let stored = MongoDbStore::prepare_document(&id, &doc! { "rate.eur": 1.08, "note": "a.b" });

        assert_eq!(stored, doc! { "_id": "abc", "rate__dot__eur": 1.08, "note": "a__dot__b" });
        assert_eq!(
            MongoDbStore::restore_document(stored).unwrap(),
            (id, doc! { "rate.eur": 1.08, "note": "a.b" })
        );
    }

    #[test]
    fn test_find_limit_saturates() {
        assert_eq!(MongoDbStore::find_limit(25), 25);
        assert_eq!(MongoDbStore::find_limit(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_patch_keeps_nested_paths() {
        assert_eq!(
            MongoDbStore::prepare_patch(&doc! { "details.currency": "USD", "$weird": 1 }),
            doc! { "details.currency": "USD", "__dollar__weird": 1 }
        );
    }

    #[test]
    fn test_restore_requires_id() {
        assert!(matches!(
            MongoDbStore::restore_document(doc! { "amount": 1 }),
            Err(GatewayError::InvalidDocument(_))
        ));
    }
}

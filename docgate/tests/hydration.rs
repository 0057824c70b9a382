mod common;

use async_trait::async_trait;
use common::{Category, Income, income};
use docgate::{bson::Bson, memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "transfers")]
struct Transfer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<DocumentId>,
    amount: f64,
    #[serde(default)]
    category: Option<Link<Category>>,
    #[entity(reference)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<Document>,
}

fn config(missing: MissingReference, concurrency: usize) -> GatewayConfig {
    GatewayConfig {
        hydration: HydrationOptions { missing, concurrency, ..Default::default() },
        ..Default::default()
    }
}

async fn create_raw(store: &DocumentStore<InMemoryStore>, data: Document) -> DocumentId {
    let created = store
        .collection("incomes")
        .create(data)
        .await
        .unwrap();

    DocumentId::new(created.get_str("id").unwrap())
}

#[tokio::test]
async fn test_only_top_level_references_are_hydrated() {
    let store = common::store().await;
    let id = create_raw(
        &store,
        doc! {
            "category": { "@ref": "categories/salary" },
            "meta": { "category": { "@ref": "categories/gift" } },
            "history": [{ "@ref": "categories/gift" }],
            "label": "categories/gift",
        },
    )
    .await;

    let fetched = store
        .collection("incomes")
        .get_by_id(&id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        fetched,
        doc! {
            "id": id.as_str(),
            "category": {
                "id": "salary",
                "name": "Salary",
                "parent": { "@ref": "categories/work" },
            },
            "meta": { "category": { "@ref": "categories/gift" } },
            "history": [{ "@ref": "categories/gift" }],
            "label": "categories/gift",
        }
    );
}

#[tokio::test]
async fn test_typed_reads_hydrate_declared_fields_only() {
    let store = common::store().await;

    let typed = store
        .typed_collection::<Category>()
        .get_by_id(&DocumentId::new("salary"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(typed.parent, Some(DocumentRef::new("categories", "work")));

    let untyped = store
        .collection("categories")
        .get_by_id(&DocumentId::new("salary"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untyped.get_document("parent").unwrap().get_str("name").unwrap(), "Work");
}

#[tokio::test]
async fn test_missing_reference_is_kept_by_default() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let created = incomes
        .create(income(10.0, "EUR", "ghost"))
        .await
        .unwrap();

    let fetched = incomes
        .get(created.id(), None, None)
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(fetched.category, Link::to("ghost"));
}

#[tokio::test]
async fn test_missing_reference_becomes_null() {
    let store = common::store_with(config(MissingReference::Null, 1)).await;
    let id = create_raw(&store, doc! { "category": { "@ref": "categories/ghost" }, "amount": 1 }).await;

    let fetched = store
        .collection("incomes")
        .get_by_id(&id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(fetched.get("category"), Some(&Bson::Null));
    assert_eq!(fetched.get_i32("amount").unwrap(), 1);
}

#[tokio::test]
async fn test_missing_reference_fails_the_read() {
    let store = common::store_with(config(MissingReference::Fail, 1)).await;
    let incomes = store.service::<Income>();

    incomes.create(income(10.0, "EUR", "salary")).await.unwrap();
    incomes.create(income(20.0, "EUR", "ghost")).await.unwrap();

    let err = incomes.get(None, None, None).await.unwrap_err();

    assert!(matches!(err, GatewayError::DanglingReference(path) if path == "categories/ghost"));
}

#[tokio::test]
async fn test_disabled_hydration_returns_references() {
    let mut config = GatewayConfig::default();
    config.hydration.enabled = false;

    let store = common::store_with(config).await;
    let incomes = store.service::<Income>();

    incomes.create(income(10.0, "EUR", "salary")).await.unwrap();

    let all = incomes.get(None, None, None).await.unwrap().into_vec();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].category, Link::to("salary"));
}

#[tokio::test]
async fn test_concurrent_hydration_keeps_result_order() {
    let store = common::store_with(config(MissingReference::Keep, 8)).await;
    let incomes = store.service::<Income>();

    for n in 0..20 {
        let category = if n % 2 == 0 { "salary" } else { "gift" };
        incomes
            .create(income(n as f64, "EUR", category))
            .await
            .unwrap();
    }

    let ordered = incomes
        .get(None, None, Some(OrderBy::asc("amount")))
        .await
        .unwrap()
        .into_vec();

    assert_eq!(ordered.len(), 20);
    for (n, item) in ordered.iter().enumerate() {
        let expected = if n % 2 == 0 { "Salary" } else { "Gift" };

        assert_eq!(item.amount, n as f64);
        assert_eq!(item.category.resolved().map(|c| c.name.as_str()), Some(expected));
    }
}

#[tokio::test]
async fn test_hydrate_references_on_caller_record() {
    let store = common::store().await;
    let categories = store.collection("categories");

    let mut record = doc! {
        "primary": { "@ref": "categories/gift" },
        "secondary": { "@ref": "categories/work" },
    };

    categories
        .hydrate_references(&mut record, HydrationScope::Fields(&["secondary"]))
        .await
        .unwrap();

    assert_eq!(
        record,
        doc! {
            "primary": { "@ref": "categories/gift" },
            "secondary": { "id": "work", "name": "Work" },
        }
    );
}

#[tokio::test]
async fn test_optional_link_becomes_none_when_missing() {
    let store = common::store_with(config(MissingReference::Null, 1)).await;
    let transfers = store.service::<Transfer>();

    for category in ["ghost", "gift"] {
        transfers
            .create(Transfer { id: None, amount: 1.0, category: Some(Link::to(category)), source: None })
            .await
            .unwrap();
    }

    let fetched = transfers.get(None, None, None).await.unwrap().into_vec();

    assert_eq!(fetched.len(), 2);
    assert!(fetched.iter().any(|t| t.category.is_none()));
    assert!(fetched.iter().any(|t| {
        t.category
            .as_ref()
            .and_then(Link::resolved)
            .is_some_and(|c| c.name == "Gift")
    }));
}

#[tokio::test]
async fn test_marked_reference_field_receives_the_document() {
    let store = common::store().await;
    let transfers = store.service::<Transfer>();

    let created = transfers
        .create(Transfer {
            id: None,
            amount: 3.0,
            category: None,
            source: Some(doc! { "@ref": "categories/gift" }),
        })
        .await
        .unwrap();

    let fetched = transfers
        .get(created.id(), None, None)
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(fetched.source, Some(doc! { "id": "gift", "name": "Gift" }));
}

/// Tracks how many reference reads overlap.
#[derive(Debug, Default)]
struct CountingReads {
    inner: InMemoryStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl StoreBackend for CountingReads {
    async fn get_document(&self, collection: &str, id: &DocumentId) -> GatewayResult<Option<Document>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let found = self.inner.get_document(collection, id).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        found
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> GatewayResult<Vec<(DocumentId, Document)>> {
        self.inner.query_documents(collection, query).await
    }

    async fn create_document(&self, collection: &str, data: Document) -> GatewayResult<DocumentId> {
        self.inner.create_document(collection, data).await
    }

    async fn update_document(&self, collection: &str, id: &DocumentId, patch: Document) -> GatewayResult<()> {
        self.inner.update_document(collection, id, patch).await
    }

    async fn delete_document(&self, collection: &str, id: &DocumentId) -> GatewayResult<()> {
        self.inner.delete_document(collection, id).await
    }
}

#[tokio::test]
async fn test_concurrency_limit_spans_all_documents() {
    let backend = CountingReads { inner: common::backend().await, ..Default::default() };
    let store = DocumentStore::with_config(backend, config(MissingReference::Keep, 3));
    let ledger = store.collection("ledger");

    for _ in 0..6 {
        ledger
            .create(doc! {
                "credit": { "@ref": "categories/gift" },
                "debit": { "@ref": "categories/work" },
            })
            .await
            .unwrap();
    }

    let entries = ledger.find(None, None).await.unwrap();

    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| e.get_document("debit").is_ok_and(|d| d.get_str("name").is_ok_and(|n| n == "Work"))));

    let peak = store.backend().peak.load(Ordering::SeqCst);
    assert!((2..=3).contains(&peak), "peak of {peak} reads in flight");
}

mod common;

use common::{Category, Income, IncomePatch, income};
use docgate::{bson::bson, prelude::*};

#[tokio::test]
async fn test_create_ignores_caller_id() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let mut input = income(100.0, "EUR", "salary");
    input.id = Some(DocumentId::new("forged"));

    let created = incomes.create(input).await.unwrap();
    let id = created.id.clone().unwrap();

    assert_ne!(id.as_str(), "forged");
    assert_eq!(created.amount, 100.0);
    assert_eq!(created.category, Link::to("salary"));

    let backend = store.backend();
    assert!(
        backend
            .get_document("incomes", &DocumentId::new("forged"))
            .await
            .unwrap()
            .is_none()
    );

    let stored = backend
        .get_document("incomes", &id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.contains_key("id"));
    assert_eq!(stored.get("category"), Some(&bson!({ "@ref": "categories/salary" })));
}

#[tokio::test]
async fn test_get_by_id_hydrates_references() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let created = incomes
        .create(income(100.0, "EUR", "salary"))
        .await
        .unwrap();

    let fetched = incomes
        .get(created.id(), None, None)
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(fetched.id, created.id);
    assert_eq!(
        fetched.category.resolved(),
        Some(&Category {
            id: Some(DocumentId::new("salary")),
            name: "Salary".to_string(),
            parent: Some(DocumentRef::new("categories", "work")),
        })
    );
}

#[tokio::test]
async fn test_get_missing_id_returns_none() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let fetched = incomes
        .get(Some(&DocumentId::new("nope")), None, None)
        .await
        .unwrap();

    assert_eq!(fetched, Fetched::One(None));
}

#[tokio::test]
async fn test_get_filters_and_orders() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    for (amount, currency, category) in [
        (300.0, "EUR", "salary"),
        (100.0, "USD", "gift"),
        (200.0, "EUR", "gift"),
        (50.0, "EUR", "salary"),
    ] {
        incomes
            .create(income(amount, currency, category))
            .await
            .unwrap();
    }

    let found = incomes
        .get(
            None,
            Some(vec![Filter::gte("amount", 100), Filter::eq("currency", "EUR")].into()),
            Some(OrderBy::desc("amount")),
        )
        .await
        .unwrap()
        .into_vec();

    assert_eq!(found.iter().map(|i| i.amount).collect::<Vec<_>>(), vec![300.0, 200.0]);
    assert!(found.iter().all(|i| i.category.is_resolved()));

    let everything = incomes.get(None, None, None).await.unwrap();
    assert!(matches!(everything, Fetched::Many(ref all) if all.len() == 4));
}

#[tokio::test]
async fn test_filter_by_reference() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    incomes.create(income(1.0, "EUR", "salary")).await.unwrap();
    incomes.create(income(2.0, "EUR", "gift")).await.unwrap();

    let gift = store.typed_collection::<Category>().doc_ref("gift");
    let gifts = incomes
        .collection()
        .find(Some(Filter::eq("category", gift).into()), None)
        .await
        .unwrap();

    assert_eq!(gifts.len(), 1);
    assert_eq!(gifts[0].amount, 2.0);
    assert_eq!(gifts[0].category.resolved().map(|c| c.name.as_str()), Some("Gift"));
}

#[tokio::test]
async fn test_order_by_skips_documents_without_the_field() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let mut dated = income(10.0, "EUR", "gift");
    dated.received_on = Some("2024-03-01".to_string());
    incomes.create(dated).await.unwrap();
    incomes.create(income(20.0, "EUR", "gift")).await.unwrap();

    let ordered = incomes
        .get(None, None, Some(OrderBy::asc("receivedOn")))
        .await
        .unwrap()
        .into_vec();

    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].received_on.as_deref(), Some("2024-03-01"));
}

#[tokio::test]
async fn test_update_merges_and_keeps_identity() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let created = incomes
        .create(income(100.0, "EUR", "salary"))
        .await
        .unwrap();
    let id = created.id.clone().unwrap();

    incomes
        .update(&doc! { "amount": 150.0, "id": "hijacked" }, &id)
        .await
        .unwrap();
    incomes
        .update(&IncomePatch { received_on: Some("2024-05-01".into()), ..Default::default() }, &id)
        .await
        .unwrap();

    let fetched = incomes
        .get(Some(&id), None, None)
        .await
        .unwrap()
        .into_one()
        .unwrap();

    assert_eq!(fetched.id, Some(id));
    assert_eq!(fetched.amount, 150.0);
    assert_eq!(fetched.currency, "EUR");
    assert_eq!(fetched.received_on.as_deref(), Some("2024-05-01"));
    assert!(
        incomes
            .get(Some(&DocumentId::new("hijacked")), None, None)
            .await
            .unwrap()
            .into_one()
            .is_none()
    );
}

#[tokio::test]
async fn test_update_missing_document_fails() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let err = incomes
        .update(&doc! { "amount": 1 }, &DocumentId::new("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::NotFound(id, collection) if id == "ghost" && collection == "incomes"));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let created = incomes
        .create(income(100.0, "EUR", "salary"))
        .await
        .unwrap();
    let id = created.id.unwrap();

    incomes.delete(&id).await.unwrap();
    incomes.delete(&id).await.unwrap();

    assert_eq!(incomes.get(Some(&id), None, None).await.unwrap(), Fetched::One(None));
}

#[tokio::test]
async fn test_doc_ref_does_not_touch_the_store() {
    let store = common::store().await;
    let incomes = store.service::<Income>();

    let reference = incomes.doc_ref("abc");

    assert_eq!(reference, DocumentRef::parse("incomes/abc").unwrap());
    assert_eq!(reference.path(), "incomes/abc");
    assert_eq!(store.backend().document_count("incomes").await, 0);
}

#[tokio::test]
async fn test_untyped_collection_round_trip() {
    let store = common::store().await;
    let incomes = store.collection("incomes");

    let created = incomes
        .create(doc! { "id": "mine", "amount": 5, "category": { "@ref": "categories/gift" } })
        .await
        .unwrap();

    let id = DocumentId::new(created.get_str("id").unwrap());
    assert_ne!(id.as_str(), "mine");
    assert_eq!(created.keys().next().map(String::as_str), Some("id"));

    let fetched = incomes.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(
        fetched,
        doc! {
            "id": id.as_str(),
            "amount": 5,
            "category": { "id": "gift", "name": "Gift" },
        }
    );
}

#[tokio::test]
async fn test_entity_json_conversions() {
    let value = serde_json::json!({
        "amount": 12.5,
        "currency": "EUR",
        "category": { "@ref": "categories/gift" },
        "receivedOn": "2024-01-01",
    });

    let parsed = Income::from_json(value).unwrap();
    assert_eq!(parsed.category, Link::to("gift"));
    assert_eq!(parsed.received_on.as_deref(), Some("2024-01-01"));

    let json = parsed.to_json().unwrap();
    assert_eq!(json["category"]["@ref"], "categories/gift");
    assert!(json.get("id").is_none());
}

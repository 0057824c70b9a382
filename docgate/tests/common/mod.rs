#![allow(dead_code)]

use docgate::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "categories")]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<DocumentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "incomes")]
#[serde(rename_all = "camelCase")]
pub struct Income {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    pub amount: f64,
    pub currency: String,
    pub category: Link<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_on: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_on: Option<String>,
}

pub fn income(amount: f64, currency: &str, category: &str) -> Income {
    Income {
        id: None,
        amount,
        currency: currency.to_string(),
        category: Link::to(category),
        received_on: None,
        tags: vec![],
    }
}

/// Backend pre-loaded with three categories; `salary` points at its parent `work`.
pub async fn backend() -> InMemoryStore {
    InMemoryStore::builder()
        .with_document("categories", "salary", doc! { "name": "Salary", "parent": { "@ref": "categories/work" } })
        .with_document("categories", "work", doc! { "name": "Work" })
        .with_document("categories", "gift", doc! { "name": "Gift" })
        .build()
        .await
        .unwrap()
}

pub async fn store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(backend().await)
}

pub async fn store_with(config: GatewayConfig) -> DocumentStore<InMemoryStore> {
    DocumentStore::with_config(backend().await, config)
}

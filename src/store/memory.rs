use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::document_store::{document_version, lookup, Document, DocumentStore, Filter, Query, StoreError};

/// Process-local backend. Used for development runs and tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<Uuid, Document>>>,
    sequences: RwLock<HashMap<String, i64>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(field, expected) => lookup(doc, field) == Some(expected),
        Filter::Matches { fields, needle } => {
            let needle = needle.to_lowercase();
            fields.iter().any(|field| {
                lookup(doc, field)
                    .and_then(Value::as_str)
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
    }
}

fn matches_all(doc: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches(doc, filter))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(text) => Decimal::from_str(text).ok(),
        Value::Number(number) => Decimal::from_str(&number.to_string()).ok(),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, id: Uuid, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }

        docs.insert(id, doc);
        Ok(())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(&id)).cloned())
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: i64,
        doc: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(&id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;

        let actual = document_version(stored);
        if actual != expected_version {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id,
                expected: expected_version,
                actual,
            });
        }

        *stored = doc;
        Ok(())
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found: Vec<Document> = docs
            .values()
            .filter(|doc| matches_all(doc, &query.filters))
            .cloned()
            .collect();

        if let Some(sort) = &query.sort {
            found.sort_by(|a, b| {
                let ordering = compare(lookup(a, &sort.field), lookup(b, &sort.field));
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(query.skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().filter(|doc| matches_all(doc, filters)).count() as u64)
            .unwrap_or(0))
    }

    async fn sum(&self, collection: &str, filters: &[Filter], field: &str) -> Result<Decimal, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_all(doc, filters))
                    .filter_map(|doc| lookup(doc, field).and_then(decimal_of))
                    .sum()
            })
            .unwrap_or(Decimal::ZERO))
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, StoreError> {
        let mut sequences = self.sequences.write().await;
        let value = sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

use std::marker::PhantomData;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::document_store::{DocumentStore, Filter, Query, StoreError};

// ============================================================================
// Typed Collection - serde mapping over the untyped document store
// ============================================================================
//
// Generic over the entity type, the same way every collection is handled.
// `save` enforces optimistic concurrency: the entity's version is the expected
// stored version, and it is bumped only after the write succeeds.
//
// ============================================================================

pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
    fn version(&self) -> i64;
    fn set_version(&mut self, version: i64);
}

pub struct Collection<T: Entity> {
    store: Arc<dyn DocumentStore>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Persist a new entity at version 1
    pub async fn insert(&self, entity: &mut T) -> Result<(), StoreError> {
        entity.set_version(1);
        let doc = serde_json::to_value(&*entity)?;
        self.store.insert(T::COLLECTION, entity.id(), doc).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn require(&self, id: Uuid) -> Result<T, StoreError> {
        self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            collection: T::COLLECTION.to_string(),
            id,
        })
    }

    /// Write back a loaded entity; fails with `Conflict` if someone else wrote first
    pub async fn save(&self, entity: &mut T) -> Result<(), StoreError> {
        let expected = entity.version();
        entity.set_version(expected + 1);

        let doc = match serde_json::to_value(&*entity) {
            Ok(doc) => doc,
            Err(e) => {
                entity.set_version(expected);
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.replace(T::COLLECTION, entity.id(), expected, doc).await {
            entity.set_version(expected);
            return Err(e);
        }

        tracing::debug!(
            collection = T::COLLECTION,
            id = %entity.id(),
            version = expected + 1,
            "document saved"
        );
        Ok(())
    }

    pub async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        self.store
            .find(T::COLLECTION, query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    pub async fn find_one(&self, filters: Vec<Filter>) -> Result<Option<T>, StoreError> {
        let query = Query {
            filters,
            limit: Some(1),
            ..Query::default()
        };
        Ok(self.find(&query).await?.into_iter().next())
    }

    pub async fn count(&self, filters: &[Filter]) -> Result<u64, StoreError> {
        self.store.count(T::COLLECTION, filters).await
    }

    pub async fn sum(&self, filters: &[Filter], field: &str) -> Result<Decimal, StoreError> {
        self.store.sum(T::COLLECTION, filters, field).await
    }
}

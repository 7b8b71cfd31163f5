//! Entity-centric data access surface
//!
//! A `MilvusMapper<E>` ties one entity type to a backend and a schema
//! registry, hands out the request wrappers, and offers shortcuts for
//! the common single-call operations.

pub mod decode;

pub use decode::{decode_hit, decode_row, encode_row, VectorHit};

use crate::backend::models::MutationResponse;
use crate::backend::VectorBackend;
use crate::conditions::filter::Filter;
use crate::conditions::{DeleteWrapper, InsertWrapper, QueryWrapper, UpdateWrapper};
use crate::config::MilvusConfig;
use crate::error::Result;
use crate::schema::convert::{create_collection, load_status};
use crate::schema::entity::Entity;
use crate::schema::registry::SchemaRegistry;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

const DEFAULT_MAX_RETRIES: usize = 2;

/// Data access object for entity type `E`
pub struct MilvusMapper<E: Entity> {
    backend: Arc<dyn VectorBackend>,
    registry: Arc<SchemaRegistry>,
    max_retries: usize,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> MilvusMapper<E> {
    pub fn new(backend: Arc<dyn VectorBackend>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            backend,
            registry,
            max_retries: DEFAULT_MAX_RETRIES,
            _marker: PhantomData,
        }
    }

    pub fn from_config(
        backend: Arc<dyn VectorBackend>,
        registry: Arc<SchemaRegistry>,
        config: &MilvusConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            max_retries: config.max_retries,
            _marker: PhantomData,
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    fn filter(&self) -> Filter<E> {
        Filter::new(Arc::clone(&self.registry))
    }

    pub fn query_wrapper(&self) -> Result<QueryWrapper<E>> {
        let cache = self.registry.convert::<E>()?;
        Ok(QueryWrapper::new(
            self.filter(),
            cache,
            Arc::clone(&self.backend),
            self.max_retries,
        ))
    }

    pub fn insert_wrapper(&self) -> Result<InsertWrapper<E>> {
        let cache = self.registry.convert::<E>()?;
        Ok(InsertWrapper::new(
            Arc::clone(&self.registry),
            cache,
            Arc::clone(&self.backend),
            self.max_retries,
        ))
    }

    pub fn update_wrapper(&self) -> Result<UpdateWrapper<E>> {
        let cache = self.registry.convert::<E>()?;
        Ok(UpdateWrapper::new(
            self.filter(),
            cache,
            Arc::clone(&self.backend),
            self.max_retries,
        ))
    }

    pub fn delete_wrapper(&self) -> Result<DeleteWrapper<E>> {
        let cache = self.registry.convert::<E>()?;
        Ok(DeleteWrapper::new(
            self.filter(),
            cache,
            Arc::clone(&self.backend),
            self.max_retries,
        ))
    }

    /// Fetch entities by primary key; absent ids are simply missing
    /// from the result
    pub async fn get_by_id(&self, ids: Vec<Value>) -> Result<Vec<E>> {
        self.query_wrapper()?.get_by_id(ids).await
    }

    pub async fn insert<'a>(
        &self,
        entities: impl IntoIterator<Item = &'a E>,
    ) -> Result<MutationResponse> {
        self.insert_wrapper()?.entities(entities).execute().await
    }

    pub async fn update_by_id<'a>(
        &self,
        entities: impl IntoIterator<Item = &'a E>,
    ) -> Result<MutationResponse> {
        self.update_wrapper()?.update_by_id(entities).await
    }

    pub async fn remove_by_id(
        &self,
        ids: impl IntoIterator<Item = Value>,
    ) -> Result<MutationResponse> {
        self.delete_wrapper()?.remove_by_id(ids).await
    }

    /// Create the collection if it does not exist, then reconcile load
    /// state. Intended to run once at host startup.
    pub async fn ensure_collection(&self) -> Result<()> {
        let cache = self.registry.convert::<E>()?;
        if self.backend.has_collection(&cache.collection_name).await? {
            load_status(&cache.schema, self.backend.as_ref()).await
        } else {
            info!(collection = %cache.collection_name, "Collection missing, creating");
            create_collection(&cache, self.backend.as_ref()).await
        }
    }
}

//! Insert wrapper: ad-hoc rows and whole-entity batches

use crate::backend::models::{InsertRequest, MutationResponse, Row};
use crate::backend::VectorBackend;
use crate::conditions::retry::execute_with_retry;
use crate::error::{MapperError, Result};
use crate::mapper::decode::encode_row;
use crate::schema::entity::{Entity, FieldKey};
use crate::schema::registry::{ConversionCache, SchemaRegistry};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Fluent insert builder for entity type `E`
pub struct InsertWrapper<E: Entity> {
    registry: Arc<SchemaRegistry>,
    cache: Arc<ConversionCache>,
    backend: Arc<dyn VectorBackend>,
    max_retries: usize,
    rows: Vec<Row>,
    adhoc: Row,
    partition: Option<String>,
    error: Option<MapperError>,
    _marker: std::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> InsertWrapper<E> {
    pub(crate) fn new(
        registry: Arc<SchemaRegistry>,
        cache: Arc<ConversionCache>,
        backend: Arc<dyn VectorBackend>,
        max_retries: usize,
    ) -> Self {
        Self {
            registry,
            cache,
            backend,
            max_retries,
            rows: Vec::new(),
            adhoc: Row::new(),
            partition: None,
            error: None,
            _marker: std::marker::PhantomData,
        }
    }

    fn record_error(&mut self, err: MapperError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Set one column of an ad-hoc row, bypassing entity encoding
    pub fn put(mut self, field: impl FieldKey<E>, value: Value) -> Self {
        match field.resolve(&self.registry) {
            Ok(column) => {
                self.adhoc.insert(column, value);
            }
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Queue a whole entity for insertion
    pub fn entity(mut self, entity: &E) -> Self {
        match encode_row(&self.cache.properties, entity) {
            Ok(row) => self.rows.push(row),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Queue a batch; ids are synthesized per entity in batch order on
    /// auto-ID schemas
    pub fn entities<'a>(mut self, entities: impl IntoIterator<Item = &'a E>) -> Self {
        for entity in entities {
            self = self.entity(entity);
        }
        self
    }

    pub fn partition(mut self, name: impl Into<String>) -> Self {
        self.partition = Some(name.into());
        self
    }

    pub async fn execute(mut self) -> Result<MutationResponse> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if !self.adhoc.is_empty() {
            let row = std::mem::take(&mut self.adhoc);
            self.rows.push(row);
        }
        if self.rows.is_empty() {
            return Err(MapperError::Validation(
                "Insert requires at least one row".to_string(),
            ));
        }

        if self.cache.auto_id {
            if let Some(pk) = &self.cache.primary_key {
                for row in &mut self.rows {
                    if !row.contains_key(pk) {
                        row.insert(pk.clone(), Value::from(self.registry.next_id()));
                    }
                }
            }
        }

        let request = InsertRequest {
            collection_name: self.cache.collection_name.clone(),
            partition_name: self.partition.clone(),
            rows: std::mem::take(&mut self.rows),
        };
        debug!(
            collection = %request.collection_name,
            rows = request.rows.len(),
            "Inserting rows"
        );
        let backend = Arc::clone(&self.backend);
        execute_with_retry(
            || {
                let backend = Arc::clone(&backend);
                let request = request.clone();
                async move { backend.insert(request).await }
            },
            &self.cache.schema,
            self.backend.as_ref(),
            self.max_retries,
        )
        .await
    }
}

//! Update wrapper: keyed upserts with stored-value backfill

use crate::backend::models::{MutationResponse, QueryRequest, Row, UpsertRequest};
use crate::backend::VectorBackend;
use crate::conditions::expr::FilterValue;
use crate::conditions::filter::{Conditions, Filter};
use crate::conditions::retry::execute_with_retry;
use crate::error::{MapperError, Result};
use crate::mapper::decode::encode_row;
use crate::schema::entity::Entity;
use crate::schema::registry::ConversionCache;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Fluent update builder for entity type `E`
pub struct UpdateWrapper<E: Entity> {
    filter: Filter<E>,
    cache: Arc<ConversionCache>,
    backend: Arc<dyn VectorBackend>,
    max_retries: usize,
    partition: Option<String>,
}

impl<E: Entity> UpdateWrapper<E> {
    pub(crate) fn new(
        filter: Filter<E>,
        cache: Arc<ConversionCache>,
        backend: Arc<dyn VectorBackend>,
        max_retries: usize,
    ) -> Self {
        Self {
            filter,
            cache,
            backend,
            max_retries,
            partition: None,
        }
    }

    pub fn partition(mut self, name: impl Into<String>) -> Self {
        self.partition = Some(name.into());
        self
    }

    /// Upsert entities by primary key.
    ///
    /// Every payload must carry the key. Payloads missing a
    /// non-nullable mapped column are completed from the stored row;
    /// entities whose key matches nothing are dropped from the batch,
    /// which makes an all-miss batch a successful no-op.
    pub async fn update_by_id<'a>(
        self,
        entities: impl IntoIterator<Item = &'a E>,
    ) -> Result<MutationResponse> {
        let pk = self.cache.primary_key.clone().ok_or_else(|| {
            MapperError::Domain(format!(
                "Collection '{}' has no primary key; keyed update is unavailable",
                self.cache.collection_name
            ))
        })?;

        let mut rows = Vec::new();
        for entity in entities {
            let row = encode_row(&self.cache.properties, entity)?;
            let Some(id) = row.get(&pk).cloned() else {
                return Err(MapperError::Domain(format!(
                    "Update payload is missing primary key '{pk}'"
                )));
            };
            if let Some(row) = self.complete_row(&pk, id, row).await? {
                rows.push(row);
            }
        }
        if rows.is_empty() {
            return Ok(MutationResponse::default());
        }
        self.upsert(rows).await
    }

    /// Filter-driven update for collections without a configured
    /// primary key; a keyed collection must go through `update_by_id`.
    pub async fn update(self, entity: &E) -> Result<MutationResponse> {
        if self.cache.primary_key.is_some() {
            return Err(MapperError::Domain(format!(
                "Collection '{}' has a primary key; use update_by_id",
                self.cache.collection_name
            )));
        }

        let filter = self.filter.build()?;
        if filter.is_empty() {
            return Err(MapperError::Validation(
                "Update without a primary key requires filter conditions".to_string(),
            ));
        }
        let patch = encode_row(&self.cache.properties, entity)?;

        let request = QueryRequest {
            collection_name: self.cache.collection_name.clone(),
            filter: Some(filter),
            ids: Vec::new(),
            output_fields: self.cache.properties.backend_columns(),
            partition_names: self.partition.clone().into_iter().collect(),
            limit: None,
            offset: None,
            consistency_level: None,
            ignore_growing: None,
        };
        let stored = self.query_with_retry(request).await?;
        if stored.is_empty() {
            return Ok(MutationResponse::default());
        }

        let rows: Vec<Row> = stored
            .into_iter()
            .map(|mut row| {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                row
            })
            .collect();
        self.upsert(rows).await
    }

    /// Backfill absent non-nullable columns from the stored row; `None`
    /// when the key matches nothing.
    async fn complete_row(&self, pk: &str, id: Value, mut row: Row) -> Result<Option<Row>> {
        let needs_backfill = self
            .cache
            .properties
            .logical_to_backend
            .values()
            .any(|column| {
                !row.contains_key(column)
                    && !self
                        .cache
                        .properties
                        .nullable
                        .get(column)
                        .copied()
                        .unwrap_or(false)
            });
        if !needs_backfill {
            return Ok(Some(row));
        }

        let filter = format!("{pk} == {}", FilterValue::from(id).render());
        debug!(collection = %self.cache.collection_name, %filter, "Backfilling update payload");
        let request = QueryRequest {
            collection_name: self.cache.collection_name.clone(),
            filter: Some(filter),
            ids: Vec::new(),
            output_fields: self.cache.properties.backend_columns(),
            partition_names: self.partition.clone().into_iter().collect(),
            limit: Some(1),
            offset: None,
            consistency_level: None,
            ignore_growing: None,
        };
        let mut stored = self.query_with_retry(request).await?;
        let Some(stored_row) = stored.pop() else {
            return Ok(None);
        };
        for (column, value) in stored_row {
            row.entry(column).or_insert(value);
        }
        Ok(Some(row))
    }

    async fn query_with_retry(&self, request: QueryRequest) -> Result<Vec<Row>> {
        let backend = Arc::clone(&self.backend);
        let response = execute_with_retry(
            || {
                let backend = Arc::clone(&backend);
                let request = request.clone();
                async move { backend.query(request).await }
            },
            &self.cache.schema,
            self.backend.as_ref(),
            self.max_retries,
        )
        .await?;
        Ok(response.rows)
    }

    async fn upsert(&self, rows: Vec<Row>) -> Result<MutationResponse> {
        let request = UpsertRequest {
            collection_name: self.cache.collection_name.clone(),
            partition_name: self.partition.clone(),
            rows,
        };
        debug!(
            collection = %request.collection_name,
            rows = request.rows.len(),
            "Upserting rows"
        );
        let backend = Arc::clone(&self.backend);
        execute_with_retry(
            || {
                let backend = Arc::clone(&backend);
                let request = request.clone();
                async move { backend.upsert(request).await }
            },
            &self.cache.schema,
            self.backend.as_ref(),
            self.max_retries,
        )
        .await
    }
}

impl<E: Entity> Conditions<E> for UpdateWrapper<E> {
    fn filter_mut(&mut self) -> &mut Filter<E> {
        &mut self.filter
    }
}

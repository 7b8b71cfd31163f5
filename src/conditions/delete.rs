//! Delete wrapper: removal by id list and/or filter expression

use crate::backend::models::{DeleteRequest, MutationResponse};
use crate::backend::VectorBackend;
use crate::conditions::filter::{Conditions, Filter};
use crate::conditions::retry::execute_with_retry;
use crate::error::{MapperError, Result};
use crate::schema::entity::Entity;
use crate::schema::registry::ConversionCache;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Fluent delete builder for entity type `E`
pub struct DeleteWrapper<E: Entity> {
    filter: Filter<E>,
    cache: Arc<ConversionCache>,
    backend: Arc<dyn VectorBackend>,
    max_retries: usize,
    ids: Vec<Value>,
    partition: Option<String>,
}

impl<E: Entity> DeleteWrapper<E> {
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
            ids: Vec::new(),
            partition: None,
        }
    }

    pub fn id(mut self, id: impl Into<Value>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = Value>) -> Self {
        self.ids.extend(ids);
        self
    }

    pub fn partition(mut self, name: impl Into<String>) -> Self {
        self.partition = Some(name.into());
        self
    }

    /// Delete everything matching the accumulated ids and conditions
    pub async fn remove(self) -> Result<MutationResponse> {
        let filter = self.filter.build()?;
        if self.ids.is_empty() && filter.is_empty() {
            return Err(MapperError::Validation(
                "Delete requires ids or filter conditions".to_string(),
            ));
        }

        let request = DeleteRequest {
            collection_name: self.cache.collection_name.clone(),
            partition_name: self.partition.clone(),
            ids: self.ids.clone(),
            filter: if filter.is_empty() { None } else { Some(filter) },
        };
        debug!(
            collection = %request.collection_name,
            ids = request.ids.len(),
            "Deleting rows"
        );
        let backend = Arc::clone(&self.backend);
        execute_with_retry(
            || {
                let backend = Arc::clone(&backend);
                let request = request.clone();
                async move { backend.delete(request).await }
            },
            &self.cache.schema,
            self.backend.as_ref(),
            self.max_retries,
        )
        .await
    }

    /// Delete by primary key values
    pub async fn remove_by_id(self, ids: impl IntoIterator<Item = Value>) -> Result<MutationResponse> {
        self.ids(ids).remove().await
    }
}

impl<E: Entity> Conditions<E> for DeleteWrapper<E> {
    fn filter_mut(&mut self) -> &mut Filter<E> {
        &mut self.filter
    }
}

//! Query wrapper: scalar queries, vector searches, hybrid searches
//!
//! One builder covers all three read shapes; which request is issued
//! depends on what was set. Hybrid sub-searches take precedence over a
//! plain vector search, which takes precedence over a scalar query.

use crate::backend::models::{
    AnnSearchRequest, HybridSearchRequest, QueryRequest, Ranker, SearchRequest, VectorData,
};
use crate::backend::VectorBackend;
use crate::conditions::filter::{Conditions, Filter};
use crate::conditions::retry::execute_with_retry;
use crate::error::{MapperError, Result};
use crate::mapper::decode::{decode_hit, decode_row, VectorHit};
use crate::schema::descriptor::{ConsistencyLevel, MetricType};
use crate::schema::entity::{Entity, FieldKey};
use crate::schema::registry::ConversionCache;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const COUNT_EXPR: &str = "count(*)";

/// One branch of a hybrid search
pub struct AnnSearch<E: Entity> {
    filter: Filter<E>,
    anns_field: Option<String>,
    vectors: Vec<VectorData>,
    top_k: usize,
    search_params: HashMap<String, Value>,
}

impl<E: Entity> AnnSearch<E> {
    fn new(filter: Filter<E>) -> Self {
        Self {
            filter,
            anns_field: None,
            vectors: Vec::new(),
            top_k: 10,
            search_params: HashMap::new(),
        }
    }

    pub fn anns_field(mut self, field: impl FieldKey<E>) -> Self {
        self.anns_field = self.filter.resolve(field);
        self
    }

    /// Target the sparse column derived from an analyzer-enabled text
    /// field and search it with raw text.
    pub fn text(mut self, field: impl FieldKey<E>, query: impl Into<String>) -> Self {
        if let Some(column) = self.filter.resolve(field) {
            self.anns_field = Some(format!("{column}_sparse"));
            self.vectors.push(VectorData::Text(query.into()));
        }
        self
    }

    pub fn vector(mut self, vector: Vec<f32>) -> Self {
        self.vectors.push(VectorData::Float(vector));
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn search_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.search_params.insert(key.into(), value);
        self
    }

    fn into_request(self) -> Result<AnnSearchRequest> {
        let filter = self.filter.build()?;
        let anns_field = self.anns_field.ok_or_else(|| {
            MapperError::Validation("Hybrid sub-search requires a vector field".to_string())
        })?;
        if self.vectors.is_empty() {
            return Err(MapperError::Validation(
                "Hybrid sub-search requires at least one query vector".to_string(),
            ));
        }
        Ok(AnnSearchRequest {
            vectors: self.vectors,
            anns_field,
            filter: non_empty(filter),
            top_k: self.top_k,
            search_params: self.search_params,
        })
    }
}

impl<E: Entity> Conditions<E> for AnnSearch<E> {
    fn filter_mut(&mut self) -> &mut Filter<E> {
        &mut self.filter
    }
}

/// Fluent read-request builder for entity type `E`
pub struct QueryWrapper<E: Entity> {
    filter: Filter<E>,
    cache: Arc<ConversionCache>,
    backend: Arc<dyn VectorBackend>,
    max_retries: usize,
    vectors: Vec<VectorData>,
    anns_field: Option<String>,
    top_k: Option<usize>,
    limit: Option<usize>,
    offset: Option<usize>,
    output_fields: Option<Vec<String>>,
    partitions: Vec<String>,
    search_params: HashMap<String, Value>,
    group_by: Option<String>,
    group_size: Option<usize>,
    strict_group_size: Option<bool>,
    round_decimal: Option<i32>,
    guarantee_timestamp: Option<u64>,
    graceful_time: Option<u64>,
    ignore_growing: Option<bool>,
    consistency: Option<ConsistencyLevel>,
    alias: Option<String>,
    sub_searches: Vec<AnnSearchRequest>,
    ranker: Option<Ranker>,
}

impl<E: Entity> QueryWrapper<E> {
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
            vectors: Vec::new(),
            anns_field: None,
            top_k: None,
            limit: None,
            offset: None,
            output_fields: None,
            partitions: Vec::new(),
            search_params: HashMap::new(),
            group_by: None,
            group_size: None,
            strict_group_size: None,
            round_decimal: None,
            guarantee_timestamp: None,
            graceful_time: None,
            ignore_growing: None,
            consistency: None,
            alias: None,
            sub_searches: Vec::new(),
            ranker: None,
        }
    }

    pub fn vector(mut self, vector: Vec<f32>) -> Self {
        self.vectors.push(VectorData::Float(vector));
        self
    }

    pub fn anns_field(mut self, field: impl FieldKey<E>) -> Self {
        self.anns_field = self.filter.resolve(field);
        self
    }

    /// Full-text search: targets the derived sparse column of an
    /// analyzer-enabled field with a raw text query.
    pub fn text_vector(mut self, field: impl FieldKey<E>, query: impl Into<String>) -> Self {
        if let Some(column) = self.filter.resolve(field) {
            self.anns_field = Some(format!("{column}_sparse"));
            self.vectors.push(VectorData::Text(query.into()));
        }
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Project a specific field instead of the default full mapping
    pub fn output(mut self, field: impl FieldKey<E>) -> Self {
        if let Some(column) = self.filter.resolve(field) {
            self.output_fields.get_or_insert_with(Vec::new).push(column);
        }
        self
    }

    pub fn partition(mut self, name: impl Into<String>) -> Self {
        self.partitions.push(name.into());
        self
    }

    pub fn search_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.search_params.insert(key.into(), value);
        self
    }

    /// Minimum similarity bound for range search
    pub fn radius(self, radius: f64) -> Self {
        self.search_param("radius", json!(radius))
    }

    /// Inner bound paired with `radius`
    pub fn range_filter(self, range_filter: f64) -> Self {
        self.search_param("range_filter", json!(range_filter))
    }

    pub fn metric_type(self, metric: MetricType) -> Self {
        self.search_param("metric_type", json!(metric.as_str()))
    }

    pub fn group_by(mut self, field: impl FieldKey<E>) -> Self {
        self.group_by = self.filter.resolve(field);
        self
    }

    pub fn group_size(mut self, size: usize) -> Self {
        self.group_size = Some(size);
        self
    }

    pub fn strict_group_size(mut self, strict: bool) -> Self {
        self.strict_group_size = Some(strict);
        self
    }

    pub fn round_decimal(mut self, decimals: i32) -> Self {
        self.round_decimal = Some(decimals);
        self
    }

    pub fn guarantee_timestamp(mut self, ts: u64) -> Self {
        self.guarantee_timestamp = Some(ts);
        self
    }

    pub fn graceful_time(mut self, millis: u64) -> Self {
        self.graceful_time = Some(millis);
        self
    }

    pub fn ignore_growing(mut self, ignore: bool) -> Self {
        self.ignore_growing = Some(ignore);
        self
    }

    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }

    /// Address the collection through an alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Attach a hybrid sub-search built in a fresh sub-builder
    pub fn hybrid(mut self, build: impl FnOnce(AnnSearch<E>) -> AnnSearch<E>) -> Self {
        let sub = build(AnnSearch::new(Filter::new(Arc::clone(
            self.filter.registry(),
        ))));
        match sub.into_request() {
            Ok(request) => self.sub_searches.push(request),
            Err(err) => self.filter.record_error(err),
        }
        self
    }

    pub fn ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = Some(ranker);
        self
    }

    fn collection_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.cache.collection_name.clone())
    }

    fn resolved_outputs(&self) -> Vec<String> {
        self.output_fields
            .clone()
            .unwrap_or_else(|| self.cache.properties.backend_columns())
    }

    /// Execute the accumulated request.
    ///
    /// Hybrid when sub-searches are attached, vector search when query
    /// vectors are set, scalar filter query otherwise.
    pub async fn query(self) -> Result<Vec<VectorHit<E>>> {
        if !self.sub_searches.is_empty() {
            return self.run_hybrid().await;
        }
        if !self.vectors.is_empty() {
            return self.run_search().await;
        }
        self.run_scalar().await
    }

    /// Matching-row count via the aggregate pseudo-column
    pub async fn count(self) -> Result<i64> {
        let filter = self.filter.build()?;
        let request = QueryRequest {
            collection_name: self.collection_name(),
            filter: non_empty(filter),
            ids: Vec::new(),
            output_fields: vec![COUNT_EXPR.to_string()],
            partition_names: self.partitions.clone(),
            limit: None,
            offset: None,
            consistency_level: self.consistency.map(|c| c.as_str().to_string()),
            ignore_growing: self.ignore_growing,
        };
        let response = self
            .with_retry(move |backend, request| async move { backend.query(request).await }, request)
            .await?;
        Ok(response
            .rows
            .first()
            .and_then(|row| row.get(COUNT_EXPR))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Fetch whole entities by primary key; missing ids are skipped
    pub async fn get_by_id(self, ids: Vec<Value>) -> Result<Vec<E>> {
        let request = QueryRequest {
            collection_name: self.collection_name(),
            filter: None,
            ids,
            output_fields: self.resolved_outputs(),
            partition_names: self.partitions.clone(),
            limit: None,
            offset: None,
            consistency_level: self.consistency.map(|c| c.as_str().to_string()),
            ignore_growing: self.ignore_growing,
        };
        let properties = self.cache.properties.clone();
        let response = self
            .with_retry(move |backend, request| async move { backend.query(request).await }, request)
            .await?;
        response
            .rows
            .into_iter()
            .map(|row| decode_row::<E>(&properties, row))
            .collect()
    }

    async fn run_scalar(self) -> Result<Vec<VectorHit<E>>> {
        let filter = self.filter.build()?;
        let request = QueryRequest {
            collection_name: self.collection_name(),
            filter: non_empty(filter),
            ids: Vec::new(),
            output_fields: self.resolved_outputs(),
            partition_names: self.partitions.clone(),
            limit: self.limit,
            offset: self.offset,
            consistency_level: self.consistency.map(|c| c.as_str().to_string()),
            ignore_growing: self.ignore_growing,
        };
        debug!(collection = %request.collection_name, "Running scalar query");
        let properties = self.cache.properties.clone();
        let response = self
            .with_retry(move |backend, request| async move { backend.query(request).await }, request)
            .await?;
        response
            .rows
            .into_iter()
            .map(|row| {
                decode_row::<E>(&properties, row).map(|entity| VectorHit {
                    id: None,
                    score: None,
                    entity,
                })
            })
            .collect()
    }

    async fn run_search(self) -> Result<Vec<VectorHit<E>>> {
        let filter = self.filter.build()?;
        let request = SearchRequest {
            collection_name: self.collection_name(),
            vectors: self.vectors.clone(),
            anns_field: self.anns_field.clone(),
            filter: non_empty(filter),
            top_k: self.top_k.or(self.limit),
            offset: self.offset,
            output_fields: self.resolved_outputs(),
            partition_names: self.partitions.clone(),
            search_params: self.search_params.clone(),
            group_by_field: self.group_by.clone(),
            group_size: self.group_size,
            strict_group_size: self.strict_group_size,
            round_decimal: self.round_decimal,
            ignore_growing: self.ignore_growing,
            consistency_level: self.consistency.map(|c| c.as_str().to_string()),
            guarantee_timestamp: self.guarantee_timestamp,
            graceful_time: self.graceful_time,
        };
        debug!(
            collection = %request.collection_name,
            vectors = request.vectors.len(),
            "Running vector search"
        );
        let properties = self.cache.properties.clone();
        let response = self
            .with_retry(
                move |backend, request| async move { backend.search(request).await },
                request,
            )
            .await?;
        response
            .hits
            .into_iter()
            .map(|hit| decode_hit::<E>(&properties, hit))
            .collect()
    }

    async fn run_hybrid(self) -> Result<Vec<VectorHit<E>>> {
        // Surface any error recorded while sub-searches were attached.
        self.filter.build()?;
        let ranker = self.ranker.clone().unwrap_or(Ranker::Rrf { k: 60 });
        let request = HybridSearchRequest {
            collection_name: self.collection_name(),
            requests: self.sub_searches.clone(),
            ranker,
            top_k: self.top_k.or(self.limit).unwrap_or(10),
            output_fields: self.resolved_outputs(),
            partition_names: self.partitions.clone(),
            round_decimal: self.round_decimal,
            consistency_level: self.consistency.map(|c| c.as_str().to_string()),
        };
        debug!(
            collection = %request.collection_name,
            branches = request.requests.len(),
            "Running hybrid search"
        );
        let properties = self.cache.properties.clone();
        let response = self
            .with_retry(
                move |backend, request| async move { backend.hybrid_search(request).await },
                request,
            )
            .await?;
        response
            .hits
            .into_iter()
            .map(|hit| decode_hit::<E>(&properties, hit))
            .collect()
    }

    async fn with_retry<R, T, F, Fut>(&self, call: F, request: R) -> Result<T>
    where
        R: Clone,
        F: Fn(Arc<dyn VectorBackend>, R) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let backend = Arc::clone(&self.backend);
        execute_with_retry(
            || call(Arc::clone(&backend), request.clone()),
            &self.cache.schema,
            self.backend.as_ref(),
            self.max_retries,
        )
        .await
    }
}

impl<E: Entity> Conditions<E> for QueryWrapper<E> {
    fn filter_mut(&mut self) -> &mut Filter<E> {
        &mut self.filter
    }
}

fn non_empty(filter: String) -> Option<String> {
    if filter.is_empty() {
        None
    } else {
        Some(filter)
    }
}

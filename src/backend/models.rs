//! Request and response shapes exchanged with the vector backend
//!
//! These mirror the gRPC/REST surface of a Milvus-style server closely
//! enough that a concrete client can translate them one-to-one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One stored or returned record, keyed by backend column name
pub type Row = serde_json::Map<String, Value>;

/// Column definition inside a collection schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub partition_key: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub max_capacity: Option<usize>,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub analyzer_params: Option<Value>,
    #[serde(default)]
    pub enable_analyzer: bool,
    #[serde(default)]
    pub enable_match: bool,
}

/// Index definition sent at collection-creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub field_name: String,
    pub index_name: String,
    pub index_type: String,
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Server-side function attached to the schema, e.g. BM25 embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub function_type: String,
    pub input_field_names: Vec<String>,
    pub output_field_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    pub collection_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub functions: Vec<FunctionSchema>,
    #[serde(default)]
    pub enable_dynamic_field: bool,
    pub consistency_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexRequest {
    pub collection_name: String,
    pub indexes: Vec<IndexSchema>,
}

/// Load state reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    NotExist,
    NotLoad,
    Loading,
    Loaded,
}

/// Query vector payload for a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VectorData {
    /// Dense float vector
    Float(Vec<f32>),
    /// Raw text, embedded server-side for full-text search
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub collection_name: String,
    pub vectors: Vec<VectorData>,
    #[serde(default)]
    pub anns_field: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub partition_names: Vec<String>,
    #[serde(default)]
    pub search_params: HashMap<String, Value>,
    #[serde(default)]
    pub group_by_field: Option<String>,
    #[serde(default)]
    pub group_size: Option<usize>,
    #[serde(default)]
    pub strict_group_size: Option<bool>,
    #[serde(default)]
    pub round_decimal: Option<i32>,
    #[serde(default)]
    pub ignore_growing: Option<bool>,
    #[serde(default)]
    pub consistency_level: Option<String>,
    #[serde(default)]
    pub guarantee_timestamp: Option<u64>,
    #[serde(default)]
    pub graceful_time: Option<u64>,
}

/// One sub-request of a hybrid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnSearchRequest {
    pub vectors: Vec<VectorData>,
    pub anns_field: String,
    #[serde(default)]
    pub filter: Option<String>,
    pub top_k: usize,
    #[serde(default)]
    pub search_params: HashMap<String, Value>,
}

/// Result fusion strategy for hybrid searches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ranker {
    /// Reciprocal rank fusion with smoothing constant `k`
    Rrf { k: u32 },
    /// Weighted sum, one weight per sub-request
    Weighted { weights: Vec<f32> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridSearchRequest {
    pub collection_name: String,
    pub requests: Vec<AnnSearchRequest>,
    pub ranker: Ranker,
    pub top_k: usize,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub partition_names: Vec<String>,
    #[serde(default)]
    pub round_decimal: Option<i32>,
    #[serde(default)]
    pub consistency_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection_name: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub ids: Vec<Value>,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub partition_names: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub consistency_level: Option<String>,
    #[serde(default)]
    pub ignore_growing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRequest {
    pub collection_name: String,
    #[serde(default)]
    pub partition_name: Option<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub collection_name: String,
    #[serde(default)]
    pub partition_name: Option<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub collection_name: String,
    #[serde(default)]
    pub partition_name: Option<String>,
    #[serde(default)]
    pub ids: Vec<Value>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
}

/// One scored match from a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub score: Option<f32>,
    pub entity: Row,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationResponse {
    pub insert_count: usize,
    pub delete_count: usize,
    pub upsert_count: usize,
    #[serde(default)]
    pub primary_keys: Vec<Value>,
}

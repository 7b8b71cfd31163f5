//! Vector backend abstraction
//!
//! The mapper talks to the server exclusively through this trait, so
//! any Milvus-compatible transport (gRPC, REST, an in-process fake for
//! tests) can sit behind it.

pub mod models;

pub use models::{
    AnnSearchRequest, CreateCollectionRequest, CreateIndexRequest, DeleteRequest, FieldSchema,
    FunctionSchema, HybridSearchRequest, IndexSchema, InsertRequest, LoadState, MutationResponse,
    QueryRequest, QueryResponse, Ranker, Row, SearchHit, SearchRequest, SearchResponse,
    UpsertRequest, VectorData,
};

use crate::error::Result;
use async_trait::async_trait;

/// Operations the mapper needs from a vector database client
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn has_collection(&self, collection_name: &str) -> Result<bool>;

    async fn create_collection(&self, request: CreateCollectionRequest) -> Result<()>;

    async fn create_index(&self, request: CreateIndexRequest) -> Result<()>;

    async fn create_alias(&self, collection_name: &str, alias: &str) -> Result<()>;

    async fn get_load_state(&self, collection_name: &str) -> Result<LoadState>;

    async fn load_collection(&self, collection_name: &str) -> Result<()>;

    async fn has_partition(&self, collection_name: &str, partition_name: &str) -> Result<bool>;

    async fn create_partition(&self, collection_name: &str, partition_name: &str) -> Result<()>;

    async fn load_partitions(
        &self,
        collection_name: &str,
        partition_names: &[String],
    ) -> Result<()>;

    async fn insert(&self, request: InsertRequest) -> Result<MutationResponse>;

    async fn upsert(&self, request: UpsertRequest) -> Result<MutationResponse>;

    async fn delete(&self, request: DeleteRequest) -> Result<MutationResponse>;

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse>;

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse>;

    async fn hybrid_search(&self, request: HybridSearchRequest) -> Result<SearchResponse>;
}

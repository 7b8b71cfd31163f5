//! End-to-end mapper tests against an in-process backend fake

use async_trait::async_trait;
use milvus_mapper::backend::models::*;
use milvus_mapper::backend::VectorBackend;
use milvus_mapper::conditions::Conditions;
use milvus_mapper::error::{MapperError, Result, COLLECTION_NOT_LOADED};
use milvus_mapper::mapper::MilvusMapper;
use milvus_mapper::schema::{
    CollectionMeta, DataType, Entity, FieldMeta, FieldRef, IndexMeta, IndexType, MetricType,
    SchemaRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Face {
    #[serde(default)]
    face_id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vector: Vec<f32>,
}

impl Face {
    const NAME: FieldRef<Face> = FieldRef::new("name");
}

impl Entity for Face {
    fn collection() -> CollectionMeta {
        CollectionMeta::new("faces").alias("faces_live")
    }

    fn fields() -> Vec<FieldMeta> {
        vec![
            FieldMeta::new("face_id", DataType::Int64)
                .primary_key()
                .auto_id(),
            FieldMeta::new("name", DataType::VarChar)
                .backend_name("person_name")
                .max_length(64),
            FieldMeta::new("vector", DataType::FloatVector)
                .dimension(4)
                .index(IndexMeta::new(IndexType::Hnsw).with_metric(MetricType::Cosine)),
        ]
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    query_failures: VecDeque<String>,
    query_rows: Vec<Row>,
    search_hits: Vec<SearchHit>,
    collection_exists: bool,
    loaded: bool,
    insert_requests: Vec<InsertRequest>,
    upsert_requests: Vec<UpsertRequest>,
    delete_requests: Vec<DeleteRequest>,
    query_requests: Vec<QueryRequest>,
    search_requests: Vec<SearchRequest>,
    hybrid_requests: Vec<HybridSearchRequest>,
}

#[derive(Default)]
struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn call_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }
}

#[async_trait]
impl VectorBackend for MockBackend {
    async fn has_collection(&self, _collection_name: &str) -> Result<bool> {
        self.record("has_collection");
        Ok(self.state.lock().unwrap().collection_exists)
    }

    async fn create_collection(&self, _request: CreateCollectionRequest) -> Result<()> {
        self.record("create_collection");
        self.state.lock().unwrap().collection_exists = true;
        Ok(())
    }

    async fn create_index(&self, _request: CreateIndexRequest) -> Result<()> {
        self.record("create_index");
        Ok(())
    }

    async fn create_alias(&self, _collection_name: &str, _alias: &str) -> Result<()> {
        self.record("create_alias");
        Ok(())
    }

    async fn get_load_state(&self, _collection_name: &str) -> Result<LoadState> {
        self.record("get_load_state");
        let loaded = self.state.lock().unwrap().loaded;
        Ok(if loaded {
            LoadState::Loaded
        } else {
            LoadState::NotLoad
        })
    }

    async fn load_collection(&self, _collection_name: &str) -> Result<()> {
        self.record("load_collection");
        self.state.lock().unwrap().loaded = true;
        Ok(())
    }

    async fn has_partition(&self, _collection_name: &str, _partition_name: &str) -> Result<bool> {
        self.record("has_partition");
        Ok(true)
    }

    async fn create_partition(&self, _collection_name: &str, _partition_name: &str) -> Result<()> {
        self.record("create_partition");
        Ok(())
    }

    async fn load_partitions(
        &self,
        _collection_name: &str,
        _partition_names: &[String],
    ) -> Result<()> {
        self.record("load_partitions");
        Ok(())
    }

    async fn insert(&self, request: InsertRequest) -> Result<MutationResponse> {
        self.record("insert");
        let mut state = self.state.lock().unwrap();
        let count = request.rows.len();
        state.insert_requests.push(request);
        Ok(MutationResponse {
            insert_count: count,
            ..Default::default()
        })
    }

    async fn upsert(&self, request: UpsertRequest) -> Result<MutationResponse> {
        self.record("upsert");
        let mut state = self.state.lock().unwrap();
        let count = request.rows.len();
        state.upsert_requests.push(request);
        Ok(MutationResponse {
            upsert_count: count,
            ..Default::default()
        })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<MutationResponse> {
        self.record("delete");
        let mut state = self.state.lock().unwrap();
        let count = request.ids.len();
        state.delete_requests.push(request);
        Ok(MutationResponse {
            delete_count: count,
            ..Default::default()
        })
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.record("query");
        let mut state = self.state.lock().unwrap();
        state.query_requests.push(request);
        if let Some(message) = state.query_failures.pop_front() {
            return Err(MapperError::Backend(message));
        }
        Ok(QueryResponse {
            rows: state.query_rows.clone(),
        })
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.record("search");
        let mut state = self.state.lock().unwrap();
        state.search_requests.push(request);
        Ok(SearchResponse {
            hits: state.search_hits.clone(),
        })
    }

    async fn hybrid_search(&self, request: HybridSearchRequest) -> Result<SearchResponse> {
        self.record("hybrid_search");
        let mut state = self.state.lock().unwrap();
        state.hybrid_requests.push(request);
        Ok(SearchResponse {
            hits: state.search_hits.clone(),
        })
    }
}

fn mapper_with(backend: Arc<MockBackend>) -> MilvusMapper<Face> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    MilvusMapper::new(backend, Arc::new(SchemaRegistry::new()))
}

fn stored_face_row(id: i64, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("face_id".to_string(), json!(id));
    row.insert("person_name".to_string(), json!(name));
    row.insert("vector".to_string(), json!([0.1, 0.2, 0.3, 0.4]));
    row
}

#[tokio::test]
async fn test_retry_reloads_once_on_unloaded_collection() {
    let backend = Arc::new(MockBackend::default());
    backend
        .state
        .lock()
        .unwrap()
        .query_failures
        .push_back(format!("rpc error: {COLLECTION_NOT_LOADED}"));
    backend.state.lock().unwrap().query_rows = vec![stored_face_row(1, "Ada")];

    let mapper = mapper_with(Arc::clone(&backend));
    let faces = mapper.get_by_id(vec![json!(1)]).await.unwrap();

    assert_eq!(faces.len(), 1);
    assert_eq!(faces[0].name.as_deref(), Some("Ada"));
    assert_eq!(backend.call_count("query"), 2);
    assert_eq!(backend.call_count("load_collection"), 1);
}

#[tokio::test]
async fn test_non_transient_failure_is_not_retried() {
    let backend = Arc::new(MockBackend::default());
    backend
        .state
        .lock()
        .unwrap()
        .query_failures
        .push_back("permission denied".to_string());

    let mapper = mapper_with(Arc::clone(&backend));
    let err = mapper.get_by_id(vec![json!(1)]).await.unwrap_err();

    assert!(matches!(err, MapperError::Backend(_)));
    assert_eq!(backend.call_count("query"), 1);
    assert_eq!(backend.call_count("load_collection"), 0);
}

#[tokio::test]
async fn test_retry_gives_up_after_bound() {
    let backend = Arc::new(MockBackend::default());
    {
        let mut state = backend.state.lock().unwrap();
        for _ in 0..5 {
            state
                .query_failures
                .push_back(COLLECTION_NOT_LOADED.to_string());
        }
    }

    let mapper = mapper_with(Arc::clone(&backend));
    let err = mapper.get_by_id(vec![json!(1)]).await.unwrap_err();

    assert!(err.is_collection_not_loaded());
    assert_eq!(backend.call_count("query"), 2);
}

#[tokio::test]
async fn test_insert_synthesizes_increasing_ids() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    let faces: Vec<Face> = (0..3)
        .map(|i| Face {
            face_id: None,
            name: Some(format!("face-{i}")),
            vector: vec![0.0; 4],
        })
        .collect();
    let response = mapper.insert(&faces).await.unwrap();
    assert_eq!(response.insert_count, 3);

    let state = backend.state.lock().unwrap();
    let rows = &state.insert_requests[0].rows;
    let ids: Vec<i64> = rows
        .iter()
        .map(|row| row.get("face_id").and_then(Value::as_i64).unwrap())
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_insert_respects_provided_id() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    let face = Face {
        face_id: Some(42),
        name: Some("Ada".to_string()),
        vector: vec![0.0; 4],
    };
    mapper.insert(&[face]).await.unwrap();

    let state = backend.state.lock().unwrap();
    let row = &state.insert_requests[0].rows[0];
    assert_eq!(row.get("face_id"), Some(&json!(42)));
    assert_eq!(row.get("person_name"), Some(&json!("Ada")));
    assert!(!row.contains_key("name"));
}

#[tokio::test]
async fn test_update_by_id_requires_primary_key_in_payload() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(backend);

    let face = Face {
        face_id: None,
        name: Some("Ada".to_string()),
        vector: vec![0.0; 4],
    };
    let err = mapper.update_by_id(&[face]).await.unwrap_err();
    assert!(matches!(err, MapperError::Domain(_)));
}

#[tokio::test]
async fn test_update_by_id_backfills_missing_fields() {
    let backend = Arc::new(MockBackend::default());
    backend.state.lock().unwrap().query_rows = vec![stored_face_row(7, "Stored")];

    let mapper = mapper_with(Arc::clone(&backend));
    // name absent from the payload; it is non-nullable so the stored
    // value must be fetched and carried over
    let face = Face {
        face_id: Some(7),
        name: None,
        vector: vec![1.0; 4],
    };
    let response = mapper.update_by_id(&[face]).await.unwrap();
    assert_eq!(response.upsert_count, 1);

    let state = backend.state.lock().unwrap();
    assert_eq!(state.query_requests.len(), 1);
    assert_eq!(
        state.query_requests[0].filter.as_deref(),
        Some("face_id == 7")
    );
    let row = &state.upsert_requests[0].rows[0];
    assert_eq!(row.get("person_name"), Some(&json!("Stored")));
    assert_eq!(row.get("vector"), Some(&json!([1.0, 1.0, 1.0, 1.0])));
}

#[tokio::test]
async fn test_update_by_id_skips_rows_with_no_match() {
    let backend = Arc::new(MockBackend::default());

    let mapper = mapper_with(Arc::clone(&backend));
    let face = Face {
        face_id: Some(99),
        name: None,
        vector: vec![1.0; 4],
    };
    let response = mapper.update_by_id(&[face]).await.unwrap();

    assert_eq!(response.upsert_count, 0);
    assert_eq!(backend.call_count("upsert"), 0);
}

#[tokio::test]
async fn test_plain_update_rejected_on_keyed_collection() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(backend);

    let face = Face {
        face_id: Some(1),
        name: Some("Ada".to_string()),
        vector: vec![0.0; 4],
    };
    let err = mapper
        .update_wrapper()
        .unwrap()
        .eq(Face::NAME, "Ada")
        .update(&face)
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::Domain(_)));
}

#[tokio::test]
async fn test_query_shape_selection() {
    let backend = Arc::new(MockBackend::default());
    backend.state.lock().unwrap().search_hits = vec![SearchHit {
        id: Some(json!(1)),
        score: Some(0.9),
        entity: stored_face_row(1, "Ada"),
    }];

    let mapper = mapper_with(Arc::clone(&backend));

    // scalar: no vectors
    mapper
        .query_wrapper()
        .unwrap()
        .eq(Face::NAME, "Ada")
        .query()
        .await
        .unwrap();
    assert_eq!(backend.calls().last().map(String::as_str), Some("query"));

    // vector search
    let hits = mapper
        .query_wrapper()
        .unwrap()
        .vector(vec![0.1, 0.2, 0.3, 0.4])
        .anns_field("vector")
        .top_k(5)
        .query()
        .await
        .unwrap();
    assert_eq!(backend.calls().last().map(String::as_str), Some("search"));
    assert_eq!(hits[0].score, Some(0.9));
    assert_eq!(hits[0].entity.name.as_deref(), Some("Ada"));

    // hybrid search
    mapper
        .query_wrapper()
        .unwrap()
        .hybrid(|sub| sub.anns_field("vector").vector(vec![0.1; 4]).top_k(3))
        .ranker(Ranker::Rrf { k: 60 })
        .query()
        .await
        .unwrap();
    assert_eq!(
        backend.calls().last().map(String::as_str),
        Some("hybrid_search")
    );
}

#[tokio::test]
async fn test_text_vector_targets_derived_sparse_column() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    mapper
        .query_wrapper()
        .unwrap()
        .text_vector(Face::NAME, "smiling portrait")
        .top_k(5)
        .query()
        .await
        .unwrap();
    assert_eq!(backend.calls().last().map(String::as_str), Some("search"));

    let state = backend.state.lock().unwrap();
    let request = &state.search_requests[0];
    // backend-name rename flows into the sparse column derivation
    assert_eq!(request.anns_field.as_deref(), Some("person_name_sparse"));
    assert_eq!(
        request.vectors,
        vec![VectorData::Text("smiling portrait".to_string())]
    );
}

#[tokio::test]
async fn test_hybrid_text_branch_targets_derived_sparse_column() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    mapper
        .query_wrapper()
        .unwrap()
        .hybrid(|sub| sub.text(Face::NAME, "smiling").top_k(3))
        .query()
        .await
        .unwrap();

    let state = backend.state.lock().unwrap();
    let branch = &state.hybrid_requests[0].requests[0];
    assert_eq!(branch.anns_field, "person_name_sparse");
    assert_eq!(branch.vectors, vec![VectorData::Text("smiling".to_string())]);
    assert_eq!(branch.top_k, 3);
}

#[tokio::test]
async fn test_count_reads_aggregate_column() {
    let backend = Arc::new(MockBackend::default());
    let mut row = Row::new();
    row.insert("count(*)".to_string(), json!(12));
    backend.state.lock().unwrap().query_rows = vec![row];

    let mapper = mapper_with(Arc::clone(&backend));
    let count = mapper.query_wrapper().unwrap().count().await.unwrap();
    assert_eq!(count, 12);

    let state = backend.state.lock().unwrap();
    assert_eq!(state.query_requests[0].output_fields, vec!["count(*)"]);
}

#[tokio::test]
async fn test_query_projects_all_mapped_fields_by_default() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    mapper.query_wrapper().unwrap().query().await.unwrap();

    let state = backend.state.lock().unwrap();
    assert_eq!(
        state.query_requests[0].output_fields,
        vec!["face_id", "person_name", "vector"]
    );
}

#[tokio::test]
async fn test_delete_requires_ids_or_filter() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    let err = mapper
        .delete_wrapper()
        .unwrap()
        .remove()
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::Validation(_)));

    let response = mapper
        .delete_wrapper()
        .unwrap()
        .eq(Face::NAME, "Ada")
        .remove()
        .await
        .unwrap();
    assert_eq!(response.delete_count, 0);

    let state = backend.state.lock().unwrap();
    assert_eq!(
        state.delete_requests[0].filter.as_deref(),
        Some("person_name == 'Ada'")
    );
}

#[tokio::test]
async fn test_remove_by_id_passes_ids_through() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    let response = mapper
        .remove_by_id(vec![json!(1), json!(2)])
        .await
        .unwrap();
    assert_eq!(response.delete_count, 2);
}

#[tokio::test]
async fn test_ensure_collection_creates_when_missing() {
    let backend = Arc::new(MockBackend::default());
    let mapper = mapper_with(Arc::clone(&backend));

    mapper.ensure_collection().await.unwrap();
    assert_eq!(backend.call_count("create_collection"), 1);
    assert_eq!(backend.call_count("create_index"), 1);
    assert_eq!(backend.call_count("create_alias"), 1);
    assert_eq!(backend.call_count("load_collection"), 1);

    // second run only reconciles load state
    mapper.ensure_collection().await.unwrap();
    assert_eq!(backend.call_count("create_collection"), 1);
    assert_eq!(backend.call_count("create_alias"), 1);
}

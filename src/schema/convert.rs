//! Conversion engine and collection bootstrap
//!
//! Turns declarative entity metadata into a backend-ready schema, and
//! reconciles collection/partition load state against the server.

use crate::backend::models::{
    CreateCollectionRequest, CreateIndexRequest, FieldSchema, FunctionSchema, IndexSchema,
    LoadState,
};
use crate::backend::VectorBackend;
use crate::error::{MapperError, Result};
use crate::schema::descriptor::{DataType, FieldMeta, IndexMeta, IndexType, MetricType};
use crate::schema::entity::Entity;
use crate::schema::registry::{ConversionCache, EntitySchema, PropertyTable};
use std::collections::HashMap;
use tracing::{debug, info};

const SPARSE_SUFFIX: &str = "_sparse";
const SPARSE_INDEX_SUFFIX: &str = "_sparse_index";
const BM25_FUNCTION_SUFFIX: &str = "_bm25_emb";

/// Build the full conversion result for `E` from its declared metadata.
///
/// Pure function of the metadata; the registry caches the result so
/// this runs once per entity type.
pub fn build_conversion<E: Entity>() -> Result<ConversionCache> {
    let collection = E::collection();
    if collection.name.trim().is_empty() {
        return Err(MapperError::Configuration(format!(
            "Entity type '{}' declares an empty collection name",
            std::any::type_name::<E>()
        )));
    }

    let metas = E::fields();
    if metas.is_empty() {
        return Err(MapperError::Configuration(format!(
            "Collection '{}' declares no fields",
            collection.name
        )));
    }

    let mut properties = PropertyTable::default();
    let mut fields = Vec::with_capacity(metas.len());
    let mut indexes = Vec::new();
    let mut functions = Vec::new();
    let mut primary_key = None;
    let mut auto_id = false;

    for meta in &metas {
        let field = convert_field(&collection.name, meta)?;
        let column = field.name.clone();

        if properties.backend_to_logical.contains_key(&column) {
            return Err(MapperError::Configuration(format!(
                "Duplicate backend column '{}' in collection '{}'",
                column, collection.name
            )));
        }
        properties
            .logical_to_backend
            .insert(meta.name.clone(), column.clone());
        properties
            .backend_to_logical
            .insert(column.clone(), meta.name.clone());
        properties
            .accessor_to_backend
            .insert(meta.name.clone(), column.clone());
        properties.nullable.insert(column.clone(), meta.nullable);

        if meta.primary_key {
            if primary_key.is_some() {
                return Err(MapperError::Configuration(format!(
                    "Collection '{}' declares more than one primary key",
                    collection.name
                )));
            }
            primary_key = Some(column.clone());
        }
        auto_id = auto_id || meta.auto_id;

        if let Some(index) = &meta.index {
            indexes.push(convert_index(&column, index));
        }

        // Analyzer-enabled text fields get a derived sparse column fed
        // by a server-side BM25 function, plus an index over it.
        if meta.analyzer.is_some() && meta.data_type == DataType::VarChar {
            let sparse_column = format!("{column}{SPARSE_SUFFIX}");
            fields.push(field);
            fields.push(FieldSchema {
                name: sparse_column.clone(),
                data_type: DataType::SparseFloatVector.as_str().to_string(),
                primary_key: false,
                partition_key: false,
                auto_id: false,
                nullable: false,
                description: None,
                dimension: None,
                max_length: None,
                max_capacity: None,
                element_type: None,
                analyzer_params: None,
                enable_analyzer: false,
                enable_match: false,
            });
            indexes.push(IndexSchema {
                field_name: sparse_column.clone(),
                index_name: format!("{column}{SPARSE_INDEX_SUFFIX}"),
                index_type: IndexType::AutoIndex.as_str().to_string(),
                metric_type: Some(MetricType::Bm25.as_str().to_string()),
                params: HashMap::new(),
            });
            functions.push(FunctionSchema {
                name: format!("{column}{BM25_FUNCTION_SUFFIX}"),
                function_type: "BM25".to_string(),
                input_field_names: vec![column],
                output_field_names: vec![sparse_column],
            });
        } else {
            fields.push(field);
        }
    }

    debug!(
        collection = %collection.name,
        fields = fields.len(),
        indexes = indexes.len(),
        "Built conversion cache"
    );

    let schema = EntitySchema {
        collection_name: collection.name.clone(),
        description: collection.description,
        aliases: collection.aliases,
        consistency: collection.consistency,
        dynamic_field: collection.dynamic_field,
        partitions: collection.partitions,
        fields,
        indexes,
        functions,
    };

    Ok(ConversionCache {
        collection_name: collection.name,
        schema,
        properties,
        primary_key,
        auto_id,
    })
}

fn convert_field(collection_name: &str, meta: &FieldMeta) -> Result<FieldSchema> {
    if meta.name.trim().is_empty() {
        return Err(MapperError::Configuration(format!(
            "Collection '{}' declares a field with a blank name",
            collection_name
        )));
    }

    if meta.dimension.is_some()
        && !matches!(meta.data_type, DataType::FloatVector | DataType::BinaryVector)
    {
        return Err(MapperError::Schema(format!(
            "Field '{}' has a dimension but type {}",
            meta.name,
            meta.data_type.as_str()
        )));
    }
    if matches!(meta.max_length, Some(0)) || matches!(meta.max_capacity, Some(0)) {
        return Err(MapperError::Schema(format!(
            "Field '{}' declares a zero max length or capacity",
            meta.name
        )));
    }

    Ok(FieldSchema {
        name: meta.column_name().to_string(),
        data_type: meta.data_type.as_str().to_string(),
        primary_key: meta.primary_key,
        partition_key: meta.partition_key,
        auto_id: meta.auto_id,
        nullable: meta.nullable,
        description: meta.description.clone(),
        dimension: meta.dimension,
        max_length: meta.max_length,
        max_capacity: meta.max_capacity,
        element_type: meta.element_type.map(|t| t.as_str().to_string()),
        analyzer_params: meta.analyzer.as_ref().map(|a| a.to_json()),
        enable_analyzer: meta.analyzer.is_some(),
        enable_match: meta.enable_match,
    })
}

fn convert_index(column: &str, index: &IndexMeta) -> IndexSchema {
    // Duplicate tuning keys keep the last value.
    let mut params = HashMap::new();
    for (key, value) in &index.extra_params {
        params.insert(key.clone(), value.clone());
    }
    IndexSchema {
        field_name: column.to_string(),
        index_name: index.name.clone().unwrap_or_else(|| column.to_string()),
        index_type: index.index_type.as_str().to_string(),
        metric_type: index.metric_type.map(|m| m.as_str().to_string()),
        params,
    }
}

/// Create the collection, its indexes, and its declared partitions.
///
/// Intended for host startup; at least one index must exist or the
/// collection could never be loaded.
pub async fn create_collection(
    cache: &ConversionCache,
    backend: &dyn VectorBackend,
) -> Result<()> {
    let schema = &cache.schema;
    if schema.indexes.is_empty() {
        return Err(MapperError::Configuration(format!(
            "Collection '{}' declares no index; at least one is required",
            schema.collection_name
        )));
    }

    backend
        .create_collection(CreateCollectionRequest {
            collection_name: schema.collection_name.clone(),
            description: schema.description.clone(),
            fields: schema.fields.clone(),
            functions: schema.functions.clone(),
            enable_dynamic_field: schema.dynamic_field,
            consistency_level: schema.consistency.as_str().to_string(),
        })
        .await?;
    backend
        .create_index(CreateIndexRequest {
            collection_name: schema.collection_name.clone(),
            indexes: schema.indexes.clone(),
        })
        .await?;
    for partition in &schema.partitions {
        backend
            .create_partition(&schema.collection_name, partition)
            .await?;
    }
    for alias in &schema.aliases {
        backend.create_alias(&schema.collection_name, alias).await?;
    }

    info!(collection = %schema.collection_name, "Created collection");
    load_status(schema, backend).await
}

///// Reconcile load state: load the collection if it is not loaded, then
/// make sure every declared partition exists and is loaded. Idempotent;
/// also serves as the reload step of the retry path.
pub async fn load_status(schema: &EntitySchema, backend: &dyn VectorBackend) -> Result<()> {
    let state = backend.get_load_state(&schema.collection_name).await?;
    if state != LoadState::Loaded {
        info!(collection = %schema.collection_name, ?state, "Loading collection");
        backend.load_collection(&schema.collection_name).await?;
    }

    if schema.partitions.is_empty() {
        return Ok(());
    }
    for partition in &schema.partitions {
        if !backend
            .has_partition(&schema.collection_name, partition)
            .await?
        {
            backend
                .create_partition(&schema.collection_name, partition)
                .await?;
        }
    }
    backend
        .load_partitions(&schema.collection_name, &schema.partitions)
        .await
}

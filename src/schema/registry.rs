//! Schema cache and name resolution
//!
//! Conversion results are computed once per entity type and shared via
//! `Arc`. All lookups the builders perform at query-construction time
//! go through the registry, which is cheap to clone and safe to share
//! across tasks.

use crate::backend::models::{FieldSchema, FunctionSchema, IndexSchema};
use crate::error::{MapperError, Result};
use crate::id::IdGenerator;
use crate::schema::convert::build_conversion;
use crate::schema::descriptor::ConsistencyLevel;
use crate::schema::entity::{Entity, FieldRef};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-entity name and nullability tables produced by conversion
#[derive(Debug, Default, Clone)]
pub struct PropertyTable {
    /// Logical field name -> backend column name, in declaration order
    pub logical_to_backend: IndexMap<String, String>,
    /// Backend column name -> logical field name
    pub backend_to_logical: HashMap<String, String>,
    /// Accessor token -> backend column name
    pub accessor_to_backend: HashMap<String, String>,
    /// Backend column name -> whether the column accepts null
    pub nullable: HashMap<String, bool>,
}

impl PropertyTable {
    /// Backend column names in declaration order; the default output
    /// field list for queries.
    pub fn backend_columns(&self) -> Vec<String> {
        self.logical_to_backend.values().cloned().collect()
    }
}

/// Backend-ready schema derived from an entity's metadata
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub collection_name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub consistency: ConsistencyLevel,
    pub dynamic_field: bool,
    pub partitions: Vec<String>,
    pub fields: Vec<FieldSchema>,
    pub indexes: Vec<IndexSchema>,
    pub functions: Vec<FunctionSchema>,
}

/// Everything the mapper needs to know about one entity type
#[derive(Debug, Clone)]
pub struct ConversionCache {
    pub collection_name: String,
    pub schema: EntitySchema,
    pub properties: PropertyTable,
    /// Primary key backend column, if one is declared
    pub primary_key: Option<String>,
    /// Whether ids are generated client-side on insert
    pub auto_id: bool,
}

/// Process-wide schema context.
///
/// Construct one per application (or per test) and hand it to each
/// mapper; there is no global singleton.
pub struct SchemaRegistry {
    caches: DashMap<TypeId, Arc<ConversionCache>>,
    /// Collection name -> primary key backend column
    primary_keys: DashMap<String, String>,
    ids: IdGenerator,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            caches: DashMap::new(),
            primary_keys: DashMap::new(),
            ids: IdGenerator::new(),
        }
    }

    /// Conversion result for `E`, computed on first use.
    ///
    /// Concurrent first calls may both run the conversion; the first
    /// write wins and every caller sees the same `Arc` afterwards.
    pub fn convert<E: Entity>(&self) -> Result<Arc<ConversionCache>> {
        let key = TypeId::of::<E>();
        if let Some(cache) = self.caches.get(&key) {
            return Ok(Arc::clone(cache.value()));
        }

        let built = Arc::new(build_conversion::<E>()?);
        if let Some(pk) = &built.primary_key {
            self.primary_keys
                .insert(built.collection_name.clone(), pk.clone());
        }
        let winner = self
            .caches
            .entry(key)
            .or_insert_with(|| Arc::clone(&built));
        Ok(Arc::clone(winner.value()))
    }

    /// Resolve a registered field reference to its backend column name.
    ///
    /// Unregistered accessors fall back to a scan of the declared
    /// metadata so freshly added consts still resolve.
    pub fn resolve<E: Entity>(&self, field: FieldRef<E>) -> Result<String> {
        let cache = self.convert::<E>()?;
        if let Some(column) = cache.properties.accessor_to_backend.get(field.accessor()) {
            return Ok(column.clone());
        }
        E::fields()
            .iter()
            .find(|meta| meta.name == field.accessor())
            .map(|meta| meta.column_name().to_string())
            .ok_or_else(|| {
                MapperError::Configuration(format!(
                    "Unknown field reference '{}' for collection '{}'",
                    field.accessor(),
                    cache.collection_name
                ))
            })
    }

    /// Primary key column registered for a collection, if any
    pub fn primary_key_of(&self, collection_name: &str) -> Option<String> {
        self.primary_keys
            .get(collection_name)
            .map(|entry| entry.value().clone())
    }

    /// Fresh client-side id for auto-ID inserts
    pub fn next_id(&self) -> i64 {
        self.ids.next_id()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

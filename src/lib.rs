//! milvus-mapper: entity mapping and fluent query construction for
//! Milvus-style vector collections.
//!
//! Entity types implement [`schema::Entity`] to declare their
//! collection, fields, and indexes once; the crate derives and caches
//! the backend schema, and the wrappers in [`conditions`] compile
//! typed predicates, vector-search parameters, and mutation payloads
//! into requests against any [`backend::VectorBackend`].

pub mod backend;
pub mod conditions;
pub mod config;
pub mod error;
pub mod id;
pub mod mapper;
pub mod schema;

pub use backend::VectorBackend;
pub use config::MilvusConfig;
pub use error::{MapperError, Result};
pub use mapper::{MilvusMapper, VectorHit};
pub use schema::{Entity, FieldRef, SchemaRegistry};

/// Common imports for entity declarations and query building
pub mod prelude {
    pub use crate::backend::models::Ranker;
    pub use crate::backend::VectorBackend;
    pub use crate::conditions::{Conditions, Filter, FilterValue};
    pub use crate::config::MilvusConfig;
    pub use crate::error::{MapperError, Result};
    pub use crate::mapper::{MilvusMapper, VectorHit};
    pub use crate::schema::{
        AnalyzerParams, AnalyzerType, CollectionMeta, ConsistencyLevel, DataType, Entity,
        FieldMeta, FieldRef, IndexMeta, IndexType, MetricType, SchemaRegistry,
    };
}

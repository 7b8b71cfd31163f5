//! Entity metadata, schema conversion, and caching

pub mod convert;
pub mod descriptor;
pub mod entity;
pub mod registry;

pub use convert::{build_conversion, create_collection, load_status};
pub use descriptor::{
    AnalyzerParams, AnalyzerType, CollectionMeta, ConsistencyLevel, DataType, FieldMeta, IndexMeta,
    IndexType, MetricType, TokenFilter,
};
pub use entity::{Entity, FieldKey, FieldRef};
pub use registry::{ConversionCache, EntitySchema, PropertyTable, SchemaRegistry};

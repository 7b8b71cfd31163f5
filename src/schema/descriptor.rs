//! Collection and field descriptors
//!
//! Entities describe themselves through these declarative metadata types.
//! The conversion engine turns them into backend schema requests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Scalar and vector column types understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    VarChar,
    Json,
    Array,
    FloatVector,
    BinaryVector,
    SparseFloatVector,
}

impl DataType {
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            DataType::FloatVector | DataType::BinaryVector | DataType::SparseFloatVector
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "Bool",
            DataType::Int8 => "Int8",
            DataType::Int16 => "Int16",
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::VarChar => "VarChar",
            DataType::Json => "JSON",
            DataType::Array => "Array",
            DataType::FloatVector => "FloatVector",
            DataType::BinaryVector => "BinaryVector",
            DataType::SparseFloatVector => "SparseFloatVector",
        }
    }
}

/// Read consistency requested for queries against a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Strong,
    Session,
    #[default]
    Bounded,
    Eventually,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Bounded => "Bounded",
            ConsistencyLevel::Eventually => "Eventually",
        }
    }
}

/// Index algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    AutoIndex,
    Flat,
    IvfFlat,
    IvfSq8,
    IvfPq,
    Hnsw,
    DiskAnn,
    SparseInvertedIndex,
    Inverted,
    Bitmap,
    Trie,
    StlSort,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::AutoIndex => "AUTOINDEX",
            IndexType::Flat => "FLAT",
            IndexType::IvfFlat => "IVF_FLAT",
            IndexType::IvfSq8 => "IVF_SQ8",
            IndexType::IvfPq => "IVF_PQ",
            IndexType::Hnsw => "HNSW",
            IndexType::DiskAnn => "DISKANN",
            IndexType::SparseInvertedIndex => "SPARSE_INVERTED_INDEX",
            IndexType::Inverted => "INVERTED",
            IndexType::Bitmap => "BITMAP",
            IndexType::Trie => "TRIE",
            IndexType::StlSort => "STL_SORT",
        }
    }
}

/// Distance / scoring functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    L2,
    Ip,
    Cosine,
    Hamming,
    Jaccard,
    Bm25,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::L2 => "L2",
            MetricType::Ip => "IP",
            MetricType::Cosine => "COSINE",
            MetricType::Hamming => "HAMMING",
            MetricType::Jaccard => "JACCARD",
            MetricType::Bm25 => "BM25",
        }
    }
}

/// Built-in text analyzers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyzerType {
    Standard,
    English,
    Chinese,
}

impl AnalyzerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerType::Standard => "standard",
            AnalyzerType::English => "english",
            AnalyzerType::Chinese => "chinese",
        }
    }
}

/// Token filters applied after tokenization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenFilter {
    Lowercase,
    AsciiFolding,
    /// Drop tokens longer than the given length
    Length(usize),
    /// Remove the listed stop words
    Stop(Vec<String>),
}

impl TokenFilter {
    fn to_json(&self) -> Value {
        match self {
            TokenFilter::Lowercase => json!("lowercase"),
            TokenFilter::AsciiFolding => json!("asciifolding"),
            TokenFilter::Length(max) => json!({ "type": "length", "max": max }),
            TokenFilter::Stop(words) => json!({ "type": "stop", "stop_words": words }),
        }
    }
}

/// Analyzer configuration for a text-searchable VarChar field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerParams {
    pub analyzer_type: AnalyzerType,
    #[serde(default)]
    pub tokenizer: Option<String>,
    #[serde(default)]
    pub filters: Vec<TokenFilter>,
}

impl AnalyzerParams {
    pub fn new(analyzer_type: AnalyzerType) -> Self {
        Self {
            analyzer_type,
            tokenizer: None,
            filters: Vec::new(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Into<String>) -> Self {
        self.tokenizer = Some(tokenizer.into());
        self
    }

    pub fn with_filter(mut self, filter: TokenFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Render as the JSON object the backend expects in `analyzer_params`
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(tokenizer) = &self.tokenizer {
            map.insert("tokenizer".to_string(), json!(tokenizer));
        } else {
            map.insert("type".to_string(), json!(self.analyzer_type.as_str()));
        }
        if !self.filters.is_empty() {
            let filters: Vec<Value> = self.filters.iter().map(TokenFilter::to_json).collect();
            map.insert("filter".to_string(), Value::Array(filters));
        }
        Value::Object(map)
    }
}

/// Index declaration attached to a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Index name; defaults to the field name during conversion
    #[serde(default)]
    pub name: Option<String>,
    pub index_type: IndexType,
    #[serde(default)]
    pub metric_type: Option<MetricType>,
    /// Extra build parameters; later entries with the same key win
    #[serde(default)]
    pub extra_params: Vec<(String, String)>,
}

impl IndexMeta {
    pub fn new(index_type: IndexType) -> Self {
        Self {
            name: None,
            index_type,
            metric_type: None,
            extra_params: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metric(mut self, metric: MetricType) -> Self {
        self.metric_type = Some(metric);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }
}

/// Declarative description of one entity field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Logical (struct) field name
    pub name: String,
    /// Backend column name override; defaults to the logical name
    #[serde(default)]
    pub backend_name: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub partition_key: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub max_capacity: Option<usize>,
    /// Element type for `Array` fields
    #[serde(default)]
    pub element_type: Option<DataType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub analyzer: Option<AnalyzerParams>,
    /// Whether term-level text matching is enabled on this field
    #[serde(default)]
    pub enable_match: bool,
    #[serde(default)]
    pub index: Option<IndexMeta>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            backend_name: None,
            data_type,
            primary_key: false,
            partition_key: false,
            auto_id: false,
            nullable: false,
            dimension: None,
            max_length: None,
            max_capacity: None,
            element_type: None,
            description: None,
            analyzer: None,
            enable_match: false,
            index: None,
        }
    }

    pub fn backend_name(mut self, name: impl Into<String>) -> Self {
        self.backend_name = Some(name.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn partition_key(mut self) -> Self {
        self.partition_key = true;
        self
    }

    pub fn auto_id(mut self) -> Self {
        self.auto_id = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn dimension(mut self, dim: usize) -> Self {
        self.dimension = Some(dim);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn max_capacity(mut self, cap: usize) -> Self {
        self.max_capacity = Some(cap);
        self
    }

    pub fn element_type(mut self, ty: DataType) -> Self {
        self.element_type = Some(ty);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn analyzer(mut self, params: AnalyzerParams) -> Self {
        self.analyzer = Some(params);
        self
    }

    pub fn enable_match(mut self) -> Self {
        self.enable_match = true;
        self
    }

    pub fn index(mut self, index: IndexMeta) -> Self {
        self.index = Some(index);
        self
    }

    /// Resolved backend column name
    pub fn column_name(&self) -> &str {
        self.backend_name.as_deref().unwrap_or(&self.name)
    }
}

/// Declarative description of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub consistency: ConsistencyLevel,
    /// Whether unmapped columns are kept in a dynamic JSON field
    #[serde(default)]
    pub dynamic_field: bool,
    /// Partitions created and loaded alongside the collection
    #[serde(default)]
    pub partitions: Vec<String>,
}

impl CollectionMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            consistency: ConsistencyLevel::default(),
            dynamic_field: false,
            partitions: Vec::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = level;
        self
    }

    pub fn dynamic_field(mut self) -> Self {
        self.dynamic_field = true;
        self
    }

    pub fn partition(mut self, name: impl Into<String>) -> Self {
        self.partitions.push(name.into());
        self
    }
}

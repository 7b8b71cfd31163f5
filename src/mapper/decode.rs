//! Row encoding and decoding between entities and backend payloads

use crate::backend::models::{Row, SearchHit};
use crate::error::{MapperError, Result};
use crate::schema::entity::Entity;
use crate::schema::registry::PropertyTable;
use serde_json::Value;

/// One decoded search result: the entity plus its score and id when
/// the backend reported them
#[derive(Debug, Clone)]
pub struct VectorHit<E> {
    pub id: Option<Value>,
    pub score: Option<f32>,
    pub entity: E,
}

/// Entity -> backend row. Null and unmapped fields are dropped; column
/// names come from the property table so backend renames apply.
pub fn encode_row<E: Entity>(properties: &PropertyTable, entity: &E) -> Result<Row> {
    let value = serde_json::to_value(entity)?;
    let Value::Object(map) = value else {
        return Err(MapperError::Schema(format!(
            "Entity type '{}' does not serialize to an object",
            std::any::type_name::<E>()
        )));
    };

    let mut row = Row::new();
    for (logical, value) in map {
        if value.is_null() {
            continue;
        }
        if let Some(column) = properties.logical_to_backend.get(&logical) {
            row.insert(column.clone(), value);
        }
    }
    Ok(row)
}

/// Backend row -> entity. Unknown columns (dynamic fields, derived
/// sparse columns) are dropped before deserialization.
pub fn decode_row<E: Entity>(properties: &PropertyTable, row: Row) -> Result<E> {
    let mut logical = Row::new();
    for (column, value) in row {
        if let Some(name) = properties.backend_to_logical.get(&column) {
            logical.insert(name.clone(), value);
        }
    }
    Ok(serde_json::from_value(Value::Object(logical))?)
}

pub fn decode_hit<E: Entity>(properties: &PropertyTable, hit: SearchHit) -> Result<VectorHit<E>> {
    Ok(VectorHit {
        id: hit.id,
        score: hit.score,
        entity: decode_row(properties, hit.entity)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::convert::build_conversion;
    use crate::schema::descriptor::{CollectionMeta, DataType, FieldMeta};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: i64,
        title: String,
        #[serde(default)]
        note: Option<String>,
    }

    impl Entity for Doc {
        fn collection() -> CollectionMeta {
            CollectionMeta::new("docs")
        }
        fn fields() -> Vec<FieldMeta> {
            vec![
                FieldMeta::new("id", DataType::Int64).primary_key(),
                FieldMeta::new("title", DataType::VarChar)
                    .backend_name("doc_title")
                    .max_length(128),
                FieldMeta::new("note", DataType::VarChar).max_length(128).nullable(),
            ]
        }
    }

    #[test]
    fn test_encode_applies_rename_and_drops_null() {
        let properties = build_conversion::<Doc>().unwrap().properties;
        let doc = Doc {
            id: 7,
            title: "hello".to_string(),
            note: None,
        };
        let row = encode_row(&properties, &doc).unwrap();
        assert_eq!(row.get("doc_title"), Some(&json!("hello")));
        assert_eq!(row.get("id"), Some(&json!(7)));
        assert!(!row.contains_key("note"));
        assert!(!row.contains_key("title"));
    }

    #[test]
    fn test_decode_reverses_rename_and_drops_unknown() {
        let properties = build_conversion::<Doc>().unwrap().properties;
        let mut row = Row::new();
        row.insert("id".to_string(), json!(7));
        row.insert("doc_title".to_string(), json!("hello"));
        row.insert("doc_title_sparse".to_string(), json!({"1": 0.5}));
        let doc: Doc = decode_row(&properties, row).unwrap();
        assert_eq!(
            doc,
            Doc {
                id: 7,
                title: "hello".to_string(),
                note: None
            }
        );
    }
}

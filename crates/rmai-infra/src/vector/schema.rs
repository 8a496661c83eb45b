//! Arrow schema for the study table.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Separator used to store the author list in a single column.
pub const AUTHOR_SEPARATOR: &str = "; ";

/// Schema for a study table whose vectors have `dimension` floats.
pub fn study_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("pmid", DataType::UInt64, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("abstract", DataType::Utf8, false),
        Field::new("authors", DataType::Utf8, false),
        Field::new("pub_date", DataType::Utf8, false),
        Field::new("embedding_model", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}

/// Vector width of an existing table, if it has a fixed-size vector column.
pub fn vector_dimension(schema: &Schema) -> Option<i32> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_schema_fields() {
        let schema = study_schema(384);
        assert_eq!(schema.fields().len(), 8);
        for name in ["id", "pmid", "title", "abstract", "authors", "pub_date"] {
            assert!(schema.field_with_name(name).is_ok(), "missing {name}");
        }
        assert_eq!(vector_dimension(&schema), Some(384));
    }

    #[test]
    fn test_vector_dimension_follows_argument() {
        assert_eq!(vector_dimension(&study_schema(1536)), Some(1536));
    }
}

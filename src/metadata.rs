//! Metadata sanitizer.
//!
//! Vector-store metadata is flat: only strings, numbers, booleans and null
//! survive. Arrays and objects are dropped from each chunk's mapping; chunk
//! content is never touched.

use serde_json::Value;

use crate::models::{Chunk, Metadata};

/// Whether a metadata value is storable as-is.
pub fn is_simple(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null
    )
}

/// Drop every non-scalar entry from a metadata mapping.
pub fn sanitize_metadata(metadata: &mut Metadata) {
    metadata.retain(|_, value| is_simple(value));
}

/// Sanitize the metadata of every chunk, preserving order and content.
pub fn sanitize(chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            sanitize_metadata(&mut chunk.metadata);
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn drops_nested_and_collection_values() {
        let chunk = Chunk::new(
            "body",
            metadata(json!({
                "source": "test.pdf",
                "page": 1,
                "complex": {"n": 1},
                "arr": [1, 2],
                "simple": "v"
            })),
        );
        let out = sanitize(vec![chunk]);
        assert_eq!(
            Value::Object(out[0].metadata.clone()),
            json!({"source": "test.pdf", "page": 1, "simple": "v"})
        );
        assert_eq!(out[0].content, "body");
    }

    #[test]
    fn keeps_booleans_floats_and_null() {
        let mut meta = metadata(json!({"ok": true, "score": 0.5, "missing": null}));
        sanitize_metadata(&mut meta);
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn empty_metadata_stays_empty() {
        let out = sanitize(vec![Chunk::new("x", Metadata::new())]);
        assert!(out[0].metadata.is_empty());
    }

    #[test]
    fn preserves_chunk_order() {
        let chunks = vec![
            Chunk::new("a", Metadata::new()),
            Chunk::new("b", Metadata::new()),
            Chunk::new("c", Metadata::new()),
        ];
        let contents: Vec<String> = sanitize(chunks).into_iter().map(|c| c.content).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }
}

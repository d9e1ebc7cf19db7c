//! Document construction strategies

use crate::{Error, Result};

/// A decoded reply document
pub type Document = serde_json::Value;

/// Builds documents from the raw bytes carried in a reply.
///
/// A connection can be configured with its own factory; replies read through
/// that connection use it for every document they carry.
pub trait DocumentFactory: Send + Sync {
    /// Build one document from its encoded bytes
    fn build(&self, raw: &[u8]) -> Result<Document>;
}

/// Parses documents as JSON objects
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentFactory;

impl DocumentFactory for JsonDocumentFactory {
    fn build(&self, raw: &[u8]) -> Result<Document> {
        let value: Document = serde_json::from_slice(raw)?;
        if !value.is_object() {
            return Err(Error::Protocol(format!(
                "expected a JSON object document, got {}",
                json_kind(&value)
            )));
        }
        Ok(value)
    }
}

fn json_kind(value: &Document) -> &'static str {
    match value {
        Document::Null => "null",
        Document::Bool(_) => "boolean",
        Document::Number(_) => "number",
        Document::String(_) => "string",
        Document::Array(_) => "array",
        Document::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_factory_builds_object() {
        let doc = JsonDocumentFactory.build(br#"{"name":"ada","age":36}"#).unwrap();
        assert_eq!(doc, json!({ "name": "ada", "age": 36 }));
    }

    #[test]
    fn test_json_factory_rejects_non_object() {
        let err = JsonDocumentFactory.build(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("array")));
    }

    #[test]
    fn test_json_factory_rejects_invalid_json() {
        let err = JsonDocumentFactory.build(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Document(_)));
        assert!(!err.is_transport_failure());
    }
}

//! Row-to-document mapping.

use crate::source::Row;
use serde_json::{Map, Value};

/// Per-cycle bookkeeping. The timestamp is captured once at cycle entry and
/// applied to every document written in that cycle.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext {
    /// Logical instant of the cycle, in epoch seconds.
    pub timestamp: i64,
    /// Reported size of the result set, when the source could probe it.
    pub total_rows: Option<u64>,
}

/// One document to be upserted into the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Document id. `None` lets the sink assign one, which degrades the
    /// upsert to an insert for that row.
    pub id: Option<String>,
    pub fields: Map<String, Value>,
    pub batch_timestamp: i64,
}

/// Map one row to one document. Column names become field names and the row
/// keeps its string-coerced values; NULL columns become JSON null. If a
/// unique-id field is configured and present, its value becomes the document
/// id; the field itself stays in the document body.
pub fn map_row(row: Row, unique_id_field: Option<&str>, ctx: &BatchContext) -> DocumentRecord {
    let id = unique_id_field.and_then(|field| row.get(field).map(str::to_string));

    let mut fields = Map::with_capacity(row.columns.len());
    for (column, value) in row.columns {
        fields.insert(column, value.map_or(Value::Null, Value::String));
    }

    DocumentRecord {
        id,
        fields,
        batch_timestamp: ctx.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row {
            columns: vec![
                ("uid".to_string(), Some("17".to_string())),
                ("name".to_string(), Some("amy".to_string())),
                ("nickname".to_string(), None),
            ],
        }
    }

    fn ctx() -> BatchContext {
        BatchContext {
            timestamp: 1_700_000_000,
            total_rows: Some(1),
        }
    }

    #[test]
    fn unique_id_field_becomes_the_document_id() {
        let doc = map_row(row(), Some("uid"), &ctx());
        assert_eq!(doc.id.as_deref(), Some("17"));
        // The id column is not stripped from the body.
        assert_eq!(doc.fields["uid"], Value::String("17".to_string()));
    }

    #[test]
    fn absent_id_field_leaves_the_id_unset() {
        assert_eq!(map_row(row(), Some("user_id"), &ctx()).id, None);
        assert_eq!(map_row(row(), None, &ctx()).id, None);
    }

    #[test]
    fn null_columns_become_json_null() {
        let doc = map_row(row(), None, &ctx());
        assert_eq!(doc.fields["nickname"], Value::Null);
        assert_eq!(doc.fields.len(), 3);
    }

    #[test]
    fn documents_carry_the_batch_timestamp() {
        let doc = map_row(row(), Some("uid"), &ctx());
        assert_eq!(doc.batch_timestamp, 1_700_000_000);
    }
}

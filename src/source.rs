//! Relational source abstraction.
//!
//! A [`RowSource`] executes one query and hands back a [`RowStream`]: a lazy,
//! finite, forward-only sequence of rows. A stream is not restartable; the
//! cycle constructs a fresh one on every run.

use crate::error::SourceError;
use async_trait::async_trait;

/// One source record: an ordered mapping from column name to the column
/// value coerced to its string representation. `None` is a SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<(String, Option<String>)>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .and_then(|(_, value)| value.as_deref())
    }
}

/// A relational database that can execute the river query.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Open a connection and execute the query. Any connection or execution
    /// error surfaces as [`SourceError`] and the sink is left untouched.
    async fn execute(&self, query: &str) -> Result<Box<dyn RowStream>, SourceError>;
}

/// A forward-only cursor over one result set.
#[async_trait]
pub trait RowStream: Send {
    /// Total number of rows in the result set, when obtainable without
    /// scanning it. `None` means unknown; the zero-row guard is skipped.
    fn total_rows(&self) -> Option<u64>;

    /// The next row, or `None` once the set is exhausted. An error mid-stream
    /// aborts the cycle.
    async fn next(&mut self) -> Option<Result<Row, SourceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_by_column_name() {
        let row = Row {
            columns: vec![
                ("id".to_string(), Some("7".to_string())),
                ("name".to_string(), Some("amy".to_string())),
                ("deleted_at".to_string(), None),
            ],
        };

        assert_eq!(row.get("id"), Some("7"));
        assert_eq!(row.get("name"), Some("amy"));
        assert_eq!(row.get("deleted_at"), None);
        assert_eq!(row.get("missing"), None);
    }
}

//! Row streaming from MySQL.
//!
//! The result set is consumed through the driver's streaming API so rows are
//! decoded one at a time; the full set is never buffered. The total row count
//! is probed with a server-side `COUNT(*)` wrapper before iteration begins;
//! if the probe fails the stream reports an unknown total instead of falling
//! back to buffering.

use crate::config::RiverConfig;
use crate::error::SourceError;
use crate::mysql::client::new_mysql_pool;
use crate::source::{Row, RowSource, RowStream};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use mysql_async::prelude::*;
use mysql_async::{Conn, Pool, Value};
use std::pin::Pin;
use tracing::debug;

type BoxedResultStream =
    Pin<Box<dyn Stream<Item = mysql_async::Result<mysql_async::Row>> + Send>>;

/// MySQL-backed [`RowSource`]. Connections are checked out of a pool per
/// cycle and returned when the stream is dropped, including mid-iteration.
pub struct MysqlSource {
    pool: Pool,
}

impl MysqlSource {
    pub fn new(config: &RiverConfig) -> Self {
        MysqlSource {
            pool: new_mysql_pool(config),
        }
    }
}

#[async_trait]
impl RowSource for MysqlSource {
    async fn execute(&self, query: &str) -> Result<Box<dyn RowStream>, SourceError> {
        let query = normalize_query(query);
        let mut conn = self.pool.get_conn().await?;
        let total = probe_row_count(&mut conn, &query).await;

        // The stream takes ownership of the connection; dropping it returns
        // the connection to the pool.
        let stream = query.stream::<mysql_async::Row, _>(conn).await?;

        Ok(Box::new(MysqlRowStream {
            total,
            inner: Box::pin(stream),
        }))
    }
}

struct MysqlRowStream {
    total: Option<u64>,
    inner: BoxedResultStream,
}

#[async_trait]
impl RowStream for MysqlRowStream {
    fn total_rows(&self) -> Option<u64> {
        self.total
    }

    async fn next(&mut self) -> Option<Result<Row, SourceError>> {
        match self.inner.next().await {
            None => None,
            Some(Ok(row)) => Some(Ok(coerce_row(row))),
            Some(Err(e)) => Some(Err(e.into())),
        }
    }
}

fn normalize_query(query: &str) -> String {
    query.trim().trim_end_matches(';').to_string()
}

fn count_query(query: &str) -> String {
    format!("SELECT COUNT(*) FROM ({query}) AS river_rows")
}

async fn probe_row_count(conn: &mut Conn, query: &str) -> Option<u64> {
    match conn.query_first::<u64, _>(count_query(query)).await {
        Ok(total) => total,
        Err(e) => {
            debug!("Row count probe failed, proceeding without a total: {e}");
            None
        }
    }
}

fn coerce_row(row: mysql_async::Row) -> Row {
    let columns = row.columns();
    let mut out = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = row.as_ref(index).and_then(coerce_to_string);
        out.push((column.name_str().to_string(), value));
    }
    Row { columns: out }
}

/// Coerce a MySQL value to its string representation. The source type system
/// is intentionally not preserved across this boundary; every scalar becomes
/// text and NULL stays null.
fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            if *hour == 0 && *minute == 0 && *second == 0 && *micros == 0 {
                Some(format!("{year:04}-{month:02}-{day:02}"))
            } else if *micros == 0 {
                Some(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                ))
            } else {
                Some(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
                ))
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let total_hours = *days * 24 + u32::from(*hours);
            Some(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_coerce_to_text() {
        assert_eq!(coerce_to_string(&Value::NULL), None);
        assert_eq!(
            coerce_to_string(&Value::Bytes(b"hello".to_vec())),
            Some("hello".to_string())
        );
        assert_eq!(coerce_to_string(&Value::Int(-42)), Some("-42".to_string()));
        assert_eq!(coerce_to_string(&Value::UInt(42)), Some("42".to_string()));
        assert_eq!(
            coerce_to_string(&Value::Double(1.5)),
            Some("1.5".to_string())
        );
    }

    #[test]
    fn dates_render_in_mysql_text_format() {
        assert_eq!(
            coerce_to_string(&Value::Date(2024, 3, 7, 0, 0, 0, 0)),
            Some("2024-03-07".to_string())
        );
        assert_eq!(
            coerce_to_string(&Value::Date(2024, 3, 7, 13, 5, 9, 0)),
            Some("2024-03-07 13:05:09".to_string())
        );
        assert_eq!(
            coerce_to_string(&Value::Time(true, 1, 2, 3, 4, 0)),
            Some("-26:03:04.000000".to_string())
        );
    }

    #[test]
    fn count_probe_wraps_the_configured_query() {
        assert_eq!(
            count_query(&normalize_query("SELECT id, name FROM users;")),
            "SELECT COUNT(*) FROM (SELECT id, name FROM users) AS river_rows"
        );
    }
}

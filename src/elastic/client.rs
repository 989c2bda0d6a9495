//! Elasticsearch-compatible HTTP sink.
//!
//! Speaks the classic river-era wire format: index creation with a
//! `_timestamp`-enabled mapping, an explicit put-mapping with
//! `ignore_conflicts=true`, document writes tagged through the external
//! `timestamp` parameter, and delete-by-query with a range filter on
//! `_timestamp`.

use crate::error::SinkError;
use crate::sink::{timestamp_mapping, DocumentSink};
use async_trait::async_trait;
use clap::Parser;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::trace;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Document index connection options.
#[derive(Parser, Clone, Debug)]
pub struct ElasticOpts {
    /// Index endpoint URL
    #[arg(
        long,
        default_value = "http://localhost:9200",
        env = "ELASTIC_ENDPOINT"
    )]
    pub elastic_endpoint: String,

    /// Index username (basic auth)
    #[arg(long, env = "ELASTIC_USERNAME")]
    pub elastic_username: Option<String>,

    /// Index password (basic auth)
    #[arg(long, env = "ELASTIC_PASSWORD")]
    pub elastic_password: Option<String>,
}

/// HTTP implementation of [`DocumentSink`].
pub struct ElasticSink {
    client: Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticSink {
    pub fn new(opts: &ElasticOpts) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ElasticSink {
            client,
            endpoint: opts.elastic_endpoint.trim_end_matches('/').to_string(),
            username: opts.elastic_username.clone(),
            password: opts.elastic_password.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{path}", self.endpoint);
        trace!("Sink request: {method} {url}");
        let mut request = self.client.request(method, url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        request
    }
}

#[async_trait]
impl DocumentSink for ElasticSink {
    async fn create_index(&self, index: &str, doc_type: &str) -> Result<(), SinkError> {
        let response = self
            .request(Method::PUT, index)
            .json(&json!({ "mappings": timestamp_mapping(doc_type) }))
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let failure = read_failure(response).await;
        if is_already_exists(&failure) {
            return Err(SinkError::IndexExists);
        }
        Err(SinkError::Request(anyhow::anyhow!(
            "failed to create index {index}: {failure}"
        )))
    }

    async fn put_mapping(&self, index: &str, doc_type: &str) -> Result<(), SinkError> {
        let response = self
            .request(Method::PUT, &format!("{index}/_mapping/{doc_type}"))
            .query(&[("ignore_conflicts", "true")])
            .json(&timestamp_mapping(doc_type))
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let failure = read_failure(response).await;
        if is_mapping_conflict(&failure) {
            return Err(SinkError::MappingConflict);
        }
        Err(SinkError::Request(anyhow::anyhow!(
            "failed to put mapping {index}/{doc_type}: {failure}"
        )))
    }

    async fn upsert(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        fields: &Map<String, Value>,
        timestamp: i64,
    ) -> Result<(), SinkError> {
        // With an id the write is an idempotent upsert; without one the sink
        // assigns an id and the write degrades to an insert.
        let request = match id {
            Some(id) => self.request(Method::PUT, &format!("{index}/{doc_type}/{id}")),
            None => self.request(Method::POST, &format!("{index}/{doc_type}")),
        };
        let response = request
            .query(&[("timestamp", timestamp.to_string())])
            .json(fields)
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let failure = read_failure(response).await;
        Err(SinkError::Request(anyhow::anyhow!(
            "failed to index document into {index}/{doc_type}: {failure}"
        )))
    }

    async fn delete_older_than(
        &self,
        index: &str,
        doc_type: &str,
        threshold: i64,
    ) -> Result<u64, SinkError> {
        let body = json!({
            "query": { "range": { "_timestamp": { "lt": threshold.to_string() } } }
        });
        let response = self
            .request(Method::DELETE, &format!("{index}/{doc_type}/_query"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let failure = read_failure(response).await;
            return Err(SinkError::Request(anyhow::anyhow!(
                "delete-by-query on {index}/{doc_type} failed: {failure}"
            )));
        }
        // Older servers do not report a count for delete-by-query.
        let deleted = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("deleted").and_then(Value::as_u64))
            .unwrap_or(0);
        Ok(deleted)
    }
}

async fn read_failure(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{status}: {body}")
}

fn is_already_exists(failure: &str) -> bool {
    failure.contains("resource_already_exists_exception")
        || failure.contains("IndexAlreadyExistsException")
}

fn is_mapping_conflict(failure: &str) -> bool {
    failure.contains("MergeMappingException") || failure.contains("conflict")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_is_detected_across_server_generations() {
        assert!(is_already_exists(
            "400 Bad Request: {\"error\":{\"type\":\"resource_already_exists_exception\"}}"
        ));
        assert!(is_already_exists(
            "400 Bad Request: IndexAlreadyExistsException[[users] already exists]"
        ));
        assert!(!is_already_exists("503 Service Unavailable: "));
    }

    #[test]
    fn mapping_conflicts_are_tolerated_failures() {
        assert!(is_mapping_conflict(
            "400 Bad Request: MergeMappingException[Merge failed]"
        ));
        assert!(!is_mapping_conflict("500 Internal Server Error: "));
    }
}

//! HTTP document sink for Elasticsearch-compatible stores.

pub mod client;

pub use client::{ElasticOpts, ElasticSink};

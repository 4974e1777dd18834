//! Talks to an Elasticsearch 2.x cluster on behalf of the schema manager.
//!
//! [`ElasticsearchHttpClient`] implements [`mapsync_merge::SchemaTransport`]
//! over the index admin REST endpoints. Reads that fail with a server error,
//! and any request answered with `429 Too Many Requests`, are retried with
//! exponential backoff.

mod elasticsearch_http_client;
mod options;

pub use elasticsearch_http_client::*;
pub use options::*;

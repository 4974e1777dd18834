use async_trait::async_trait;
use mapsync_error::{ErrorCodes, MapsyncError};
use mapsync_types::{AnalysisSettings, TypeMapping};
use std::fmt;
use thiserror::Error;

/// The engine calls schema management relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportOperation {
    IndexExists,
    GetMapping,
    GetAnalysisSettings,
    PutMapping,
    PutAnalysisSettings,
    CreateIndex,
    DeleteIndex,
    CloseIndex,
    OpenIndex,
}

impl TransportOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportOperation::IndexExists => "index exists",
            TransportOperation::GetMapping => "get mapping",
            TransportOperation::GetAnalysisSettings => "get analysis settings",
            TransportOperation::PutMapping => "put mapping",
            TransportOperation::PutAnalysisSettings => "put analysis settings",
            TransportOperation::CreateIndex => "create index",
            TransportOperation::DeleteIndex => "delete index",
            TransportOperation::CloseIndex => "close index",
            TransportOperation::OpenIndex => "open index",
        }
    }

    /// Whether the call changes anything on the engine.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            TransportOperation::IndexExists
                | TransportOperation::GetMapping
                | TransportOperation::GetAnalysisSettings
        )
    }
}

impl fmt::Display for TransportOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine, or the connection to it, failed a request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
    "Elasticsearch request failed: {operation} on index '{index}' ({}): {message}",
    describe_status(.status)
)]
pub struct TransportRequestFailedError {
    pub operation: TransportOperation,
    pub index: String,
    /// HTTP status of the response, `None` when no response came back.
    pub status: Option<u16>,
    pub message: String,
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!("status {status}"),
        None => "no response".to_string(),
    }
}

impl TransportRequestFailedError {
    pub fn new(
        operation: TransportOperation,
        index: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            index: index.into(),
            status,
            message: message.into(),
        }
    }
}

impl MapsyncError for TransportRequestFailedError {
    fn code(&self) -> ErrorCodes {
        match self.status.map(http::StatusCode::from_u16) {
            Some(Ok(status)) => status.into(),
            Some(Err(_)) => ErrorCodes::Unknown,
            None => ErrorCodes::Unavailable,
        }
    }
}

/// Access to the live schema of a search engine.
///
/// Implementations own connection handling and retries. Every failure is
/// reported as a [`TransportRequestFailedError`] carrying the engine's
/// message.
#[async_trait]
pub trait SchemaTransport: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool, TransportRequestFailedError>;

    /// Live mapping of `type_name`, `None` when the index has no such type.
    async fn get_mapping(
        &self,
        index: &str,
        type_name: &str,
    ) -> Result<Option<TypeMapping>, TransportRequestFailedError>;

    async fn get_analysis_settings(
        &self,
        index: &str,
    ) -> Result<AnalysisSettings, TransportRequestFailedError>;

    async fn put_mapping(
        &self,
        index: &str,
        type_name: &str,
        mapping: &TypeMapping,
    ) -> Result<(), TransportRequestFailedError>;

    /// The engine only accepts analysis changes on a closed index.
    async fn put_analysis_settings(
        &self,
        index: &str,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError>;

    async fn create_index(
        &self,
        index: &str,
        type_name: &str,
        mapping: &TypeMapping,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError>;

    async fn delete_index(&self, index: &str) -> Result<(), TransportRequestFailedError>;

    async fn close_index(&self, index: &str) -> Result<(), TransportRequestFailedError>;

    async fn open_index(&self, index: &str) -> Result<(), TransportRequestFailedError>;
}

use mapsync_error::{ErrorCodes, MapsyncError};
use mapsync_types::IndexSchema;
use std::fmt;
use thiserror::Error;

use crate::outcome::AttributeConflict;
use crate::plan::{ConflictScope, SchemaConflict};
use crate::transport::TransportRequestFailedError;

/// Joins the levels of a rendered error chain.
pub const CAUSE_SEPARATOR: &str = ": caused by: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MigrationErrorKind {
    /// Top level of a failed MERGE.
    MergeFailed,
    /// Top level of a failed VALIDATE.
    ValidationFailed,
    /// Top level of a failed CREATE or DROP_AND_CREATE.
    CreationFailed,
    MappingMergeFailed,
    AnalysisMergeFailed,
    /// The engine refused a change the mergers considered safe.
    SchemaApplyFailed,
    AttributeConflict,
    TransportRequestFailed,
    IndexAlreadyExists,
    IndexMissing,
}

impl fmt::Display for MigrationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationErrorKind::MergeFailed => "merge failed",
            MigrationErrorKind::ValidationFailed => "validation failed",
            MigrationErrorKind::CreationFailed => "creation failed",
            MigrationErrorKind::MappingMergeFailed => "mapping merge failed",
            MigrationErrorKind::AnalysisMergeFailed => "analysis merge failed",
            MigrationErrorKind::SchemaApplyFailed => "schema apply failed",
            MigrationErrorKind::AttributeConflict => "attribute conflict",
            MigrationErrorKind::TransportRequestFailed => "transport request failed",
            MigrationErrorKind::IndexAlreadyExists => "index already exists",
            MigrationErrorKind::IndexMissing => "index missing",
        };
        f.write_str(name)
    }
}

/// Typed payload of the innermost level of a chain.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorDetail {
    Conflict(AttributeConflict),
    Transport(TransportRequestFailedError),
}

/// One level of a schema management failure.
///
/// Failures form a chain from the strategy that failed down to the root
/// cause, e.g. `MergeFailed` ← `SchemaApplyFailed` ← `TransportRequestFailed`.
/// `Display` shows this level only; [`MigrationError::render_chain`] shows
/// all of them.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct MigrationError {
    kind: MigrationErrorKind,
    message: String,
    detail: Option<ErrorDetail>,
    #[source]
    cause: Option<Box<MigrationError>>,
}

impl MigrationError {
    fn new(kind: MigrationErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            detail: None,
            cause: None,
        }
    }

    fn caused_by(mut self, cause: MigrationError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn merge_failed(schema: &IndexSchema, cause: MigrationError) -> Self {
        Self::new(
            MigrationErrorKind::MergeFailed,
            format!(
                "Unable to merge the schema of type '{}' into index '{}'",
                schema.type_name, schema.index
            ),
        )
        .caused_by(cause)
    }

    pub fn validation_failed(schema: &IndexSchema, cause: MigrationError) -> Self {
        Self::new(
            MigrationErrorKind::ValidationFailed,
            format!(
                "Schema of type '{}' on index '{}' does not match the expected schema",
                schema.type_name, schema.index
            ),
        )
        .caused_by(cause)
    }

    pub fn creation_failed(schema: &IndexSchema, cause: MigrationError) -> Self {
        Self::new(
            MigrationErrorKind::CreationFailed,
            format!(
                "Unable to create index '{}' for type '{}'",
                schema.index, schema.type_name
            ),
        )
        .caused_by(cause)
    }

    /// A local conflict, wrapped in the merge level that found it.
    pub fn schema_conflict(schema: &IndexSchema, conflict: SchemaConflict) -> Self {
        let level = match conflict.scope {
            ConflictScope::Mapping => Self::new(
                MigrationErrorKind::MappingMergeFailed,
                format!(
                    "Unable to create or update the mapping of type '{}' on index '{}'",
                    schema.type_name, schema.index
                ),
            ),
            ConflictScope::Analysis => Self::new(
                MigrationErrorKind::AnalysisMergeFailed,
                format!(
                    "Unable to create or update the analysis settings of index '{}'",
                    schema.index
                ),
            ),
        };
        level.caused_by(Self::attribute_conflict(conflict.conflict))
    }

    /// A change the engine refused.
    pub fn apply_failed(schema: &IndexSchema, cause: TransportRequestFailedError) -> Self {
        Self::new(
            MigrationErrorKind::SchemaApplyFailed,
            format!(
                "Unable to create or update the schema of type '{}' on index '{}'",
                schema.type_name, schema.index
            ),
        )
        .caused_by(Self::transport(cause))
    }

    pub fn attribute_conflict(conflict: AttributeConflict) -> Self {
        let mut error = Self::new(MigrationErrorKind::AttributeConflict, conflict.to_string());
        error.detail = Some(ErrorDetail::Conflict(conflict));
        error
    }

    pub fn transport(cause: TransportRequestFailedError) -> Self {
        let mut error = Self::new(MigrationErrorKind::TransportRequestFailed, cause.to_string());
        error.detail = Some(ErrorDetail::Transport(cause));
        error
    }

    pub fn index_already_exists(index: &str) -> Self {
        Self::new(
            MigrationErrorKind::IndexAlreadyExists,
            format!("Index '{index}' already exists"),
        )
    }

    pub fn index_missing(index: &str) -> Self {
        Self::new(
            MigrationErrorKind::IndexMissing,
            format!("Index '{index}' does not exist"),
        )
    }

    pub fn kind(&self) -> MigrationErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&MigrationError> {
        self.cause.as_deref()
    }

    pub fn detail(&self) -> Option<&ErrorDetail> {
        self.detail.as_ref()
    }

    /// This level followed by every cause, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &MigrationError> {
        std::iter::successors(Some(self), |error| error.cause())
    }

    pub fn kinds(&self) -> Vec<MigrationErrorKind> {
        self.chain().map(MigrationError::kind).collect()
    }

    pub fn root_cause(&self) -> &MigrationError {
        self.chain().last().unwrap_or(self)
    }

    /// The conflict at the bottom of the chain, if a conflict caused it.
    pub fn conflict(&self) -> Option<&AttributeConflict> {
        match self.root_cause().detail() {
            Some(ErrorDetail::Conflict(conflict)) => Some(conflict),
            _ => None,
        }
    }

    pub fn transport_failure(&self) -> Option<&TransportRequestFailedError> {
        match self.root_cause().detail() {
            Some(ErrorDetail::Transport(failure)) => Some(failure),
            _ => None,
        }
    }

    pub fn render_chain(&self) -> String {
        self.chain()
            .map(MigrationError::message)
            .collect::<Vec<_>>()
            .join(CAUSE_SEPARATOR)
    }
}

impl MapsyncError for MigrationError {
    fn code(&self) -> ErrorCodes {
        match (self.kind, &self.detail) {
            (_, Some(ErrorDetail::Transport(failure))) => failure.code(),
            (_, Some(ErrorDetail::Conflict(_))) => ErrorCodes::FailedPrecondition,
            (MigrationErrorKind::IndexAlreadyExists, _) => ErrorCodes::AlreadyExists,
            (MigrationErrorKind::IndexMissing, _) => ErrorCodes::NotFound,
            _ => match self.cause() {
                Some(cause) => cause.code(),
                None => ErrorCodes::Internal,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SchemaElement;
    use crate::transport::TransportOperation;

    fn schema() -> IndexSchema {
        IndexSchema::new("books", "book")
    }

    #[test]
    fn test_local_conflict_chain() {
        let conflict = AttributeConflict::mismatch(
            SchemaElement::Field {
                path: "myField".to_string(),
            },
            "index",
            "not_analyzed",
            "no",
        );
        let error = MigrationError::merge_failed(
            &schema(),
            MigrationError::schema_conflict(
                &schema(),
                SchemaConflict {
                    scope: ConflictScope::Mapping,
                    conflict: conflict.clone(),
                },
            ),
        );

        assert_eq!(
            error.kinds(),
            vec![
                MigrationErrorKind::MergeFailed,
                MigrationErrorKind::MappingMergeFailed,
                MigrationErrorKind::AttributeConflict,
            ]
        );
        assert_eq!(error.conflict(), Some(&conflict));
        assert_eq!(error.code(), ErrorCodes::FailedPrecondition);
        assert_eq!(
            error.render_chain(),
            "Unable to merge the schema of type 'book' into index 'books': caused by: \
             Unable to create or update the mapping of type 'book' on index 'books': caused by: \
             Invalid value for attribute 'index' of field 'myField': expected 'not_analyzed', actual 'no'"
        );
        assert_eq!(error.to_string(), error.message());
    }

    #[test]
    fn test_remote_rejection_chain() {
        let failure = TransportRequestFailedError::new(
            TransportOperation::PutMapping,
            "books",
            Some(400),
            "mapper [myField] cannot be changed",
        );
        let error = MigrationError::merge_failed(
            &schema(),
            MigrationError::apply_failed(&schema(), failure.clone()),
        );
        assert_eq!(
            error.kinds(),
            vec![
                MigrationErrorKind::MergeFailed,
                MigrationErrorKind::SchemaApplyFailed,
                MigrationErrorKind::TransportRequestFailed,
            ]
        );
        assert_eq!(error.transport_failure(), Some(&failure));
        assert_eq!(error.conflict(), None);
        assert_eq!(error.code(), ErrorCodes::InvalidArgument);
        assert!(error.render_chain().ends_with(&failure.to_string()));
    }

    #[test]
    fn test_std_error_source_walks_the_chain() {
        use std::error::Error;

        let error = MigrationError::creation_failed(
            &schema(),
            MigrationError::index_already_exists("books"),
        );
        let source = error.source().map(|source| source.to_string());
        assert_eq!(source.as_deref(), Some("Index 'books' already exists"));
        assert_eq!(error.code(), ErrorCodes::AlreadyExists);
    }
}

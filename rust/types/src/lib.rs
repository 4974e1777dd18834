mod analysis;
mod mapping;
mod schema;
mod strategy;

pub use analysis::*;
pub use mapping::*;
pub use schema::*;
pub use strategy::*;

use mapsync_error::{ErrorCodes, MapsyncError};
use thiserror::Error;

/// Raised when a schema document contains a value outside the closed sets the
/// model understands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaValueError {
    #[error("Unknown dynamic mapping mode '{0}', expected one of strict, true, false")]
    UnknownDynamicMode(String),
    #[error("Unknown schema management strategy '{0}'")]
    UnknownStrategy(String),
    #[error("Unknown failure policy '{0}'")]
    UnknownFailurePolicy(String),
    #[error("Invalid analysis parameter value: {reason}")]
    InvalidParameterValue { reason: String },
}

impl MapsyncError for SchemaValueError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::SchemaValueError;

/// What to do with an index schema at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaManagementStrategy {
    /// Leave the engine alone.
    None,
    /// Compare, and fail on any difference, additive ones included.
    Validate,
    /// Create the index, and fail if it already exists.
    Create,
    /// Create when absent, otherwise apply additive changes only.
    #[default]
    Merge,
    /// Delete the index if present and create it from scratch.
    DropAndCreate,
}

impl SchemaManagementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaManagementStrategy::None => "NONE",
            SchemaManagementStrategy::Validate => "VALIDATE",
            SchemaManagementStrategy::Create => "CREATE",
            SchemaManagementStrategy::Merge => "MERGE",
            SchemaManagementStrategy::DropAndCreate => "DROP_AND_CREATE",
        }
    }
}

impl fmt::Display for SchemaManagementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaManagementStrategy {
    type Err = SchemaValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NONE" => Ok(SchemaManagementStrategy::None),
            "VALIDATE" => Ok(SchemaManagementStrategy::Validate),
            "CREATE" => Ok(SchemaManagementStrategy::Create),
            "MERGE" => Ok(SchemaManagementStrategy::Merge),
            "DROP_AND_CREATE" => Ok(SchemaManagementStrategy::DropAndCreate),
            _ => Err(SchemaValueError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Whether one failed index stops a multi-index run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    AbortOnFirst,
    ReportAll,
}

impl FromStr for FailurePolicy {
    type Err = SchemaValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "abort_on_first" => Ok(FailurePolicy::AbortOnFirst),
            "report_all" => Ok(FailurePolicy::ReportAll),
            _ => Err(SchemaValueError::UnknownFailurePolicy(s.to_string())),
        }
    }
}

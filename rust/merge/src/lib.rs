//! Schema comparison and merging for Elasticsearch indexes.
//!
//! The mergers in [`field`], [`mapping`] and [`analysis`] are pure: they
//! compare an expected schema with the live one and produce either a patch of
//! additive changes or the first [`AttributeConflict`] found. The
//! [`IndexSchemaManager`] reads the live schema through a [`SchemaTransport`],
//! runs the mergers and applies the result according to a
//! [`SchemaManagementStrategy`](mapsync_types::SchemaManagementStrategy).

pub mod analysis;
pub mod attribute;
mod error;
pub mod field;
mod in_memory;
mod manager;
pub mod mapping;
mod outcome;
mod plan;
mod transport;

pub use error::*;
pub use in_memory::*;
pub use manager::*;
pub use outcome::*;
pub use plan::*;
pub use transport::*;

use mapsync_client::ElasticsearchClientOptionsError;
use mapsync_config::{ConfigError, MigrationConfig, RootConfig};
use mapsync_error::{ErrorCodes, MapsyncError};
use mapsync_merge::ManagedIndex;
use mapsync_tracing::{init_stdout_tracing, InvalidLogFilter, LogFilter};
use mapsync_types::{IndexSchema, SchemaManagementStrategy};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to read schema document {path}: {source}")]
    ReadSchema {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid schema document {path}: {source}")]
    ParseSchema {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Client(#[from] ElasticsearchClientOptionsError),
    #[error(transparent)]
    LogFilter(#[from] InvalidLogFilter),
    #[error("Failed to initialize logging: {0}")]
    Tracing(#[from] SetGlobalDefaultError),
    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl MapsyncError for CliError {
    fn code(&self) -> ErrorCodes {
        match self {
            CliError::Config(err) => err.code(),
            CliError::Client(err) => err.code(),
            CliError::ReadSchema { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorCodes::NotFound
            }
            CliError::ReadSchema { .. } | CliError::Runtime(_) | CliError::Output(_) => {
                ErrorCodes::Internal
            }
            CliError::ParseSchema { .. } | CliError::LogFilter(_) => ErrorCodes::InvalidArgument,
            CliError::Tracing(_) => ErrorCodes::Internal,
        }
    }
}

/// A loaded config together with the schemas it points at.
#[derive(Debug)]
pub struct Migration {
    pub config: MigrationConfig,
    pub indexes: Vec<ManagedIndex>,
}

/// Loads the config at `config_path` and every schema document it lists.
/// `strategy`, when set, replaces the strategy of every index.
pub fn load_migration(
    config_path: &str,
    strategy: Option<SchemaManagementStrategy>,
) -> Result<Migration, CliError> {
    let config = RootConfig::load_from_existing_path(config_path)?.migration;
    let config_dir = match Path::new(config_path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let indexes = config
        .indexes
        .iter()
        .map(|index| {
            let schema = read_schema(&index.resolved_schema_path(config_dir))?;
            Ok(ManagedIndex {
                schema,
                strategy: strategy.unwrap_or_else(|| index.strategy_or(config.default_strategy)),
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    Ok(Migration { config, indexes })
}

pub fn read_schema(path: &Path) -> Result<IndexSchema, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::ReadSchema {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CliError::ParseSchema {
        path: path.to_path_buf(),
        source,
    })
}

pub fn init_logging(config: &MigrationConfig) -> Result<(), CliError> {
    let filters = config
        .log_filters
        .iter()
        .map(|filter| filter.parse::<LogFilter>())
        .collect::<Result<Vec<_>, _>>()?;
    init_stdout_tracing(&config.service_name, &filters)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BOOKS_SCHEMA: &str = r#"{
        "index": "books",
        "type": "book",
        "mapping": {
            "properties": {
                "title": { "type": "string", "analyzer": "standard" }
            }
        }
    }"#;

    #[test]
    fn test_load_migration_resolves_schema_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("schemas")).unwrap();
        fs::write(dir.path().join("schemas/books.json"), BOOKS_SCHEMA).unwrap();
        fs::write(
            dir.path().join("authors.json"),
            r#"{ "index": "authors", "type": "author" }"#,
        )
        .unwrap();
        let config_path = dir.path().join("mapsync_config.yaml");
        fs::write(
            &config_path,
            r#"
            migration:
                default_strategy: VALIDATE
                indexes:
                    - schema_path: "schemas/books.json"
                    - schema_path: "authors.json"
                      strategy: CREATE
            "#,
        )
        .unwrap();

        let migration = load_migration(config_path.to_str().unwrap(), None).unwrap();
        assert_eq!(migration.indexes.len(), 2);
        assert_eq!(migration.indexes[0].schema.index, "books");
        assert_eq!(
            migration.indexes[0].strategy,
            SchemaManagementStrategy::Validate
        );
        assert_eq!(migration.indexes[1].schema.type_name, "author");
        assert_eq!(migration.indexes[1].strategy, SchemaManagementStrategy::Create);

        let overridden = load_migration(
            config_path.to_str().unwrap(),
            Some(SchemaManagementStrategy::None),
        )
        .unwrap();
        assert!(overridden
            .indexes
            .iter()
            .all(|index| index.strategy == SchemaManagementStrategy::None));
    }

    #[test]
    fn test_load_migration_with_bad_schema_documents() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("mapsync_config.yaml");
        fs::write(
            &config_path,
            r#"
            migration:
                indexes:
                    - schema_path: "missing.json"
            "#,
        )
        .unwrap();
        let err = load_migration(config_path.to_str().unwrap(), None).unwrap_err();
        assert!(matches!(err, CliError::ReadSchema { .. }));
        assert_eq!(err.code(), ErrorCodes::NotFound);

        fs::write(dir.path().join("missing.json"), r#"{ "index": "books" }"#).unwrap();
        let err = load_migration(config_path.to_str().unwrap(), None).unwrap_err();
        assert!(matches!(err, CliError::ParseSchema { .. }));
        assert_eq!(err.code(), ErrorCodes::InvalidArgument);
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("nowhere.yaml");
        let err = load_migration(config_path.to_str().unwrap(), None).unwrap_err();
        assert_eq!(err.code(), ErrorCodes::NotFound);
    }
}

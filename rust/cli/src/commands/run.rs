use crate::utils::{init_logging, load_migration, CliError};
use clap::Parser;
use colored::Colorize;
use mapsync_client::ElasticsearchHttpClient;
use mapsync_config::DEFAULT_CONFIG_PATH;
use mapsync_merge::{IndexSchemaManager, ManagementOutcome, MigrationReport};
use mapsync_types::{FailurePolicy, SchemaManagementStrategy};
use std::io::{self, Write};

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[arg(long = "config", default_value = DEFAULT_CONFIG_PATH, help = "The path to the mapsync config file")]
    pub config_path: String,
    #[arg(long, help = "Apply this strategy to every index instead of the configured ones")]
    pub strategy: Option<SchemaManagementStrategy>,
    #[arg(long, help = "Override the configured failure policy (abort_on_first, report_all)")]
    pub failure_policy: Option<FailurePolicy>,
}

/// Returns whether every index was managed successfully.
pub fn run(args: RunArgs) -> Result<bool, CliError> {
    let migration = load_migration(&args.config_path, args.strategy)?;
    init_logging(&migration.config)?;
    let client = ElasticsearchHttpClient::from_config(&migration.config.elasticsearch)?;
    let policy = args
        .failure_policy
        .unwrap_or(migration.config.failure_policy);

    tracing::info!(
        endpoint = %client.base_url(),
        indexes = migration.indexes.len(),
        "Managing index schemas"
    );
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let manager = IndexSchemaManager::new(client);
    let report = runtime.block_on(manager.migrate_all(&migration.indexes, policy));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, &report)?;
    Ok(report.is_success())
}

fn describe_outcome(outcome: &ManagementOutcome) -> String {
    match outcome {
        ManagementOutcome::Skipped => "skipped".to_string(),
        ManagementOutcome::Validated => "schema is valid".to_string(),
        ManagementOutcome::Created => "index created".to_string(),
        ManagementOutcome::Recreated => "index dropped and created again".to_string(),
        ManagementOutcome::Merged(plan) if plan.is_empty() => "up to date".to_string(),
        ManagementOutcome::Merged(plan) => {
            let mut changes = Vec::new();
            if plan.analysis.is_some() {
                changes.push("analysis settings");
            }
            if plan.mapping.is_some() {
                changes.push("mapping");
            }
            format!("updated {}", changes.join(" and "))
        }
    }
}

pub fn write_report(out: &mut impl Write, report: &MigrationReport) -> io::Result<()> {
    for index in &report.indexes {
        let target = format!("{} ({}) [{}]", index.index, index.type_name, index.strategy);
        match &index.result {
            Ok(outcome) => writeln!(out, "{} {target}: {}", "ok".green(), describe_outcome(outcome))?,
            Err(err) => writeln!(out, "{} {target}: {}", "failed".red(), err.render_chain())?,
        }
    }
    if report.aborted {
        writeln!(
            out,
            "{}",
            "Stopped at the first failure; the remaining indexes were not processed.".yellow()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_merge::{InMemoryTransport, ManagedIndex};
    use mapsync_types::{
        AnalysisSettings, DynamicMode, FieldDefinition, FieldType, IndexSchema, TypeMapping,
    };

    fn managed(index: &str, strategy: SchemaManagementStrategy) -> ManagedIndex {
        ManagedIndex {
            schema: IndexSchema::new(index, "entry").with_mapping(
                TypeMapping::new().with_field("id", FieldDefinition::of_type(FieldType::Long)),
            ),
            strategy,
        }
    }

    #[tokio::test]
    async fn test_report_lists_every_index() {
        let transport = InMemoryTransport::new();
        transport.seed_index(
            "existing",
            Some((
                "entry",
                TypeMapping::new()
                    .with_dynamic(DynamicMode::Strict)
                    .with_field("id", FieldDefinition::of_type(FieldType::Long)),
            )),
            AnalysisSettings::new(),
        );
        let manager = IndexSchemaManager::new(transport);
        let indexes = [
            managed("fresh", SchemaManagementStrategy::Merge),
            managed("existing", SchemaManagementStrategy::Create),
            managed("untouched", SchemaManagementStrategy::None),
        ];

        let report = manager
            .migrate_all(&indexes, FailurePolicy::ReportAll)
            .await;
        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        let out = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("fresh (entry) [MERGE]: index created"));
        assert!(lines[1].contains("existing (entry) [CREATE]: "));
        assert!(lines[1].contains("already exists"));
        assert!(lines[2].contains("untouched (entry) [NONE]: skipped"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_report_mentions_abort() {
        let manager = IndexSchemaManager::new(InMemoryTransport::new());
        let indexes = [
            managed("missing", SchemaManagementStrategy::Validate),
            managed("later", SchemaManagementStrategy::Merge),
        ];

        let report = manager
            .migrate_all(&indexes, FailurePolicy::AbortOnFirst)
            .await;
        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("missing (entry) [VALIDATE]: "));
        assert!(!out.contains("later"));
        assert!(out.contains("Stopped at the first failure"));
    }

    #[test]
    fn test_describe_merge_outcome() {
        let plan = mapsync_merge::ApplyPlan {
            analysis: Some(AnalysisSettings::new()),
            mapping: Some(TypeMapping::new()),
        };
        assert_eq!(
            describe_outcome(&ManagementOutcome::Merged(plan)),
            "updated analysis settings and mapping"
        );
        assert_eq!(
            describe_outcome(&ManagementOutcome::Merged(mapsync_merge::ApplyPlan::default())),
            "up to date"
        );
    }
}

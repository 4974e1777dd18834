use crate::utils::{init_logging, load_migration, CliError};
use clap::Parser;
use mapsync_client::ElasticsearchHttpClient;
use mapsync_config::DEFAULT_CONFIG_PATH;
use mapsync_merge::{IndexSchemaManager, ManagedIndex, MergePlan, MigrationError, SchemaTransport};
use serde_json::{json, Value};
use std::io::{self, Write};

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[arg(long = "config", default_value = DEFAULT_CONFIG_PATH, help = "The path to the mapsync config file")]
    pub config_path: String,
}

/// Prints, as JSON, what a merge would change for every configured index.
/// Nothing is written to the engine. Returns whether every index can be
/// merged.
pub fn plan(args: PlanArgs) -> Result<bool, CliError> {
    let migration = load_migration(&args.config_path, None)?;
    init_logging(&migration.config)?;
    let client = ElasticsearchHttpClient::from_config(&migration.config.elasticsearch)?;

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let manager = IndexSchemaManager::new(client);
    let plans = runtime.block_on(plan_all(&manager, &migration.indexes));

    let mergeable = plans.iter().all(|(_, plan)| plan.is_ok());
    let document = Value::Array(
        plans
            .iter()
            .map(|(index, plan)| plan_document(index, plan))
            .collect(),
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &document).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(mergeable)
}

pub async fn plan_all<'a, T: SchemaTransport>(
    manager: &IndexSchemaManager<T>,
    indexes: &'a [ManagedIndex],
) -> Vec<(&'a ManagedIndex, Result<MergePlan, MigrationError>)> {
    let mut plans = Vec::with_capacity(indexes.len());
    for index in indexes {
        plans.push((index, manager.plan(&index.schema).await));
    }
    plans
}

pub fn plan_document(index: &ManagedIndex, plan: &Result<MergePlan, MigrationError>) -> Value {
    let mut document = json!({
        "index": index.schema.index,
        "type": index.schema.type_name,
    });
    match plan {
        Ok(MergePlan::CreateIndex { mapping, analysis }) => {
            document["action"] = json!("create_index");
            document["mapping"] = json!(mapping);
            document["analysis"] = json!(analysis);
        }
        Ok(MergePlan::Update(plan)) if plan.is_empty() => {
            document["action"] = json!("none");
        }
        Ok(MergePlan::Update(plan)) => {
            document["action"] = json!("update");
            if let Some(analysis) = &plan.analysis {
                document["analysis"] = json!(analysis);
            }
            if let Some(mapping) = &plan.mapping {
                document["mapping"] = json!(mapping);
            }
        }
        Err(err) => {
            document["action"] = json!("conflict");
            document["error"] = json!(err.render_chain());
        }
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_merge::InMemoryTransport;
    use mapsync_types::{
        AnalysisSettings, DynamicMode, FieldDefinition, FieldType, IndexSchema,
        SchemaManagementStrategy, TypeMapping,
    };

    fn managed(index: &str, mapping: TypeMapping) -> ManagedIndex {
        ManagedIndex {
            schema: IndexSchema::new(index, "entry").with_mapping(mapping),
            strategy: SchemaManagementStrategy::Merge,
        }
    }

    #[tokio::test]
    async fn test_plan_documents() {
        let live = TypeMapping::new()
            .with_dynamic(DynamicMode::Strict)
            .with_field("id", FieldDefinition::of_type(FieldType::Long));
        let transport = InMemoryTransport::new();
        transport.seed_index("current", Some(("entry", live.clone())), AnalysisSettings::new());
        transport.seed_index("behind", Some(("entry", live.clone())), AnalysisSettings::new());
        transport.seed_index("diverged", Some(("entry", live.clone())), AnalysisSettings::new());
        let manager = IndexSchemaManager::new(transport.clone());

        let indexes = [
            managed("current", live.clone()),
            managed(
                "behind",
                live.clone()
                    .with_field("born", FieldDefinition::of_type(FieldType::Date)),
            ),
            managed(
                "diverged",
                TypeMapping::new().with_field("id", FieldDefinition::of_type(FieldType::String)),
            ),
            managed("absent", live.clone()),
        ];

        let plans = plan_all(&manager, &indexes).await;
        let documents: Vec<Value> = plans
            .iter()
            .map(|(index, plan)| plan_document(index, plan))
            .collect();

        assert_eq!(documents[0]["action"], "none");
        assert_eq!(documents[1]["action"], "update");
        assert_eq!(documents[1]["mapping"]["properties"]["born"]["type"], "date");
        assert!(documents[1].get("analysis").is_none());
        assert_eq!(documents[2]["action"], "conflict");
        assert!(documents[2]["error"]
            .as_str()
            .unwrap()
            .contains("attribute 'type' of field 'id'"));
        assert_eq!(documents[3]["action"], "create_index");
        assert_eq!(documents[3]["index"], "absent");
        assert_eq!(documents[3]["type"], "entry");

        // Planning is read-only.
        assert!(transport.writes().is_empty());
    }
}

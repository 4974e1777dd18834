use mapsync_types::{AnalysisSettings, FailurePolicy, IndexSchema, SchemaManagementStrategy, TypeMapping};

use crate::error::MigrationError;
use crate::plan::{plan_creation, plan_update, ApplyPlan, ConflictScope, SchemaConflict};
use crate::transport::{SchemaTransport, TransportRequestFailedError};

/// What the live index looked like before anything was changed.
#[derive(Clone, Debug, PartialEq)]
enum RemoteState {
    Absent,
    Present {
        mapping: Option<TypeMapping>,
        analysis: AnalysisSettings,
    },
}

/// What a merge would do, computed without writing anything.
#[derive(Clone, Debug, PartialEq)]
pub enum MergePlan {
    /// The index does not exist and would be created whole.
    CreateIndex {
        mapping: TypeMapping,
        analysis: AnalysisSettings,
    },
    /// The index exists; the plan may be empty.
    Update(ApplyPlan),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ManagementOutcome {
    /// The strategy was `NONE`.
    Skipped,
    Validated,
    Created,
    /// An existing index was deleted and created again.
    Recreated,
    /// The plan that was applied. Empty when the index was already up to date.
    Merged(ApplyPlan),
}

/// One schema together with the strategy to apply to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagedIndex {
    pub schema: IndexSchema,
    pub strategy: SchemaManagementStrategy,
}

#[derive(Debug)]
pub struct IndexReport {
    pub index: String,
    pub type_name: String,
    pub strategy: SchemaManagementStrategy,
    pub result: Result<ManagementOutcome, MigrationError>,
}

/// Result of a multi-index run, in processing order.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub indexes: Vec<IndexReport>,
    /// Set when the run stopped at the first failure with schemas left over.
    pub aborted: bool,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&IndexReport, &MigrationError)> {
        self.indexes
            .iter()
            .filter_map(|report| report.result.as_ref().err().map(|err| (report, err)))
    }
}

/// Applies a schema management strategy to indexes through a
/// [`SchemaTransport`].
///
/// Merging never touches the engine until both the mapping and the analysis
/// settings merged cleanly, so a conflict leaves the live index as it was.
pub struct IndexSchemaManager<T> {
    transport: T,
}

impl<T: SchemaTransport> IndexSchemaManager<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[tracing::instrument(
        skip(self, expected),
        fields(index = %expected.index, type_name = %expected.type_name)
    )]
    pub async fn manage(
        &self,
        strategy: SchemaManagementStrategy,
        expected: &IndexSchema,
    ) -> Result<ManagementOutcome, MigrationError> {
        match strategy {
            SchemaManagementStrategy::None => {
                tracing::debug!("Schema management disabled, leaving the index alone");
                Ok(ManagementOutcome::Skipped)
            }
            SchemaManagementStrategy::Validate => self.validate(expected).await,
            SchemaManagementStrategy::Create => self.create(expected).await,
            SchemaManagementStrategy::Merge => self.merge(expected).await,
            SchemaManagementStrategy::DropAndCreate => self.drop_and_create(expected).await,
        }
    }

    /// Computes what a merge would change. Read-only.
    pub async fn plan(&self, expected: &IndexSchema) -> Result<MergePlan, MigrationError> {
        let state = self
            .fetch_remote_state(expected)
            .await
            .map_err(|err| MigrationError::merge_failed(expected, MigrationError::transport(err)))?;
        let conflict_error = |conflict: SchemaConflict| {
            MigrationError::merge_failed(expected, MigrationError::schema_conflict(expected, conflict))
        };
        match state {
            RemoteState::Absent => {
                let (mapping, analysis) = plan_creation(expected).map_err(conflict_error)?;
                Ok(MergePlan::CreateIndex { mapping, analysis })
            }
            RemoteState::Present { mapping, analysis } => {
                plan_update(expected, mapping.as_ref(), &analysis)
                    .map(MergePlan::Update)
                    .map_err(conflict_error)
            }
        }
    }

    async fn merge(&self, expected: &IndexSchema) -> Result<ManagementOutcome, MigrationError> {
        match self.plan(expected).await? {
            MergePlan::CreateIndex { mapping, analysis } => {
                tracing::info!("Index does not exist, creating it");
                self.transport
                    .create_index(&expected.index, &expected.type_name, &mapping, &analysis)
                    .await
                    .map_err(|err| {
                        MigrationError::merge_failed(expected, MigrationError::apply_failed(expected, err))
                    })?;
                Ok(ManagementOutcome::Created)
            }
            MergePlan::Update(plan) if plan.is_empty() => {
                tracing::info!("Schema is up to date");
                Ok(ManagementOutcome::Merged(plan))
            }
            MergePlan::Update(plan) => {
                tracing::info!(
                    analysis = plan.analysis.is_some(),
                    mapping = plan.mapping.is_some(),
                    "Applying additive schema changes"
                );
                self.apply(expected, &plan).await.map_err(|err| {
                    MigrationError::merge_failed(expected, MigrationError::apply_failed(expected, err))
                })?;
                Ok(ManagementOutcome::Merged(plan))
            }
        }
    }

    async fn validate(&self, expected: &IndexSchema) -> Result<ManagementOutcome, MigrationError> {
        let state = self.fetch_remote_state(expected).await.map_err(|err| {
            MigrationError::validation_failed(expected, MigrationError::transport(err))
        })?;
        let RemoteState::Present { mapping, analysis } = state else {
            return Err(MigrationError::validation_failed(
                expected,
                MigrationError::index_missing(&expected.index),
            ));
        };
        let plan = plan_update(expected, mapping.as_ref(), &analysis).map_err(|conflict| {
            MigrationError::validation_failed(expected, MigrationError::schema_conflict(expected, conflict))
        })?;
        if let Some(addition) = plan.first_addition(&expected.type_name, mapping.as_ref()) {
            let scope = if plan.analysis.is_some() {
                ConflictScope::Analysis
            } else {
                ConflictScope::Mapping
            };
            return Err(MigrationError::validation_failed(
                expected,
                MigrationError::schema_conflict(
                    expected,
                    SchemaConflict {
                        scope,
                        conflict: addition,
                    },
                ),
            ));
        }
        tracing::info!("Schema is valid");
        Ok(ManagementOutcome::Validated)
    }

    async fn create(&self, expected: &IndexSchema) -> Result<ManagementOutcome, MigrationError> {
        let exists = self.transport.index_exists(&expected.index).await.map_err(|err| {
            MigrationError::creation_failed(expected, MigrationError::transport(err))
        })?;
        if exists {
            return Err(MigrationError::creation_failed(
                expected,
                MigrationError::index_already_exists(&expected.index),
            ));
        }
        self.create_from_scratch(expected).await?;
        Ok(ManagementOutcome::Created)
    }

    async fn drop_and_create(
        &self,
        expected: &IndexSchema,
    ) -> Result<ManagementOutcome, MigrationError> {
        // Check the schema before destroying anything.
        let (mapping, analysis) = plan_creation(expected).map_err(|conflict| {
            MigrationError::creation_failed(expected, MigrationError::schema_conflict(expected, conflict))
        })?;
        let exists = self.transport.index_exists(&expected.index).await.map_err(|err| {
            MigrationError::creation_failed(expected, MigrationError::transport(err))
        })?;
        if exists {
            tracing::warn!("Deleting index before recreating it");
            self.transport
                .delete_index(&expected.index)
                .await
                .map_err(|err| {
                    MigrationError::creation_failed(expected, MigrationError::apply_failed(expected, err))
                })?;
        }
        self.transport
            .create_index(&expected.index, &expected.type_name, &mapping, &analysis)
            .await
            .map_err(|err| {
                MigrationError::creation_failed(expected, MigrationError::apply_failed(expected, err))
            })?;
        if exists {
            Ok(ManagementOutcome::Recreated)
        } else {
            Ok(ManagementOutcome::Created)
        }
    }

    async fn create_from_scratch(&self, expected: &IndexSchema) -> Result<(), MigrationError> {
        let (mapping, analysis) = plan_creation(expected).map_err(|conflict| {
            MigrationError::creation_failed(expected, MigrationError::schema_conflict(expected, conflict))
        })?;
        self.transport
            .create_index(&expected.index, &expected.type_name, &mapping, &analysis)
            .await
            .map_err(|err| {
                MigrationError::creation_failed(expected, MigrationError::apply_failed(expected, err))
            })
    }

    async fn fetch_remote_state(
        &self,
        expected: &IndexSchema,
    ) -> Result<RemoteState, TransportRequestFailedError> {
        if !self.transport.index_exists(&expected.index).await? {
            return Ok(RemoteState::Absent);
        }
        let mapping = self
            .transport
            .get_mapping(&expected.index, &expected.type_name)
            .await?;
        let analysis = self.transport.get_analysis_settings(&expected.index).await?;
        Ok(RemoteState::Present { mapping, analysis })
    }

    async fn apply(
        &self,
        expected: &IndexSchema,
        plan: &ApplyPlan,
    ) -> Result<(), TransportRequestFailedError> {
        if let Some(analysis) = &plan.analysis {
            self.update_analysis_settings(&expected.index, analysis).await?;
        }
        if let Some(mapping) = &plan.mapping {
            self.transport
                .put_mapping(&expected.index, &expected.type_name, mapping)
                .await?;
        }
        Ok(())
    }

    /// Analysis settings can only change on a closed index. The index is
    /// reopened whatever happens to the update itself.
    async fn update_analysis_settings(
        &self,
        index: &str,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError> {
        self.transport.close_index(index).await?;
        let updated = self.transport.put_analysis_settings(index, settings).await;
        let reopened = self.transport.open_index(index).await;
        match (updated, reopened) {
            (Ok(()), reopened) => reopened,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(reopen_err)) => {
                tracing::error!(index, error = %reopen_err, "Failed to reopen index");
                Err(err)
            }
        }
    }

    /// Runs [`IndexSchemaManager::manage`] for each index in order.
    pub async fn migrate_all(
        &self,
        indexes: &[ManagedIndex],
        policy: FailurePolicy,
    ) -> MigrationReport {
        let mut report = MigrationReport::default();
        for (position, managed) in indexes.iter().enumerate() {
            let result = self.manage(managed.strategy, &managed.schema).await;
            let failed = match &result {
                Ok(outcome) => {
                    tracing::debug!(index = %managed.schema.index, ?outcome, "Schema managed");
                    false
                }
                Err(err) => {
                    tracing::error!(
                        index = %managed.schema.index,
                        error = %err.render_chain(),
                        "Schema management failed"
                    );
                    true
                }
            };
            report.indexes.push(IndexReport {
                index: managed.schema.index.clone(),
                type_name: managed.schema.type_name.clone(),
                strategy: managed.strategy,
                result,
            });
            if failed && policy == FailurePolicy::AbortOnFirst {
                report.aborted = position + 1 < indexes.len();
                break;
            }
        }
        report
    }
}

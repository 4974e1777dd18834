use async_trait::async_trait;
use mapsync_types::{AnalysisSettings, FieldDefinition, TypeMapping};
use parking_lot::Mutex;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::transport::{SchemaTransport, TransportOperation, TransportRequestFailedError};

/// One request seen by an [`InMemoryTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportCall {
    pub operation: TransportOperation,
    pub index: String,
}

#[derive(Clone, Debug)]
struct StoredIndex {
    open: bool,
    mappings: BTreeMap<String, TypeMapping>,
    analysis: AnalysisSettings,
}

#[derive(Debug, Default)]
struct EngineState {
    indices: HashMap<String, StoredIndex>,
    calls: Vec<TransportCall>,
    failures: HashMap<TransportOperation, String>,
}

/// A search engine kept in memory, for tests and dry runs.
///
/// It enforces the engine rules schema management depends on: analysis
/// settings only change on a closed index, and mapping updates may add fields
/// but never change existing ones. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTransport {
    inner: Arc<Mutex<EngineState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts an open index in place, bypassing every rule and the call log.
    pub fn seed_index(
        &self,
        index: &str,
        mapping: Option<(&str, TypeMapping)>,
        analysis: AnalysisSettings,
    ) {
        let mut mappings = BTreeMap::new();
        if let Some((type_name, mapping)) = mapping {
            mappings.insert(type_name.to_string(), mapping);
        }
        self.inner.lock().indices.insert(
            index.to_string(),
            StoredIndex {
                open: true,
                mappings,
                analysis,
            },
        );
    }

    pub fn mapping(&self, index: &str, type_name: &str) -> Option<TypeMapping> {
        self.inner
            .lock()
            .indices
            .get(index)
            .and_then(|stored| stored.mappings.get(type_name).cloned())
    }

    pub fn analysis_settings(&self, index: &str) -> Option<AnalysisSettings> {
        self.inner
            .lock()
            .indices
            .get(index)
            .map(|stored| stored.analysis.clone())
    }

    pub fn is_open(&self, index: &str) -> Option<bool> {
        self.inner.lock().indices.get(index).map(|stored| stored.open)
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Calls that changed, or tried to change, the engine.
    pub fn writes(&self) -> Vec<TransportCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.operation.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Makes every later `operation` call fail with a 400 carrying `message`.
    pub fn fail_on(&self, operation: TransportOperation, message: impl Into<String>) {
        self.inner.lock().failures.insert(operation, message.into());
    }

    fn with_state<R>(
        &self,
        operation: TransportOperation,
        index: &str,
        f: impl FnOnce(&mut EngineState) -> Result<R, TransportRequestFailedError>,
    ) -> Result<R, TransportRequestFailedError> {
        let mut state = self.inner.lock();
        state.calls.push(TransportCall {
            operation,
            index: index.to_string(),
        });
        if let Some(message) = state.failures.get(&operation) {
            return Err(TransportRequestFailedError::new(
                operation,
                index,
                Some(400),
                message.clone(),
            ));
        }
        f(&mut *state)
    }
}

fn index_not_found(operation: TransportOperation, index: &str) -> TransportRequestFailedError {
    TransportRequestFailedError::new(
        operation,
        index,
        Some(404),
        format!("index_not_found_exception: no such index [{index}]"),
    )
}

fn stored_index<'a>(
    state: &'a mut EngineState,
    operation: TransportOperation,
    index: &str,
) -> Result<&'a mut StoredIndex, TransportRequestFailedError> {
    state
        .indices
        .get_mut(index)
        .ok_or_else(|| index_not_found(operation, index))
}

/// Adds new properties of `patch` to `target` the way the engine does:
/// existing leaves must be sent back unchanged, objects merge recursively.
fn merge_properties(
    prefix: Option<&str>,
    target: &mut BTreeMap<String, FieldDefinition>,
    patch: &BTreeMap<String, FieldDefinition>,
) -> Result<(), String> {
    for (name, incoming) in patch {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.clone(),
        };
        let existing = match target.entry(name.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(incoming.clone());
                continue;
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        };
        if existing.effective_type() != incoming.effective_type() && incoming.field_type.is_some() {
            return Err(format!(
                "illegal_argument_exception: mapper [{path}] of different type"
            ));
        }
        match &incoming.properties {
            Some(incoming_children) => {
                let children = existing.properties.get_or_insert_with(BTreeMap::new);
                merge_properties(Some(&path), children, incoming_children)?;
            }
            None if *existing != *incoming => {
                return Err(format!(
                    "illegal_argument_exception: mapper [{path}] cannot be changed"
                ));
            }
            None => {}
        }
    }
    Ok(())
}

#[async_trait]
impl SchemaTransport for InMemoryTransport {
    async fn index_exists(&self, index: &str) -> Result<bool, TransportRequestFailedError> {
        self.with_state(TransportOperation::IndexExists, index, |state| {
            Ok(state.indices.contains_key(index))
        })
    }

    async fn get_mapping(
        &self,
        index: &str,
        type_name: &str,
    ) -> Result<Option<TypeMapping>, TransportRequestFailedError> {
        let operation = TransportOperation::GetMapping;
        self.with_state(operation, index, |state| {
            Ok(stored_index(state, operation, index)?
                .mappings
                .get(type_name)
                .cloned())
        })
    }

    async fn get_analysis_settings(
        &self,
        index: &str,
    ) -> Result<AnalysisSettings, TransportRequestFailedError> {
        let operation = TransportOperation::GetAnalysisSettings;
        self.with_state(operation, index, |state| {
            Ok(stored_index(state, operation, index)?.analysis.clone())
        })
    }

    async fn put_mapping(
        &self,
        index: &str,
        type_name: &str,
        mapping: &TypeMapping,
    ) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::PutMapping;
        self.with_state(operation, index, |state| {
            let stored = stored_index(state, operation, index)?;
            let mut updated = stored.mappings.get(type_name).cloned().unwrap_or_default();
            merge_properties(None, &mut updated.properties, &mapping.properties).map_err(
                |message| TransportRequestFailedError::new(operation, index, Some(400), message),
            )?;
            if mapping.dynamic.is_some() {
                updated.dynamic = mapping.dynamic;
            }
            stored.mappings.insert(type_name.to_string(), updated);
            Ok(())
        })
    }

    async fn put_analysis_settings(
        &self,
        index: &str,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::PutAnalysisSettings;
        self.with_state(operation, index, |state| {
            let stored = stored_index(state, operation, index)?;
            if stored.open {
                return Err(TransportRequestFailedError::new(
                    operation,
                    index,
                    Some(400),
                    format!(
                        "illegal_argument_exception: Can't update non dynamic settings \
                         [[index.analysis]] for open indices [[{index}]]"
                    ),
                ));
            }
            // The engine replaces definitions with the same name.
            let mut updated = settings.clone();
            updated.extend_missing(&stored.analysis);
            stored.analysis = updated;
            Ok(())
        })
    }

    async fn create_index(
        &self,
        index: &str,
        type_name: &str,
        mapping: &TypeMapping,
        settings: &AnalysisSettings,
    ) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::CreateIndex;
        self.with_state(operation, index, |state| {
            if state.indices.contains_key(index) {
                return Err(TransportRequestFailedError::new(
                    operation,
                    index,
                    Some(400),
                    format!("index_already_exists_exception: already exists [{index}]"),
                ));
            }
            let mut mappings = BTreeMap::new();
            mappings.insert(type_name.to_string(), mapping.clone());
            state.indices.insert(
                index.to_string(),
                StoredIndex {
                    open: true,
                    mappings,
                    analysis: settings.clone(),
                },
            );
            Ok(())
        })
    }

    async fn delete_index(&self, index: &str) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::DeleteIndex;
        self.with_state(operation, index, |state| {
            state
                .indices
                .remove(index)
                .map(|_| ())
                .ok_or_else(|| index_not_found(operation, index))
        })
    }

    async fn close_index(&self, index: &str) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::CloseIndex;
        self.with_state(operation, index, |state| {
            stored_index(state, operation, index)?.open = false;
            Ok(())
        })
    }

    async fn open_index(&self, index: &str) -> Result<(), TransportRequestFailedError> {
        let operation = TransportOperation::OpenIndex;
        self.with_state(operation, index, |state| {
            stored_index(state, operation, index)?.open = true;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_types::{AnalysisComponentDefinition, ComponentCategory, FieldType};

    #[tokio::test]
    async fn test_settings_require_closed_index() {
        let transport = InMemoryTransport::new();
        transport.seed_index("books", None, AnalysisSettings::new());
        let settings = AnalysisSettings::new().with_component(
            ComponentCategory::Tokenizer,
            "tok",
            AnalysisComponentDefinition::new("standard"),
        );

        let err = transport
            .put_analysis_settings("books", &settings)
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(400));

        transport.close_index("books").await.unwrap();
        transport.put_analysis_settings("books", &settings).await.unwrap();
        transport.open_index("books").await.unwrap();
        assert_eq!(transport.analysis_settings("books"), Some(settings));
        assert_eq!(transport.is_open("books"), Some(true));
    }

    #[tokio::test]
    async fn test_mapping_updates_are_additive() {
        let transport = InMemoryTransport::new();
        let live = TypeMapping::new().with_field("id", FieldDefinition::of_type(FieldType::String));
        transport.seed_index("books", Some(("book", live)), AnalysisSettings::new());

        let patch = TypeMapping::new().with_field("born", FieldDefinition::of_type(FieldType::Date));
        transport.put_mapping("books", "book", &patch).await.unwrap();
        let stored = transport.mapping("books", "book").unwrap();
        assert!(stored.field("id").is_some());
        assert!(stored.field("born").is_some());

        let change = TypeMapping::new().with_field("id", FieldDefinition::of_type(FieldType::Long));
        let err = transport.put_mapping("books", "book", &change).await.unwrap_err();
        assert!(err.message.contains("mapper [id] of different type"));
    }

    #[tokio::test]
    async fn test_missing_index_and_failure_injection() {
        let transport = InMemoryTransport::new();
        let err = transport.get_mapping("books", "book").await.unwrap_err();
        assert_eq!(err.status, Some(404));
        assert!(!transport.index_exists("books").await.unwrap());

        transport.fail_on(TransportOperation::IndexExists, "boom");
        let err = transport.index_exists("books").await.unwrap_err();
        assert_eq!(err.message, "boom");
        assert_eq!(transport.calls().len(), 3);
        assert!(transport.writes().is_empty());
    }
}

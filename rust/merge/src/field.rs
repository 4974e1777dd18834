use mapsync_types::FieldDefinition;
use std::collections::BTreeMap;

use crate::attribute::{compare_attribute, compare_date_format, AttributeComparison, WhenUnspecified};
use crate::outcome::{AttributeConflict, MergeOutcome, SchemaElement};

/// Merges one expected field into its live counterpart.
///
/// `path` is the dotted path of the field from the mapping root and only
/// serves reporting. A missing live field is added whole with engine defaults
/// filled in; an existing one is compared attribute by attribute and only its
/// missing sub-properties are ever sent back.
pub fn merge_field(
    path: &str,
    expected: &FieldDefinition,
    actual: Option<&FieldDefinition>,
) -> MergeOutcome<FieldDefinition> {
    let Some(actual) = actual else {
        return MergeOutcome::Additive(expected.with_engine_defaults());
    };

    if let Some(conflict) = first_attribute_conflict(path, expected, actual) {
        return MergeOutcome::Conflict(conflict);
    }

    let Some(expected_properties) = &expected.properties else {
        return MergeOutcome::Noop;
    };
    let empty = BTreeMap::new();
    let actual_properties = actual.properties.as_ref().unwrap_or(&empty);
    let mut additions = BTreeMap::new();
    for (name, expected_child) in expected_properties {
        let child_path = format!("{path}.{name}");
        match merge_field(&child_path, expected_child, actual_properties.get(name)) {
            MergeOutcome::Noop => {}
            MergeOutcome::Additive(patch) => {
                additions.insert(name.clone(), patch);
            }
            conflict @ MergeOutcome::Conflict(_) => return conflict,
        }
    }

    if additions.is_empty() {
        MergeOutcome::Noop
    } else {
        MergeOutcome::Additive(FieldDefinition {
            field_type: actual.field_type.clone().or_else(|| expected.field_type.clone()),
            properties: Some(additions),
            ..Default::default()
        })
    }
}

fn first_attribute_conflict(
    path: &str,
    expected: &FieldDefinition,
    actual: &FieldDefinition,
) -> Option<AttributeConflict> {
    // Defaults depend on what the engine actually holds.
    let live_type = actual.effective_type().or(expected.effective_type());
    let live_defaults = FieldDefinition {
        field_type: live_type.clone(),
        index: actual.index,
        ..Default::default()
    };

    let comparisons = [
        (
            "type",
            compare_attribute(
                expected.effective_type().as_ref(),
                actual.effective_type().as_ref(),
                None,
                WhenUnspecified::Unconstrained,
            ),
        ),
        (
            "index",
            compare_attribute(
                expected.index.as_ref(),
                actual.index.as_ref(),
                live_type.as_ref().and_then(|t| t.default_index_mode()).as_ref(),
                WhenUnspecified::EngineDefault,
            ),
        ),
        (
            "store",
            compare_attribute(
                expected.store.as_ref(),
                actual.store.as_ref(),
                live_type.as_ref().and_then(|t| t.default_store()).as_ref(),
                WhenUnspecified::EngineDefault,
            ),
        ),
        (
            "format",
            compare_date_format(
                expected.format.as_deref(),
                actual.format.as_deref(),
                live_type.as_ref().and_then(|t| t.default_format()),
            ),
        ),
        (
            "analyzer",
            compare_attribute(
                expected.analyzer.as_deref(),
                actual.analyzer.as_deref(),
                live_defaults.default_analyzer(),
                WhenUnspecified::Unconstrained,
            ),
        ),
        (
            "ignore_malformed",
            compare_attribute(
                expected.ignore_malformed.as_ref(),
                actual.ignore_malformed.as_ref(),
                live_type.as_ref().and_then(|t| t.default_ignore_malformed()).as_ref(),
                WhenUnspecified::Unconstrained,
            ),
        ),
        (
            "dynamic",
            compare_attribute(
                expected.dynamic.as_ref(),
                actual.dynamic.as_ref(),
                None,
                WhenUnspecified::Unconstrained,
            ),
        ),
    ];

    for (attribute, comparison) in comparisons {
        match comparison {
            AttributeComparison::Match => {}
            AttributeComparison::Fillable => {
                // Existing fields are never patched attribute by attribute.
                tracing::debug!(
                    field = path,
                    attribute,
                    "Live field lacks an expected attribute, leaving it untouched"
                );
            }
            AttributeComparison::Conflict { expected, actual } => {
                return Some(AttributeConflict::mismatch(
                    SchemaElement::Field {
                        path: path.to_string(),
                    },
                    attribute,
                    expected,
                    actual,
                ));
            }
        }
    }
    None
}

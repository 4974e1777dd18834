use mapsync_types::TypeMapping;

use crate::attribute::{compare_attribute, AttributeComparison, WhenUnspecified};
use crate::field::merge_field;
use crate::outcome::{AttributeConflict, MergeOutcome, SchemaElement};

/// The mapping sent when the type does not exist yet: every expected field
/// with engine defaults filled in and an explicit root `dynamic`.
pub fn complete_mapping(expected: &TypeMapping) -> TypeMapping {
    let mut mapping = expected.with_engine_defaults();
    mapping.dynamic = Some(expected.dynamic.unwrap_or_default());
    mapping
}

/// Merges the expected mapping of `type_name` into the live one.
///
/// Fields are visited in name order and the first conflict aborts the merge.
/// The resulting patch holds only what must be sent: new fields, new
/// sub-properties of existing objects, and the root `dynamic` mode when the
/// live mapping does not report one.
pub fn merge_mapping(
    type_name: &str,
    expected: &TypeMapping,
    actual: Option<&TypeMapping>,
) -> MergeOutcome<TypeMapping> {
    let Some(actual) = actual else {
        return MergeOutcome::Additive(complete_mapping(expected));
    };

    let mut patch = TypeMapping::new();
    let expected_dynamic = expected.dynamic.unwrap_or_default();
    match compare_attribute(
        Some(&expected_dynamic),
        actual.dynamic.as_ref(),
        None,
        WhenUnspecified::EngineDefault,
    ) {
        AttributeComparison::Match => {}
        AttributeComparison::Fillable => patch.dynamic = Some(expected_dynamic),
        AttributeComparison::Conflict { expected, actual } => {
            return MergeOutcome::Conflict(AttributeConflict::mismatch(
                SchemaElement::Mapping {
                    type_name: type_name.to_string(),
                },
                "dynamic",
                expected,
                actual,
            ));
        }
    }

    for (name, expected_field) in &expected.properties {
        match merge_field(name, expected_field, actual.properties.get(name)) {
            MergeOutcome::Noop => {}
            MergeOutcome::Additive(field_patch) => {
                patch.properties.insert(name.clone(), field_patch);
            }
            MergeOutcome::Conflict(conflict) => return MergeOutcome::Conflict(conflict),
        }
    }

    if patch.is_empty() {
        MergeOutcome::Noop
    } else {
        MergeOutcome::Additive(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_types::{DynamicMode, FieldDefinition, FieldType, IndexMode, DEFAULT_DATE_FORMAT};

    #[test]
    fn test_absent_type_is_created_whole() {
        let expected = TypeMapping::new().with_field("myField", FieldDefinition::of_type(FieldType::Date));
        assert_eq!(
            merge_mapping("indexedEntity", &expected, None),
            MergeOutcome::Additive(
                TypeMapping::new()
                    .with_dynamic(DynamicMode::Strict)
                    .with_field(
                        "myField",
                        FieldDefinition::of_type(FieldType::Date).with_format(DEFAULT_DATE_FORMAT)
                    )
            )
        );
    }

    #[test]
    fn test_missing_root_dynamic_is_filled() {
        let expected = TypeMapping::new()
            .with_dynamic(DynamicMode::Strict)
            .with_field("id", FieldDefinition::of_type(FieldType::String));
        let actual = TypeMapping::new().with_field("id", FieldDefinition::of_type(FieldType::String));
        assert_eq!(
            merge_mapping("indexedEntity", &expected, Some(&actual)),
            MergeOutcome::Additive(TypeMapping::new().with_dynamic(DynamicMode::Strict))
        );
    }

    #[test]
    fn test_root_dynamic_conflict() {
        let expected = TypeMapping::new().with_dynamic(DynamicMode::Strict);
        let actual = TypeMapping::new().with_dynamic(DynamicMode::True);
        match merge_mapping("indexedEntity", &expected, Some(&actual)) {
            MergeOutcome::Conflict(conflict) => {
                assert_eq!(
                    conflict.element,
                    SchemaElement::Mapping {
                        type_name: "indexedEntity".to_string()
                    }
                );
                assert_eq!(conflict.attribute, "dynamic");
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_fields_fail_fast_in_name_order() {
        let expected = TypeMapping::new()
            .with_dynamic(DynamicMode::Strict)
            .with_field("alpha", FieldDefinition::of_type(FieldType::Long))
            .with_field(
                "beta",
                FieldDefinition::of_type(FieldType::String).with_index(IndexMode::NotAnalyzed),
            );
        let actual = TypeMapping::new()
            .with_dynamic(DynamicMode::Strict)
            .with_field("alpha", FieldDefinition::of_type(FieldType::Integer))
            .with_field("beta", FieldDefinition::of_type(FieldType::String));
        match merge_mapping("t", &expected, Some(&actual)) {
            MergeOutcome::Conflict(conflict) => assert_eq!(
                conflict.element,
                SchemaElement::Field {
                    path: "alpha".to_string()
                }
            ),
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_extra_live_fields_are_preserved() {
        let expected = TypeMapping::new()
            .with_dynamic(DynamicMode::Strict)
            .with_field("myField", FieldDefinition::of_type(FieldType::Boolean));
        let actual = TypeMapping::new()
            .with_dynamic(DynamicMode::Strict)
            .with_field("myField", FieldDefinition::of_type(FieldType::Boolean))
            .with_field("NOTmyField", FieldDefinition::of_type(FieldType::Date));
        assert_eq!(
            merge_mapping("t", &expected, Some(&actual)),
            MergeOutcome::Noop
        );
    }
}

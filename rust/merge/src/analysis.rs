use mapsync_types::{
    AnalysisComponentDefinition, AnalysisSettings, AnalyzerDefinition, ComponentCategory,
    TypeMapping,
};

use crate::attribute::{compare_attribute, compare_parameters, AttributeComparison, WhenUnspecified};
use crate::outcome::{AttributeConflict, MergeOutcome, SchemaElement};

/// All analysis conflicts are reported under this attribute name.
pub const ANALYSIS_ATTRIBUTE: &str = "analyzer";

/// Merges the expected analysis settings into the live ones.
///
/// Analysis definitions are immutable once created, so anything present on
/// both sides must be equal and only missing definitions end up in the patch.
/// An analyzer is only added when no existing live field is meant to use it:
/// the engine cannot re-analyze data already indexed by that field.
///
/// `actual_mapping` is the live mapping of the type, `None` when the type does
/// not exist yet.
pub fn merge_analysis(
    expected: &AnalysisSettings,
    actual: &AnalysisSettings,
    expected_mapping: &TypeMapping,
    actual_mapping: Option<&TypeMapping>,
) -> MergeOutcome<AnalysisSettings> {
    if let Some(conflict) = first_broken_reference(expected, actual) {
        return MergeOutcome::Conflict(conflict);
    }

    let mut patch = AnalysisSettings::new();
    for category in ComponentCategory::ALL {
        for (name, expected_component) in expected.components(category) {
            match actual.components(category).get(name) {
                None => {
                    patch
                        .components_mut(category)
                        .insert(name.clone(), expected_component.clone());
                }
                Some(actual_component) => {
                    if let Some((expected_text, actual_text)) =
                        component_difference(expected_component, actual_component)
                    {
                        return MergeOutcome::Conflict(AttributeConflict::new(
                            SchemaElement::Component {
                                category,
                                name: name.clone(),
                            },
                            ANALYSIS_ATTRIBUTE,
                            expected_text,
                            Some(actual_text),
                        ));
                    }
                }
            }
        }
    }

    for (name, expected_analyzer) in &expected.analyzer {
        let element = || SchemaElement::Analyzer { name: name.clone() };
        match actual.analyzer.get(name) {
            None => {
                let existing_field = actual_mapping.and_then(|live| {
                    expected_mapping
                        .fields_using_analyzer(name)
                        .into_iter()
                        .find(|path| live.field(path).is_some())
                });
                if let Some(path) = existing_field {
                    return MergeOutcome::Conflict(AttributeConflict::missing(
                        element(),
                        ANALYSIS_ATTRIBUTE,
                        format!("a definition, since existing field '{path}' uses it"),
                    ));
                }
                patch.analyzer.insert(name.clone(), expected_analyzer.clone());
            }
            Some(actual_analyzer) => {
                if let Some((expected_text, actual_text)) =
                    analyzer_difference(expected_analyzer, actual_analyzer)
                {
                    return MergeOutcome::Conflict(AttributeConflict::new(
                        element(),
                        ANALYSIS_ATTRIBUTE,
                        expected_text,
                        Some(actual_text),
                    ));
                }
            }
        }
    }

    if patch.is_empty() {
        MergeOutcome::Noop
    } else {
        MergeOutcome::Additive(patch)
    }
}

/// First analyzer reference that neither side defines.
fn first_broken_reference(
    expected: &AnalysisSettings,
    actual: &AnalysisSettings,
) -> Option<AttributeConflict> {
    for (name, analyzer) in &expected.analyzer {
        for (category, reference) in analyzer.references() {
            if !expected.defines(category, reference) && !actual.defines(category, reference) {
                return Some(AttributeConflict::missing(
                    SchemaElement::Analyzer { name: name.clone() },
                    ANALYSIS_ATTRIBUTE,
                    format!("a definition for referenced {category} '{reference}'"),
                ));
            }
        }
    }
    None
}

fn component_difference(
    expected: &AnalysisComponentDefinition,
    actual: &AnalysisComponentDefinition,
) -> Option<(String, String)> {
    if expected.component_type != actual.component_type {
        return Some((
            format!("type '{}'", expected.component_type),
            format!("type '{}'", actual.component_type),
        ));
    }
    match compare_parameters(&expected.parameters, &actual.parameters) {
        AttributeComparison::Conflict { expected, actual } => Some((expected, actual)),
        _ => None,
    }
}

fn analyzer_difference(
    expected: &AnalyzerDefinition,
    actual: &AnalyzerDefinition,
) -> Option<(String, String)> {
    let comparisons = [
        (
            "type",
            compare_attribute(
                expected.effective_type(),
                actual.effective_type(),
                None,
                WhenUnspecified::EngineDefault,
            ),
        ),
        (
            "char_filter",
            compare_attribute(
                Some(&PipelineNames(&expected.char_filter)),
                Some(&PipelineNames(&actual.char_filter)),
                None,
                WhenUnspecified::EngineDefault,
            ),
        ),
        (
            "tokenizer",
            compare_attribute(
                expected.tokenizer.as_deref(),
                actual.tokenizer.as_deref(),
                None,
                WhenUnspecified::EngineDefault,
            ),
        ),
        (
            "filter",
            compare_attribute(
                Some(&PipelineNames(&expected.filter)),
                Some(&PipelineNames(&actual.filter)),
                None,
                WhenUnspecified::EngineDefault,
            ),
        ),
        (
            "parameters",
            compare_parameters(&expected.parameters, &actual.parameters),
        ),
    ];

    comparisons
        .into_iter()
        .find_map(|(part, comparison)| match comparison {
            AttributeComparison::Match => None,
            AttributeComparison::Fillable => Some((
                format!("{part} as expected"),
                format!("no {part}"),
            )),
            AttributeComparison::Conflict { expected, actual } if part == "parameters" => {
                Some((expected, actual))
            }
            AttributeComparison::Conflict { expected, actual } => Some((
                format!("{part} '{expected}'"),
                format!("{part} '{actual}'"),
            )),
        })
}

#[derive(PartialEq)]
struct PipelineNames<'a>(&'a [String]);

impl std::fmt::Display for PipelineNames<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_types::{FieldDefinition, FieldType, ParameterValue};

    fn settings() -> AnalysisSettings {
        AnalysisSettings::new()
            .with_analyzer(
                "analyzerWithElasticsearchFactories",
                AnalyzerDefinition::custom("custom-edgeNGram")
                    .with_char_filter("custom-pattern-replace")
                    .with_filter("custom-keep-types"),
            )
            .with_component(
                ComponentCategory::CharFilter,
                "custom-pattern-replace",
                AnalysisComponentDefinition::new("pattern_replace")
                    .with_parameter("pattern", ParameterValue::text("[^0-9]"))
                    .with_parameter("replacement", ParameterValue::text("0")),
            )
            .with_component(
                ComponentCategory::Tokenizer,
                "custom-edgeNGram",
                AnalysisComponentDefinition::new("edgeNGram")
                    .with_parameter("min_gram", ParameterValue::text("1"))
                    .with_parameter("max_gram", ParameterValue::text("10")),
            )
            .with_component(
                ComponentCategory::TokenFilter,
                "custom-keep-types",
                AnalysisComponentDefinition::new("keep_types")
                    .with_parameter("types", ParameterValue::list(["<NUM>", "<DOUBLE>"])),
            )
    }

    fn mapping() -> TypeMapping {
        TypeMapping::new().with_field(
            "myField",
            FieldDefinition::of_type(FieldType::String)
                .with_analyzer("analyzerWithElasticsearchFactories"),
        )
    }

    #[test]
    fn test_identical_settings_are_noop() {
        assert_eq!(
            merge_analysis(&settings(), &settings(), &mapping(), Some(&mapping())),
            MergeOutcome::Noop
        );
    }

    #[test]
    fn test_everything_missing_is_added_for_new_fields() {
        let outcome = merge_analysis(
            &settings(),
            &AnalysisSettings::new(),
            &mapping(),
            Some(&TypeMapping::new()),
        );
        assert_eq!(outcome, MergeOutcome::Additive(settings()));
    }

    #[test]
    fn test_analyzer_is_not_added_under_an_existing_field() {
        let outcome = merge_analysis(
            &settings(),
            &AnalysisSettings::new(),
            &mapping(),
            Some(&mapping()),
        );
        match outcome {
            MergeOutcome::Conflict(conflict) => {
                assert_eq!(
                    conflict.element,
                    SchemaElement::Analyzer {
                        name: "analyzerWithElasticsearchFactories".to_string()
                    }
                );
                assert_eq!(conflict.attribute, ANALYSIS_ATTRIBUTE);
                assert_eq!(conflict.actual, None);
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_components_alone_are_added() {
        let mut live = settings();
        live.filter.clear();
        let outcome = merge_analysis(&settings(), &live, &mapping(), Some(&mapping()));
        let mut expected_patch = settings();
        expected_patch.analyzer.clear();
        expected_patch.char_filter.clear();
        expected_patch.tokenizer.clear();
        assert_eq!(outcome, MergeOutcome::Additive(expected_patch));
    }

    #[test]
    fn test_changed_component_conflicts() {
        let mut live = settings();
        live.char_filter.insert(
            "custom-pattern-replace".to_string(),
            AnalysisComponentDefinition::new("html_strip"),
        );
        match merge_analysis(&settings(), &live, &mapping(), Some(&mapping())) {
            MergeOutcome::Conflict(conflict) => {
                assert_eq!(
                    conflict.element,
                    SchemaElement::Component {
                        category: ComponentCategory::CharFilter,
                        name: "custom-pattern-replace".to_string()
                    }
                );
                assert_eq!(conflict.expected, "type 'pattern_replace'");
                assert_eq!(conflict.actual.as_deref(), Some("type 'html_strip'"));
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_spelling_is_not_a_difference() {
        let mut live = settings();
        live.tokenizer.insert(
            "custom-edgeNGram".to_string(),
            AnalysisComponentDefinition::new("edgeNGram")
                .with_parameter("min_gram", ParameterValue::text("1.0"))
                .with_parameter("max_gram", ParameterValue::text("10")),
        );
        assert_eq!(
            merge_analysis(&settings(), &live, &mapping(), Some(&mapping())),
            MergeOutcome::Noop
        );
    }

    #[test]
    fn test_pipeline_order_matters() {
        let expected = AnalysisSettings::new()
            .with_analyzer(
                "a",
                AnalyzerDefinition::custom("standard")
                    .with_filter("lowercase")
                    .with_filter("asciifolding"),
            )
            .with_component(ComponentCategory::Tokenizer, "standard", AnalysisComponentDefinition::new("standard"))
            .with_component(ComponentCategory::TokenFilter, "lowercase", AnalysisComponentDefinition::new("lowercase"))
            .with_component(ComponentCategory::TokenFilter, "asciifolding", AnalysisComponentDefinition::new("asciifolding"));
        let mut live = expected.clone();
        live.analyzer.insert(
            "a".to_string(),
            AnalyzerDefinition::custom("standard")
                .with_filter("asciifolding")
                .with_filter("lowercase"),
        );
        match merge_analysis(&expected, &live, &TypeMapping::new(), None) {
            MergeOutcome::Conflict(conflict) => {
                assert_eq!(conflict.expected, "filter '[lowercase, asciifolding]'");
                assert_eq!(
                    conflict.actual.as_deref(),
                    Some("filter '[asciifolding, lowercase]'")
                );
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_broken_reference_is_checked_first() {
        let mut expected = settings();
        expected.char_filter.clear();
        let mut live = settings();
        live.char_filter.clear();
        // The changed tokenizer would conflict too, but the reference wins.
        live.tokenizer.insert(
            "custom-edgeNGram".to_string(),
            AnalysisComponentDefinition::new("nGram"),
        );
        match merge_analysis(&expected, &live, &mapping(), None) {
            MergeOutcome::Conflict(conflict) => {
                assert_eq!(
                    conflict.element,
                    SchemaElement::Analyzer {
                        name: "analyzerWithElasticsearchFactories".to_string()
                    }
                );
                assert!(conflict.expected.contains("custom-pattern-replace"));
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_resolved_by_live_settings() {
        let mut expected = settings();
        expected.filter.clear();
        let outcome = merge_analysis(&expected, &settings(), &mapping(), Some(&mapping()));
        assert_eq!(outcome, MergeOutcome::Noop);
    }
}
